// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{any_row_contains, count_signals, has_braille_spinner, last_non_empty, Candidate};

/// Approval dialog signals for the Codex CLI.
const APPROVAL_SIGNALS: &[(&str, bool)] = &[
    ("Allow command?", false),
    ("Yes (y)", false),
    ("No, provide feedback (n)", false),
    ("press enter to confirm", true),
];

/// Classify the Codex CLI's rendered screen.
pub fn classify(rows: &[String]) -> Candidate {
    if count_signals(rows, APPROVAL_SIGNALS) >= 2
        || any_row_contains(rows, "Press Enter to continue")
    {
        return Candidate::WaitingInput;
    }

    // A running turn shows a worked-time footer and interrupt hint.
    if rows.iter().any(|row| {
        let lower = row.to_lowercase();
        lower.contains("esc to interrupt") || lower.contains("working (")
    }) || has_braille_spinner(rows)
    {
        return Candidate::Busy;
    }

    // Composer: `›` or a block cursor marker at the prompt line.
    if rows.iter().rev().any(|row| {
        let trimmed = row.trim();
        trimmed.starts_with('\u{203a}') || trimmed.starts_with('\u{258c}')
    }) {
        return Candidate::Idle;
    }

    match last_non_empty(rows) {
        Some(_) => Candidate::Busy,
        None => Candidate::Idle,
    }
}

#[cfg(test)]
#[path = "codex_tests.rs"]
mod tests;
