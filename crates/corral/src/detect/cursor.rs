// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{count_signals, has_braille_spinner, last_non_empty, Candidate};

const CONFIRM_SIGNALS: &[(&str, bool)] = &[
    ("Accept changes?", false),
    ("Run command?", false),
    ("(a)ccept", true),
    ("enter to confirm", true),
];

/// Classify the cursor-agent CLI's rendered screen.
pub fn classify(rows: &[String]) -> Candidate {
    if count_signals(rows, CONFIRM_SIGNALS) >= 2 {
        return Candidate::WaitingInput;
    }

    if has_braille_spinner(rows)
        || rows.iter().any(|row| {
            let lower = row.to_lowercase();
            lower.contains("generating") || lower.contains("esc to interrupt")
        })
    {
        return Candidate::Busy;
    }

    if rows
        .iter()
        .rev()
        .any(|row| row.trim().starts_with('\u{276f}') || row.trim().starts_with("cursor>"))
    {
        return Candidate::Idle;
    }

    match last_non_empty(rows) {
        Some(_) => Candidate::Busy,
        None => Candidate::Idle,
    }
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;
