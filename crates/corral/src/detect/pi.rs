// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{any_row_contains, count_signals, has_braille_spinner, last_non_empty, Candidate};

const CONFIRM_SIGNALS: &[(&str, bool)] = &[
    ("Run this command?", false),
    ("[y/n]", true),
    ("press enter", true),
];

/// Classify the Pi CLI's rendered screen.
pub fn classify(rows: &[String]) -> Candidate {
    if count_signals(rows, CONFIRM_SIGNALS) >= 2 || any_row_contains(rows, "(y/N)") {
        return Candidate::WaitingInput;
    }

    if has_braille_spinner(rows)
        || rows
            .iter()
            .any(|row| row.to_lowercase().contains("ctrl+c to interrupt"))
    {
        return Candidate::Busy;
    }

    if rows.iter().rev().any(|row| {
        let trimmed = row.trim();
        trimmed.starts_with("pi>") || trimmed.starts_with('\u{276f}')
    }) {
        return Candidate::Idle;
    }

    match last_non_empty(rows) {
        Some(_) => Candidate::Busy,
        None => Candidate::Idle,
    }
}

#[cfg(test)]
#[path = "pi_tests.rs"]
mod tests;
