// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{count_signals, has_braille_spinner, last_non_empty, Candidate};

const CONFIRM_SIGNALS: &[(&str, bool)] = &[
    ("Proceed?", false),
    ("Always allow", false),
    ("enter to confirm", true),
];

/// Classify the Factory droid CLI's rendered screen.
pub fn classify(rows: &[String]) -> Candidate {
    if count_signals(rows, CONFIRM_SIGNALS) >= 2 {
        return Candidate::WaitingInput;
    }

    if has_braille_spinner(rows)
        || rows.iter().any(|row| {
            let lower = row.to_lowercase();
            lower.contains("working on it") || lower.contains("esc to interrupt")
        })
    {
        return Candidate::Busy;
    }

    if rows
        .iter()
        .rev()
        .any(|row| row.trim().starts_with('\u{276f}'))
    {
        return Candidate::Idle;
    }

    match last_non_empty(rows) {
        Some(_) => Candidate::Busy,
        None => Candidate::Idle,
    }
}

#[cfg(test)]
#[path = "droid_tests.rs"]
mod tests;
