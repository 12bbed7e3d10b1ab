// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{count_signals, has_braille_spinner, last_non_empty, Candidate};

/// Gemini CLI wraps confirmation prompts in a box-drawing border with
/// numbered options:
///
/// ```text
/// │ ● 1. Allow once                      │
/// │   2. Allow for this session          │
/// │   3. No, suggest changes (esc)       │
/// ```
const CONFIRM_SIGNALS: &[(&str, bool)] = &[
    ("Allow once", false),
    ("Allow for this session", false),
    ("Apply this change?", false),
    ("Waiting for user confirmation", false),
    ("1.", false),
];

/// Classify the Gemini CLI's rendered screen.
pub fn classify(rows: &[String]) -> Candidate {
    if count_signals(rows, CONFIRM_SIGNALS) >= 2 {
        return Candidate::WaitingInput;
    }

    // Braille spinner lines render while a request or tool is in flight
    // (e.g. "⠏ Waiting for the model…" is still an active turn).
    if has_braille_spinner(rows)
        || rows
            .iter()
            .any(|row| row.to_lowercase().contains("esc to cancel"))
    {
        return Candidate::Busy;
    }

    // Idle composer: "Type your message" placeholder or a boxed `>` prompt.
    if rows.iter().rev().any(|row| {
        let content = row.trim().trim_start_matches('\u{2502}').trim_start();
        content.starts_with("Type your message") || content.starts_with('>')
    }) {
        return Candidate::Idle;
    }

    match last_non_empty(rows) {
        Some(_) => Candidate::Busy,
        None => Candidate::Idle,
    }
}

#[cfg(test)]
#[path = "gemini_tests.rs"]
mod tests;
