// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{any_row_contains, count_signals, last_non_empty, Candidate};

/// Signal phrases for Claude Code's interactive dialogs.  A match requires
/// two or more signals so ordinary output mentioning one phrase doesn't
/// misclassify the screen.
const DIALOG_SIGNALS: &[&[(&str, bool)]] = &[
    // Tool permission dialog
    &[
        ("Do you want to proceed?", false),
        ("Yes, and don't ask again", false),
        ("Esc to cancel", false),
    ],
    // Generic numbered confirm
    &[("Do you want", false), ("1. Yes", false), ("2. No", false)],
    // Workspace trust
    &[
        ("Accessing workspace:", false),
        ("Yes, I trust this folder", false),
        ("enter to confirm", true),
    ],
    // Plan review
    &[
        ("Would you like to proceed?", false),
        ("auto-accept edits", true),
        ("esc to", true),
    ],
];

/// Classify Claude Code's rendered screen.
///
/// Dialogs asking for a decision are `WaitingInput`; an active turn shows
/// the interrupt affordance or a spinner and is `Busy`; the `❯` composer
/// prompt on an otherwise quiet screen is `Idle`.
pub fn classify(rows: &[String]) -> Candidate {
    for signals in DIALOG_SIGNALS {
        if count_signals(rows, signals) >= 2 {
            return Candidate::WaitingInput;
        }
    }
    if any_row_contains(rows, "Press Enter to continue") {
        return Candidate::WaitingInput;
    }

    // Claude renders "esc to interrupt" (with a spinner word like ✻ Thinking…)
    // for the whole duration of a turn.
    if rows
        .iter()
        .any(|row| row.to_lowercase().contains("esc to interrupt"))
    {
        return Candidate::Busy;
    }

    // Composer prompt: `❯` (U+276F) at the start of the input line, which
    // may sit inside the composer's box border.  Status text may render
    // below it, so scan all rows bottom-up.
    if rows.iter().rev().any(|row| {
        let content = row.trim().trim_start_matches('\u{2502}').trim_start();
        content.starts_with('\u{276f}')
    }) {
        return Candidate::Idle;
    }

    // No affordance on screen — either startup or scrollback mid-redraw.
    match last_non_empty(rows) {
        Some(_) => Candidate::Busy,
        None => Candidate::Idle,
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
