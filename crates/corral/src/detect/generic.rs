// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{last_non_empty, Candidate};

/// Fallback classifier for plain shells and unrecognized tools.
///
/// Returns `Idle` unless the last non-empty row clearly ends in an input
/// prompt, in which case the process is waiting on the operator.
pub fn classify(rows: &[String]) -> Candidate {
    let Some(last) = last_non_empty(rows) else {
        return Candidate::Idle;
    };

    if ends_in_prompt(last) {
        Candidate::WaitingInput
    } else {
        Candidate::Idle
    }
}

/// Whether a trimmed row reads as an input prompt.
fn ends_in_prompt(row: &str) -> bool {
    let lower = row.to_lowercase();
    if lower.ends_with("(y/n)")
        || lower.ends_with("[y/n]")
        || lower.ends_with("(y/n):")
        || lower.ends_with("[y/n]:")
        || lower.ends_with("password:")
    {
        return true;
    }
    matches!(
        row.chars().last(),
        Some('>') | Some('\u{276f}') | Some('?') | Some(':') | Some('$') | Some('#') | Some('%')
    )
}

#[cfg(test)]
#[path = "generic_tests.rs"]
mod tests;
