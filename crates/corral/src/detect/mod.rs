// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Screen-based state detection: one pure classifier per agent kind, applied
//! by the per-session sampler with dwell hysteresis.

pub mod claude;
pub mod codex;
pub mod cursor;
pub mod droid;
pub mod gemini;
pub mod generic;
pub mod pi;
pub mod sampler;

use serde::{Deserialize, Serialize};

use crate::session::SessionState;

/// Maximum number of screen rows a classifier ever sees.
pub const MAX_DETECT_ROWS: usize = 50;

/// A classifier verdict for one screen sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    Idle,
    Busy,
    WaitingInput,
}

impl Candidate {
    /// The session state this candidate commits to.
    pub fn state(self) -> SessionState {
        match self {
            Self::Idle => SessionState::Idle,
            Self::Busy => SessionState::Busy,
            Self::WaitingInput => SessionState::WaitingInput,
        }
    }
}

/// Which agent's screen heuristics to apply to a session.
///
/// Each strategy is a deterministic pure function over the rendered rows;
/// adding an agent means adding a variant and its module, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStrategy {
    Claude,
    Codex,
    Gemini,
    Pi,
    Cursor,
    Droid,
    #[default]
    Generic,
}

impl DetectionStrategy {
    /// Classify the tail of the rendered screen.
    pub fn classify(&self, rows: &[String]) -> Candidate {
        match self {
            Self::Claude => claude::classify(rows),
            Self::Codex => codex::classify(rows),
            Self::Gemini => gemini::classify(rows),
            Self::Pi => pi::classify(rows),
            Self::Cursor => cursor::classify(rows),
            Self::Droid => droid::classify(rows),
            Self::Generic => generic::classify(rows),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
            Self::Pi => "pi",
            Self::Cursor => "cursor",
            Self::Droid => "droid",
            Self::Generic => "generic",
        }
    }
}

impl std::fmt::Display for DetectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Shared row helpers -------------------------------------------------------

/// Last non-empty row, trimmed.
pub(crate) fn last_non_empty(rows: &[String]) -> Option<&str> {
    rows.iter().rev().map(|r| r.trim()).find(|r| !r.is_empty())
}

/// Whether any row starts with a braille spinner glyph (U+2800..U+28FF).
pub(crate) fn has_braille_spinner(rows: &[String]) -> bool {
    rows.iter().any(|row| {
        row.trim_start()
            .starts_with(|c: char| ('\u{2800}'..='\u{28FF}').contains(&c))
    })
}

/// Count how many of the signal phrases appear somewhere on screen.
///
/// Phrases are `(text, case_insensitive)`; dialog matches require two or
/// more signals so stray substrings in agent output don't misfire.
pub(crate) fn count_signals(rows: &[String], signals: &[(&str, bool)]) -> usize {
    let mut hits = 0;
    for &(phrase, ci) in signals {
        let found = rows.iter().any(|row| {
            let trimmed = row.trim();
            if ci {
                trimmed.to_lowercase().contains(&phrase.to_lowercase())
            } else {
                trimmed.contains(phrase)
            }
        });
        if found {
            hits += 1;
        }
    }
    hits
}

/// Whether any row contains the given phrase (exact case).
pub(crate) fn any_row_contains(rows: &[String], phrase: &str) -> bool {
    rows.iter().any(|row| row.contains(phrase))
}
