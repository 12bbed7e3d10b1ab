// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal response filtering for subscriber input.
//!
//! Terminal emulators on the viewer side auto-generate terminal-to-host
//! response sequences (device attributes, status reports).  Forwarded
//! verbatim they register as phantom keystrokes in the child, so they are
//! stripped before input reaches the PTY.  Cursor Position Reports are
//! special-cased: Claude Code consumes them but floods without a debounce,
//! so they are extracted for last-wins delivery on claude sessions and
//! passed through unchanged for everything else.

use regex::bytes::Regex;

/// Input data after scrubbing, with any extracted CPR sequences.
#[derive(Debug, PartialEq, Eq)]
pub struct Scrubbed {
    pub data: Vec<u8>,
    pub cprs: Vec<Vec<u8>>,
}

/// Compiled matchers for the auto-generated response sequences.
pub struct ResponseFilter {
    device_attrs: Regex,
    device_attrs_secondary: Regex,
    mode_report: Regex,
    status_report: Regex,
    cursor_report: Regex,
}

impl ResponseFilter {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            // Primary and secondary Device Attributes: ESC [ ? ... c / ESC [ > ... c
            device_attrs: Regex::new(r"\x1b\[\?[0-9;]*c")?,
            device_attrs_secondary: Regex::new(r"\x1b\[>[0-9;]*c")?,
            // Mode Status Report: ESC [ ? Pm ; Ps $ y
            mode_report: Regex::new(r"\x1b\[\?[0-9]+;[0-9]+\$y")?,
            // Device Status Report replies: ESC [ 0 n / ESC [ 3 n
            status_report: Regex::new(r"\x1b\[[03]n")?,
            // Cursor Position Report: ESC [ row ; col R
            cursor_report: Regex::new(r"\x1b\[[0-9]+;[0-9]+R")?,
        })
    }

    /// Strip response sequences from one input payload.
    ///
    /// With `extract_cpr`, cursor position reports are removed from `data`
    /// and returned separately for debounced delivery; otherwise they stay
    /// in the stream untouched.
    pub fn scrub(&self, data: &[u8], extract_cpr: bool) -> Scrubbed {
        let pass1 = self.device_attrs.replace_all(data, &b""[..]);
        let pass2 = self.device_attrs_secondary.replace_all(&pass1, &b""[..]);
        let pass3 = self.mode_report.replace_all(&pass2, &b""[..]);
        let pass4 = self.status_report.replace_all(&pass3, &b""[..]);

        if !extract_cpr {
            return Scrubbed {
                data: pass4.into_owned(),
                cprs: Vec::new(),
            };
        }

        let cprs: Vec<Vec<u8>> = self
            .cursor_report
            .find_iter(&pass4)
            .map(|m| m.as_bytes().to_vec())
            .collect();
        let data = self.cursor_report.replace_all(&pass4, &b""[..]).into_owned();
        Scrubbed { data, cprs }
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
