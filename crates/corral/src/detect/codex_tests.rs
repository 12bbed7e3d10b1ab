// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn rows(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| (*s).to_owned()).collect()
}

#[test]
fn approval_dialog_is_waiting_input() {
    let screen = rows(&[
        "  $ cargo test --workspace",
        "",
        "  Allow command?",
        "  \u{258c} Yes (y)",
        "    No, provide feedback (n)",
    ]);
    assert_eq!(classify(&screen), Candidate::WaitingInput);
}

#[test]
fn press_enter_affordance_is_waiting_input() {
    let screen = rows(&["Update available", "  Press Enter to continue"]);
    assert_eq!(classify(&screen), Candidate::WaitingInput);
}

#[test]
fn working_footer_is_busy() {
    let screen = rows(&[
        "  Ran cargo build",
        "",
        "  \u{2022} Working (8s \u{2022} Esc to interrupt)",
    ]);
    assert_eq!(classify(&screen), Candidate::Busy);
}

#[test]
fn spinner_is_busy() {
    let screen = rows(&["\u{2819} Running tests\u{2026}"]);
    assert_eq!(classify(&screen), Candidate::Busy);
}

#[test]
fn composer_prompt_is_idle() {
    let screen = rows(&[
        "  All checks passed.",
        "",
        "  \u{203a} Type a message",
        "  Ctrl+J newline",
    ]);
    assert_eq!(classify(&screen), Candidate::Idle);
}

#[test]
fn plain_output_is_busy() {
    let screen = rows(&["Compiling corral v0.1.0", "Finished dev profile"]);
    assert_eq!(classify(&screen), Candidate::Busy);
}

#[test]
fn blank_screen_is_idle() {
    assert_eq!(classify(&rows(&["", "", ""])), Candidate::Idle);
}

#[test]
fn single_signal_does_not_misfire() {
    // Output merely quoting one dialog phrase stays a working turn.
    let screen = rows(&[
        "The CLI shows \"Allow command?\" before running tools.",
        "  \u{2022} Working (2s \u{2022} Esc to interrupt)",
    ]);
    assert_eq!(classify(&screen), Candidate::Busy);
}
