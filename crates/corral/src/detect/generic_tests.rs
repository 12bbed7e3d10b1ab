// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn rows(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| (*s).to_owned()).collect()
}

#[test]
fn empty_screen_is_idle() {
    assert_eq!(classify(&rows(&["", ""])), Candidate::Idle);
    assert_eq!(classify(&[]), Candidate::Idle);
}

#[test]
fn plain_output_is_idle() {
    let screen = rows(&["hello", "building project...", "done"]);
    assert_eq!(classify(&screen), Candidate::Idle);
}

#[test]
fn trailing_prompt_is_waiting_input() {
    assert_eq!(classify(&rows(&["hello", "> "])), Candidate::WaitingInput);
    assert_eq!(classify(&rows(&["continue? "])), Candidate::WaitingInput);
    assert_eq!(
        classify(&rows(&["Overwrite file [y/N]"])),
        Candidate::WaitingInput
    );
    assert_eq!(classify(&rows(&["Password:"])), Candidate::WaitingInput);
}

#[test]
fn shell_prompt_is_waiting_input() {
    assert_eq!(classify(&rows(&["op@host:~$"])), Candidate::WaitingInput);
}

#[test]
fn prompt_above_blank_rows_still_counts() {
    let screen = rows(&["choose an option:", "", ""]);
    assert_eq!(classify(&screen), Candidate::WaitingInput);
}
