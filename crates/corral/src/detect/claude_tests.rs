// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn rows(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| (*s).to_owned()).collect()
}

#[test]
fn permission_dialog_is_waiting_input() {
    let screen = rows(&[
        "  Bash command",
        "  rm -rf target/",
        "  Do you want to proceed?",
        "  \u{276f} 1. Yes",
        "    2. Yes, and don't ask again for rm commands",
        "    3. No, and tell Claude what to do differently (esc)",
        "  Esc to cancel",
    ]);
    assert_eq!(classify(&screen), Candidate::WaitingInput);
}

#[test]
fn trust_dialog_is_waiting_input() {
    let screen = rows(&[
        " Accessing workspace: /home/op/proj",
        "  \u{276f} 1. Yes, I trust this folder",
        "    2. No, exit",
        " Enter to confirm \u{b7} Esc to exit",
    ]);
    assert_eq!(classify(&screen), Candidate::WaitingInput);
}

#[test]
fn press_enter_affordance_is_waiting_input() {
    let screen = rows(&["Security notes:", "", "  Press Enter to continue\u{2026}"]);
    assert_eq!(classify(&screen), Candidate::WaitingInput);
}

#[test]
fn spinner_turn_is_busy() {
    let screen = rows(&[
        "\u{273b} Thinking\u{2026} (3s \u{b7} esc to interrupt)",
        "",
        "  \u{276f} ",
    ]);
    // The interrupt affordance wins over the composer glyph.
    assert_eq!(classify(&screen), Candidate::Busy);
}

#[test]
fn composer_prompt_is_idle() {
    let screen = rows(&[
        "\u{256d}\u{2500}\u{2500}\u{2500}\u{256e}",
        "\u{2502} \u{276f}   \u{2502}",
        "\u{2570}\u{2500}\u{2500}\u{2500}\u{256f}",
        "  ? for shortcuts",
    ]);
    assert_eq!(classify(&screen), Candidate::Idle);
}

#[test]
fn plain_output_without_affordances_is_busy() {
    let screen = rows(&["Compiling corral v0.1.0", "warning: unused variable"]);
    assert_eq!(classify(&screen), Candidate::Busy);
}

#[test]
fn blank_screen_is_idle() {
    let screen = rows(&["", "", ""]);
    assert_eq!(classify(&screen), Candidate::Idle);
}

#[test]
fn single_signal_does_not_misfire() {
    // Agent output quoting one dialog phrase must not classify as a prompt.
    let screen = rows(&[
        "The dialog asks \"Do you want to proceed?\" before running.",
        "\u{273b} Running\u{2026} (esc to interrupt)",
    ]);
    assert_eq!(classify(&screen), Candidate::Busy);
}
