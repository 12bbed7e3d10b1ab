// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn client_frames_parse() {
    let msg: ClientMessage = serde_json::from_str(
        r#"{"event": "subscribe_session", "payload": {"sessionId": "abc"}}"#,
    )
    .unwrap();
    assert!(matches!(
        msg,
        ClientMessage::SubscribeSession { session_id } if session_id == "abc"
    ));

    let msg: ClientMessage = serde_json::from_str(
        r#"{"event": "input", "payload": {"sessionId": "abc", "data": "ls\r"}}"#,
    )
    .unwrap();
    assert!(matches!(
        msg,
        ClientMessage::Input { data, .. } if data == "ls\r"
    ));

    let msg: ClientMessage = serde_json::from_str(
        r#"{"event": "resize", "payload": {"sessionId": "abc", "cols": 120, "rows": 40}}"#,
    )
    .unwrap();
    assert!(matches!(
        msg,
        ClientMessage::Resize { cols: 120, rows: 40, .. }
    ));
}

#[test]
fn server_frames_serialize() {
    let json = serde_json::to_value(ServerMessage::TerminalData {
        session_id: "abc".into(),
        data: "hello".into(),
    })
    .unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "event": "terminal_data",
            "payload": {"sessionId": "abc", "data": "hello"}
        })
    );

    let json = serde_json::to_value(ServerMessage::SessionUpdate {
        id: "abc".into(),
        state: "waiting_input".into(),
        exit_code: None,
        signal: None,
    })
    .unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "event": "session_update",
            "payload": {"id": "abc", "state": "waiting_input"}
        })
    );
}

#[test]
fn final_update_carries_exit_status() {
    let json = serde_json::to_value(ServerMessage::SessionUpdate {
        id: "abc".into(),
        state: "exited".into(),
        exit_code: Some(1),
        signal: None,
    })
    .unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "event": "session_update",
            "payload": {"id": "abc", "state": "exited", "exitCode": 1}
        })
    );
}

#[test]
fn unknown_event_is_rejected() {
    let parsed: Result<ClientMessage, _> =
        serde_json::from_str(r#"{"event": "reboot", "payload": {}}"#);
    assert!(parsed.is_err());
}
