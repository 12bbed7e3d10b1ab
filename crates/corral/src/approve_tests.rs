// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{bare_session, test_supervisor, StubVerifier};

#[test]
fn decision_wire_format() {
    let decision: VerifierDecision =
        serde_json::from_str(r#"{"needsPermission": true, "reason": "touches prod"}"#).unwrap();
    assert!(decision.needs_permission);
    assert_eq!(decision.reason.as_deref(), Some("touches prod"));

    let safe: VerifierDecision = serde_json::from_str(r#"{"needsPermission": false}"#).unwrap();
    assert!(!safe.needs_permission);
    assert!(safe.reason.is_none());
}

#[tokio::test]
async fn cancel_for_input_outside_pending_is_noop() {
    let sup = test_supervisor(true, StubVerifier::safe());
    let (session, _in, _rz) = bare_session("s1", Default::default());

    let mut rec = session.state.lock().await;
    sup.approval.cancel_for_input(&sup, &session, &mut rec);
    assert_eq!(rec.state, SessionState::Busy);
    assert!(!rec.auto_approval_failed);
}

#[tokio::test]
async fn disabled_controller_never_enters_pending() {
    let sup = test_supervisor(false, StubVerifier::safe());
    let (session, _in, _rz) = bare_session("s1", Default::default());

    let mut rec = session.state.lock().await;
    rec.state = SessionState::WaitingInput;
    sup.approval
        .on_waiting_input(&sup, &session, &mut rec, &["ok? ".to_owned()]);
    assert_eq!(rec.state, SessionState::WaitingInput);
    assert!(rec.verifier_cancel.is_none());
}
