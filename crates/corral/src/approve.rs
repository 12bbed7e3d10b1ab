// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-approval controller: when a session settles into `waiting_input`,
//! snapshot the prompt, ask the verifier whether it is safe, and either
//! synthesize the confirming keystroke or hand the prompt back to the
//! operator — without ever trapping the session in an approval loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::session::{Session, SessionState, StateRecord};
use crate::supervisor::Supervisor;

/// Verdict returned by a verifier for one prompt snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifierDecision {
    /// `true` means the prompt needs a human; `false` means safe to approve.
    pub needs_permission: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Replaceable judgement dependency.
///
/// The production implementation consults an external HTTP judge; tests use
/// the stubs in `test_support`.  Object-safe for `Arc<dyn Verifier>`.
pub trait Verifier: Send + Sync + 'static {
    fn verify<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<VerifierDecision>> + Send + 'a>>;
}

/// Verifier that POSTs the prompt snapshot to an external judge endpoint.
///
/// Request body: `{"text": "..."}`. Response body: a [`VerifierDecision`].
pub struct HttpVerifier {
    client: reqwest::Client,
    url: String,
}

impl HttpVerifier {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

impl Verifier for HttpVerifier {
    fn verify<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<VerifierDecision>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.url)
                .json(&serde_json::json!({ "text": text }))
                .send()
                .await?
                .error_for_status()?;
            let decision = response.json::<VerifierDecision>().await?;
            Ok(decision)
        })
    }
}

/// State-driven controller gating synthesized approvals.
pub struct AutoApprover {
    enabled: bool,
    timeout: Duration,
    verifier: Arc<dyn Verifier>,
}

impl AutoApprover {
    pub fn new(enabled: bool, timeout: Duration, verifier: Arc<dyn Verifier>) -> Self {
        Self {
            enabled,
            timeout,
            verifier,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Called by the sampler, under the state lock, immediately after a
    /// commit into `waiting_input` with a clear failure flag.
    ///
    /// When the feature is disabled this is a no-op: the session never
    /// enters `pending_auto_approval` at all.
    pub fn on_waiting_input(
        &self,
        sup: &Arc<Supervisor>,
        session: &Arc<Session>,
        rec: &mut StateRecord,
        rows: &[String],
    ) {
        if !self.enabled {
            return;
        }
        debug_assert!(rec.state == SessionState::WaitingInput);

        // Explicit controller transition; the sampler suspends while we own
        // the state.
        session.commit_state(rec, SessionState::PendingAutoApproval, &sup.events, &sup.hooks);

        let token = CancellationToken::new();
        rec.verifier_cancel = Some(token.clone());

        let text = rows.join("\n");
        tokio::spawn(run_verifier(
            Arc::clone(sup),
            Arc::clone(session),
            Arc::clone(&self.verifier),
            token,
            text,
            self.timeout,
        ));
    }

    /// Cancel an in-flight verification because the operator typed.
    ///
    /// Called under the state lock before the keystroke is forwarded.  The
    /// sticky failure flag keeps the same prompt from being re-attempted
    /// until the session leaves `waiting_input` again.
    pub fn cancel_for_input(
        &self,
        sup: &Arc<Supervisor>,
        session: &Session,
        rec: &mut StateRecord,
    ) {
        if rec.state != SessionState::PendingAutoApproval {
            return;
        }
        if let Some(token) = rec.verifier_cancel.take() {
            token.cancel();
        }
        session.commit_state(rec, SessionState::WaitingInput, &sup.events, &sup.hooks);
        rec.auto_approval_failed = true;
        debug!(session = %session.id, "auto-approval cancelled by user input");
    }
}

/// Drive one verification to its resolution.
///
/// Resolution happens under the session's state lock and only if the session
/// is still in `pending_auto_approval` with this task's token: the approval
/// keystroke, the forced `busy` state, the cleared dwell fields, and the
/// emitted event are one atomic update.
async fn run_verifier(
    sup: Arc<Supervisor>,
    session: Arc<Session>,
    verifier: Arc<dyn Verifier>,
    token: CancellationToken,
    text: String,
    budget: Duration,
) {
    let decision = tokio::select! {
        _ = token.cancelled() => return,
        _ = session.cancel.cancelled() => return,
        outcome = tokio::time::timeout(budget, verifier.verify(&text)) => match outcome {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                // Unreachable or broken verifier — conservative default.
                warn!(session = %session.id, "verifier failed: {e}");
                VerifierDecision {
                    needs_permission: true,
                    reason: Some("verifier failed".to_owned()),
                }
            }
            Err(_) => VerifierDecision {
                needs_permission: true,
                reason: Some("verifier timeout".to_owned()),
            },
        },
    };

    let mut rec = session.state.lock().await;
    if token.is_cancelled() || rec.state != SessionState::PendingAutoApproval {
        return;
    }
    rec.verifier_cancel = None;

    if decision.needs_permission {
        debug!(
            session = %session.id,
            reason = decision.reason.as_deref().unwrap_or(""),
            "auto-approval declined, returning prompt to operator"
        );
        session.commit_state(&mut rec, SessionState::WaitingInput, &sup.events, &sup.hooks);
        rec.auto_approval_failed = true;
        return;
    }

    // Safe: send the confirming Enter, then force busy so the next sampler
    // tick cannot re-classify the still-visible prompt and loop.
    let _ = session.input_tx.send(Bytes::from_static(b"\r")).await;
    session.commit_state(&mut rec, SessionState::Busy, &sup.events, &sup.hooks);
    debug!(session = %session.id, "prompt auto-approved");
}

#[cfg(test)]
#[path = "approve_tests.rs"]
mod tests;
