// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reader task: drains the PTY child's output and performs the bytes path —
//! history append, screen feed, and room fan-out — serialized per session.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::broker::Broker;
use crate::pty::ExitStatus;
use crate::supervisor::Supervisor;

use super::Session;

/// Apply one output chunk: append to history, feed the headless screen, and
/// fan out to the session's room, all under the terminal write lock so a
/// joining subscriber's snapshot read cannot interleave.
pub async fn feed_output(session: &Session, broker: &Broker, bytes: Bytes) {
    let mut term = session.terminal.write().await;
    term.history.push(bytes.clone());
    term.screen.feed(&bytes);
    broker.publish(&session.id, &bytes);
}

/// Drain the reader loop until the child exits, then hand the session back
/// to the supervisor for teardown.
pub(crate) async fn run_reader(
    sup: Arc<Supervisor>,
    session: Arc<Session>,
    mut backend_handle: JoinHandle<anyhow::Result<ExitStatus>>,
    mut output_rx: mpsc::Receiver<Bytes>,
) {
    loop {
        tokio::select! {
            data = output_rx.recv() => {
                match data {
                    Some(bytes) => feed_output(&session, &sup.broker, bytes).await,
                    None => break,
                }
            }
            _ = session.cancel.cancelled() => break,
        }
    }

    // Capture any output that raced the exit.
    while let Ok(bytes) = output_rx.try_recv() {
        feed_output(&session, &sup.broker, bytes).await;
    }

    // Wait for the backend to report the exit status; abandoned backends
    // (e.g. a fake that never exits) are aborted after the grace window.
    let status = tokio::select! {
        result = &mut backend_handle => match result {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                warn!(session = %session.id, "backend error: {e}");
                Some(ExitStatus { code: Some(1), signal: None })
            }
            Err(e) => {
                warn!(session = %session.id, "backend task panicked: {e}");
                Some(ExitStatus { code: Some(1), signal: None })
            }
        },
        _ = tokio::time::sleep(sup.stop_grace()) => {
            debug!(session = %session.id, "backend did not exit in time, aborting");
            backend_handle.abort();
            None
        }
    };

    sup.finalize_session(&session, status).await;
}

#[cfg(test)]
#[path = "../reader_tests.rs"]
mod tests;
