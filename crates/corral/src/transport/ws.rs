// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol: room-scoped terminal data plus daemon-wide session
//! updates, as consumed by the shipped front-ends.
//!
//! Messages are JSON frames with an `event` name and a `payload` object.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::broker::SubscriberId;
use crate::detect::DetectionStrategy;
use crate::error::ErrorCode;
use crate::event::SessionEvent;
use crate::session::SessionState;
use crate::supervisor::Supervisor;

use super::AppState;

/// Client → server frames.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    SubscribeSession { session_id: String },
    #[serde(rename_all = "camelCase")]
    UnsubscribeSession { session_id: String },
    #[serde(rename_all = "camelCase")]
    Input { session_id: String, data: String },
    #[serde(rename_all = "camelCase")]
    Resize {
        session_id: String,
        cols: u16,
        rows: u16,
    },
}

/// Server → client frames.
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    TerminalData { session_id: String, data: String },
    /// State broadcast; the final update for a destroyed session carries the
    /// child's exit code/signal.
    #[serde(rename_all = "camelCase")]
    SessionUpdate {
        id: String,
        state: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        signal: Option<i32>,
    },
    Error { code: String, message: String },
}

/// How long cursor position reports accumulate before the last one wins.
const CPR_DEBOUNCE: Duration = Duration::from_millis(100);

/// Last-wins debouncer for cursor position reports on claude sessions.
struct CprDebouncer {
    pending: Arc<tokio::sync::Mutex<Option<Bytes>>>,
    armed: Arc<AtomicBool>,
}

impl CprDebouncer {
    fn new() -> Self {
        Self {
            pending: Arc::new(tokio::sync::Mutex::new(None)),
            armed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Record the latest report and arm a single delayed flush.
    async fn offer(&self, sup: Arc<Supervisor>, session_id: String, report: Bytes) {
        *self.pending.lock().await = Some(report);
        if self.armed.swap(true, Ordering::AcqRel) {
            return;
        }
        let pending = Arc::clone(&self.pending);
        let armed = Arc::clone(&self.armed);
        tokio::spawn(async move {
            tokio::time::sleep(CPR_DEBOUNCE).await;
            armed.store(false, Ordering::Release);
            let report = pending.lock().await.take();
            if let Some(report) = report {
                let _ = sup.write_input(&session_id, report).await;
            }
        });
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(state, socket))
}

type WsSink = SplitSink<WebSocket, Message>;

async fn send_json(tx: &mut WsSink, msg: &ServerMessage) -> anyhow::Result<()> {
    let text = serde_json::to_string(msg)?;
    tx.send(Message::Text(text.into())).await?;
    Ok(())
}

async fn send_error(tx: &mut WsSink, code: ErrorCode, message: &str) -> anyhow::Result<()> {
    send_json(
        tx,
        &ServerMessage::Error {
            code: code.as_str().to_owned(),
            message: message.to_owned(),
        },
    )
    .await
}

/// Per-connection event loop.
async fn handle_connection(state: Arc<AppState>, socket: WebSocket) {
    let sup = Arc::clone(&state.supervisor);
    let subscriber: SubscriberId = sup.broker.subscriber();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut events_rx = sup.events.subscribe();

    // At most one attached room per connection; the broker enforces the same
    // invariant on its side.
    let mut feed: Option<(String, broadcast::Receiver<Bytes>)> = None;
    let debouncer = CprDebouncer::new();

    loop {
        tokio::select! {
            chunk = async {
                match feed.as_mut() {
                    Some((_, rx)) => rx.recv().await,
                    None => std::future::pending().await,
                }
            }, if feed.is_some() => {
                match chunk {
                    Ok(bytes) => {
                        let Some((session_id, _)) = &feed else { continue };
                        let msg = ServerMessage::TerminalData {
                            session_id: session_id.clone(),
                            data: String::from_utf8_lossy(&bytes).into_owned(),
                        };
                        if send_json(&mut ws_tx, &msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Slow subscriber: oldest chunks dropped by contract.
                        debug!(skipped, "subscriber lagged, dropped oldest chunks");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        feed = None;
                    }
                }
            }

            event = events_rx.recv() => {
                let Ok(event) = event else { continue };
                // Session updates go to every connected subscriber so list
                // views stay coherent; only terminal bytes are room-scoped.
                let msg = match event {
                    SessionEvent::Created { id, .. } => ServerMessage::SessionUpdate {
                        id,
                        state: SessionState::Busy.as_str().to_owned(),
                        exit_code: None,
                        signal: None,
                    },
                    SessionEvent::StateChanged { id, next, .. } => ServerMessage::SessionUpdate {
                        id,
                        state: next.as_str().to_owned(),
                        exit_code: None,
                        signal: None,
                    },
                    SessionEvent::Destroyed { id, status } => ServerMessage::SessionUpdate {
                        id,
                        state: "exited".to_owned(),
                        exit_code: status.and_then(|s| s.code),
                        signal: status.and_then(|s| s.signal),
                    },
                };
                if send_json(&mut ws_tx, &msg).await.is_err() {
                    break;
                }
            }

            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(_)) | None => break,
                };
                let text = match msg {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                let parsed: ClientMessage = match serde_json::from_str(&text) {
                    Ok(p) => p,
                    Err(e) => {
                        if send_error(&mut ws_tx, ErrorCode::InvalidArgument, &e.to_string())
                            .await
                            .is_err()
                        {
                            break;
                        }
                        continue;
                    }
                };
                if handle_client_message(&state, subscriber, parsed, &mut ws_tx, &mut feed, &debouncer)
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    }

    sup.broker.disconnect(subscriber);
}

/// Apply one client frame.  Returns `Err` only when the socket is dead.
async fn handle_client_message(
    state: &Arc<AppState>,
    subscriber: SubscriberId,
    msg: ClientMessage,
    ws_tx: &mut WsSink,
    feed: &mut Option<(String, broadcast::Receiver<Bytes>)>,
    debouncer: &CprDebouncer,
) -> anyhow::Result<()> {
    let sup = &state.supervisor;
    match msg {
        ClientMessage::SubscribeSession { session_id } => {
            let session = match sup.get(&session_id).await {
                Ok(s) => s,
                Err(code) => return send_error(ws_tx, code, "unknown session").await,
            };
            match sup.broker.join(subscriber, &session).await {
                Ok(joined) => {
                    // Snapshot first, then the live feed — in that order.
                    let msg = ServerMessage::TerminalData {
                        session_id: session_id.clone(),
                        data: String::from_utf8_lossy(&joined.snapshot).into_owned(),
                    };
                    send_json(ws_tx, &msg).await?;
                    *feed = Some((session_id, joined.feed));
                }
                Err(code) => return send_error(ws_tx, code, "join failed").await,
            }
        }
        ClientMessage::UnsubscribeSession { session_id } => {
            sup.broker.leave(subscriber, &session_id);
            if feed.as_ref().is_some_and(|(id, _)| *id == session_id) {
                *feed = None;
            }
        }
        ClientMessage::Input { session_id, data } => {
            let strategy = match sup.get(&session_id).await {
                Ok(session) => session.strategy,
                Err(code) => return send_error(ws_tx, code, "unknown session").await,
            };
            let scrubbed = state
                .filter
                .scrub(data.as_bytes(), strategy == DetectionStrategy::Claude);
            if !scrubbed.data.is_empty() {
                let _ = sup
                    .write_input(&session_id, Bytes::from(scrubbed.data))
                    .await;
            }
            for report in scrubbed.cprs {
                debouncer
                    .offer(Arc::clone(sup), session_id.clone(), Bytes::from(report))
                    .await;
            }
        }
        ClientMessage::Resize {
            session_id,
            cols,
            rows,
        } => {
            if let Err(code) = sup.resize(&session_id, cols, rows).await {
                return send_error(ws_tx, code, "resize rejected").await;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
