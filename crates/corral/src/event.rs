// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio::sync::broadcast;

use crate::pty::ExitStatus;
use crate::session::SessionState;

/// Daemon-wide session lifecycle events.
///
/// Emitted on the [`EventBus`] in the order the transitions were applied, so
/// every subscriber observes a session's updates in commit order.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Created {
        id: String,
        name: Option<String>,
        agent_id: Option<String>,
    },
    StateChanged {
        id: String,
        prev: SessionState,
        next: SessionState,
        seq: u64,
    },
    Destroyed {
        id: String,
        status: Option<ExitStatus>,
    },
}

impl SessionEvent {
    /// Return the session identifier for this event.
    pub fn session_id(&self) -> &str {
        match self {
            Self::Created { id, .. } | Self::StateChanged { id, .. } | Self::Destroyed { id, .. } => id,
        }
    }
}

/// Typed event bus owned by the daemon and handed to components by value.
///
/// Cheap to clone; all clones share the same broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

/// Buffered events per subscriber before drop-oldest kicks in.
const EVENT_QUEUE: usize = 256;

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_QUEUE);
        Self { tx }
    }

    /// Subscribe to all session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all current subscribers.  Never blocks; a send with
    /// no subscribers is a no-op.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
