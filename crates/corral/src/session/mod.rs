// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session entity: PTY child ownership, terminal state, and the guarded
//! state record that the detector, auto-approver, and transports share.

pub mod reader;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32};
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::detect::{Candidate, DetectionStrategy};
use crate::event::{EventBus, SessionEvent};
use crate::history::ChunkRing;
use crate::hooks::{HookRunner, HookSet};
use crate::pty::ExitStatus;
use crate::screen::Screen;

/// Discrete session state driven by the detector and the auto-approver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Busy,
    WaitingInput,
    PendingAutoApproval,
}

impl SessionState {
    /// Wire-format string for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::WaitingInput => "waiting_input",
            Self::PendingAutoApproval => "pending_auto_approval",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate transition accruing dwell time.
#[derive(Debug, Clone, Copy)]
pub struct PendingTransition {
    pub candidate: Candidate,
    pub since: tokio::time::Instant,
}

/// Mutable per-session state, always accessed under the session's state lock.
///
/// The verifier cancellation token lives here, under the same lock as
/// `state`, so observing `PendingAutoApproval` and cancelling the verifier
/// is one critical section.
#[derive(Debug)]
pub struct StateRecord {
    pub state: SessionState,
    pub pending: Option<PendingTransition>,
    pub auto_approval_failed: bool,
    pub verifier_cancel: Option<CancellationToken>,
    pub seq: u64,
}

impl Default for StateRecord {
    fn default() -> Self {
        Self {
            // A freshly spawned agent is launching and producing output.
            state: SessionState::Busy,
            pending: None,
            auto_approval_failed: false,
            verifier_cancel: None,
            seq: 0,
        }
    }
}

/// Terminal-side state: the headless screen and the output history ring.
/// Guarded together so the bytes path (history append + screen feed +
/// fan-out) excludes snapshot readers.
#[derive(Debug)]
pub struct Terminal {
    pub screen: Screen,
    pub history: ChunkRing,
}

/// Everything needed to create a session, supplied by the transport layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSpec {
    pub worktree_path: PathBuf,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub detection_strategy: DetectionStrategy,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub hooks: HookSet,
}

/// A live supervised session.
pub struct Session {
    pub id: String,
    pub name: Option<String>,
    pub worktree_path: PathBuf,
    pub agent_id: Option<String>,
    pub strategy: DetectionStrategy,
    pub command: String,
    pub args: Vec<String>,
    /// Git branch of the worktree at creation time, for hook environments.
    pub branch: Option<String>,
    pub created_at_ms: u64,
    pub hooks: HookSet,

    pub terminal: RwLock<Terminal>,
    pub state: Mutex<StateRecord>,
    pub is_active: AtomicBool,
    pub child_pid: AtomicU32,
    pub exit_status: RwLock<Option<ExitStatus>>,

    /// Raw bytes to the PTY child.  Closed senders mean the child exited;
    /// writes after that are silently discarded.
    pub input_tx: mpsc::Sender<Bytes>,
    pub resize_tx: mpsc::Sender<(u16, u16)>,

    /// Cancels the sampler and any in-flight verifier on teardown.
    pub cancel: CancellationToken,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("strategy", &self.strategy)
            .field("command", &self.command)
            .finish()
    }
}

impl Session {
    /// Commit a state transition and its observable effects as one unit.
    ///
    /// Must be called with the state lock held (`rec` borrows the guarded
    /// record).  Sets the state, clears the pending dwell fields, bumps the
    /// sequence, emits the event, and fires the matching status hook —
    /// callers that need extra bookkeeping (sticky failure flags) apply it
    /// in the same critical section.
    pub fn commit_state(
        &self,
        rec: &mut StateRecord,
        next: SessionState,
        events: &EventBus,
        hooks: &Arc<HookRunner>,
    ) {
        let prev = rec.state;
        if prev == next {
            return;
        }
        // Leaving waiting_input for any other state ends the episode and
        // clears the sticky failure flag.
        if prev == SessionState::WaitingInput {
            rec.auto_approval_failed = false;
        }
        rec.state = next;
        rec.pending = None;
        rec.seq += 1;
        events.emit(SessionEvent::StateChanged {
            id: self.id.clone(),
            prev,
            next,
            seq: rec.seq,
        });
        hooks.fire_status(self, next);
    }

    /// Current committed state.
    pub async fn current_state(&self) -> SessionState {
        self.state.lock().await.state
    }

    /// Whether the child is still running.
    pub async fn alive(&self) -> bool {
        self.exit_status.read().await.is_none()
    }
}

/// Best-effort read of the checked-out branch name for a worktree.
///
/// Handles both a `.git` directory and a `.git` file pointing at a linked
/// worktree gitdir.  Detached HEADs and non-repos yield `None`.
pub fn read_branch(worktree: &Path) -> Option<String> {
    let dot_git = worktree.join(".git");
    let head_path = if dot_git.is_dir() {
        dot_git.join("HEAD")
    } else {
        let contents = std::fs::read_to_string(&dot_git).ok()?;
        let gitdir = contents.strip_prefix("gitdir:")?.trim();
        PathBuf::from(gitdir).join("HEAD")
    };
    let head = std::fs::read_to_string(head_path).ok()?;
    let head = head.trim();
    head.strip_prefix("ref: refs/heads/").map(str::to_owned)
}

#[cfg(test)]
#[path = "../session_tests.rs"]
mod tests;
