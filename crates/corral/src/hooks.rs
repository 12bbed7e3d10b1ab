// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fire-and-forget status hooks: operator-configured shell commands run on
//! every state commit, with per-(session, kind) coalescing.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::session::{Session, SessionState};

/// Status hook kinds, one per committed session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    Idle,
    Busy,
    WaitingInput,
    PendingAutoApproval,
}

impl HookKind {
    pub fn for_state(state: SessionState) -> Self {
        match state {
            SessionState::Idle => Self::Idle,
            SessionState::Busy => Self::Busy,
            SessionState::WaitingInput => Self::WaitingInput,
            SessionState::PendingAutoApproval => Self::PendingAutoApproval,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::WaitingInput => "waiting_input",
            Self::PendingAutoApproval => "pending_auto_approval",
        }
    }
}

/// Per-session hook commands, one optional shell command per kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HookSet {
    pub idle: Option<String>,
    pub busy: Option<String>,
    pub waiting_input: Option<String>,
    pub pending_auto_approval: Option<String>,
}

impl HookSet {
    pub fn get(&self, kind: HookKind) -> Option<&str> {
        match kind {
            HookKind::Idle => self.idle.as_deref(),
            HookKind::Busy => self.busy.as_deref(),
            HookKind::WaitingInput => self.waiting_input.as_deref(),
            HookKind::PendingAutoApproval => self.pending_auto_approval.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.idle.is_none()
            && self.busy.is_none()
            && self.waiting_input.is_none()
            && self.pending_auto_approval.is_none()
    }
}

/// Dispatches hook commands detached from the core.
///
/// At most one instance per (session, kind) runs at a time; triggers that
/// arrive while one is running are coalesced into a single trailing run.
/// Nothing in the core ever awaits a hook.
pub struct HookRunner {
    /// (session id, kind) → whether a trailing re-run is pending.
    running: Mutex<HashMap<(String, HookKind), bool>>,
}

fn lock_running(runner: &HookRunner) -> MutexGuard<'_, HashMap<(String, HookKind), bool>> {
    match runner.running.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl HookRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            running: Mutex::new(HashMap::new()),
        })
    }

    /// Fire the status hook matching `state` for this session, if configured.
    pub fn fire_status(self: &Arc<Self>, session: &Session, state: SessionState) {
        let kind = HookKind::for_state(state);
        let Some(command) = session.hooks.get(kind) else {
            return;
        };
        let env = vec![
            ("CORRAL_SESSION_ID".to_owned(), session.id.clone()),
            (
                "CORRAL_WORKTREE".to_owned(),
                session.worktree_path.display().to_string(),
            ),
            (
                "CORRAL_BRANCH".to_owned(),
                session.branch.clone().unwrap_or_default(),
            ),
            ("CORRAL_STATE".to_owned(), kind.as_str().to_owned()),
        ];
        self.fire(session.id.clone(), kind, command.to_owned(), env);
    }

    /// Dispatch one hook run, coalescing concurrent triggers for the same
    /// (session, kind).
    fn fire(
        self: &Arc<Self>,
        session_id: String,
        kind: HookKind,
        command: String,
        env: Vec<(String, String)>,
    ) {
        let key = (session_id, kind);
        {
            let mut running = lock_running(self);
            if let Some(pending) = running.get_mut(&key) {
                *pending = true;
                return;
            }
            running.insert(key.clone(), false);
        }

        let runner = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                run_hook(&command, &env).await;
                let mut running = lock_running(&runner);
                match running.get_mut(&key) {
                    Some(pending) if *pending => {
                        *pending = false;
                        // re-run with the latest trigger coalesced in
                    }
                    _ => {
                        running.remove(&key);
                        break;
                    }
                }
            }
        });
    }
}

/// Run one hook command to completion, output discarded.
async fn run_hook(command: &str, env: &[(String, String)]) {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    for (key, value) in env {
        cmd.env(key, value);
    }

    match cmd.spawn() {
        Ok(mut child) => {
            let _ = child.wait().await;
        }
        Err(e) => debug!("hook spawn failed: {e}"),
    }
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
