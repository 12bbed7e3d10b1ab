// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session supervisor: the registry of live sessions and the in-process API
//! surface the transports call into.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::approve::{AutoApprover, Verifier};
use crate::broker::Broker;
use crate::config::CoreConfig;
use crate::detect::sampler;
use crate::error::ErrorCode;
use crate::event::{EventBus, SessionEvent};
use crate::history::ChunkRing;
use crate::hooks::HookRunner;
use crate::pty::spawn::NativePty;
use crate::pty::{Backend, ExitStatus};
use crate::screen::Screen;
use crate::session::{reader, read_branch, Session, SessionSpec, StateRecord, Terminal};

/// Initial PTY window handed to every child.
pub const INITIAL_COLS: u16 = 80;
pub const INITIAL_ROWS: u16 = 24;

/// Upper bound on accepted resize dimensions.
const MAX_DIMENSION: u16 = 1000;

/// Registry entry summary for list views.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub name: Option<String>,
    pub path: String,
    pub state: String,
    pub is_active: bool,
    pub agent_id: Option<String>,
    pub created_at: u64,
    /// Recorded once the child has exited; `None` while it is running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<ExitStatus>,
}

/// Per-session runtime counters for health reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub id: String,
    pub pid: Option<u32>,
    /// Total bytes the child has ever emitted.
    pub bytes_ingested: u64,
    /// Bytes currently buffered in the history ring.
    pub bytes_buffered: usize,
    pub chunks: usize,
}

/// Owns every live session and the daemon-wide collaborators.
pub struct Supervisor {
    cfg: CoreConfig,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    pub broker: Broker,
    pub events: EventBus,
    pub hooks: Arc<HookRunner>,
    pub approval: AutoApprover,
    pub shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(cfg: CoreConfig, verifier: Arc<dyn Verifier>) -> Arc<Self> {
        let approval = AutoApprover::new(cfg.auto_approve, cfg.verifier_timeout, verifier);
        Arc::new(Self {
            cfg,
            sessions: RwLock::new(HashMap::new()),
            broker: Broker::new(),
            events: EventBus::new(),
            hooks: HookRunner::new(),
            approval,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn sample_interval(&self) -> Duration {
        self.cfg.sample
    }

    pub fn dwell(&self) -> Duration {
        self.cfg.dwell
    }

    pub fn stop_grace(&self) -> Duration {
        self.cfg.stop_grace
    }

    /// Spawn a PTY child for the spec and register the resulting session.
    pub async fn create_session(
        self: &Arc<Self>,
        spec: SessionSpec,
    ) -> Result<Arc<Session>, ErrorCode> {
        if spec.command.is_empty() {
            return Err(ErrorCode::InvalidArgument);
        }
        if !spec.worktree_path.is_dir() {
            return Err(ErrorCode::InvalidPath);
        }
        if !executable_exists(&spec.command) {
            warn!(command = %spec.command, "spawn failed: executable not found");
            return Err(ErrorCode::SpawnFailed);
        }

        let backend = NativePty::spawn(
            &spec.command,
            &spec.args,
            &spec.worktree_path,
            INITIAL_COLS,
            INITIAL_ROWS,
        )
        .map_err(|e| {
            warn!(command = %spec.command, "spawn failed: {e:#}");
            ErrorCode::SpawnFailed
        })?;

        Ok(self.attach_backend(spec, Box::new(backend)).await)
    }

    /// Register a session around an already-constructed backend.
    ///
    /// Split out of [`create_session`] so tests can inject a scripted
    /// backend instead of a real PTY.
    pub async fn attach_backend(
        self: &Arc<Self>,
        spec: SessionSpec,
        mut backend: Box<dyn Backend>,
    ) -> Arc<Session> {
        let id = uuid::Uuid::new_v4().to_string();
        let pid = backend.child_pid().unwrap_or(0);

        let (output_tx, output_rx) = mpsc::channel::<Bytes>(256);
        let (input_tx, input_rx) = mpsc::channel::<Bytes>(256);
        let (resize_tx, resize_rx) = mpsc::channel::<(u16, u16)>(4);

        let backend_handle =
            tokio::spawn(async move { backend.run(output_tx, input_rx, resize_rx).await });

        let session = Arc::new(Session {
            id: id.clone(),
            name: spec.name,
            branch: read_branch(&spec.worktree_path),
            worktree_path: spec.worktree_path,
            agent_id: spec.agent_id,
            strategy: spec.detection_strategy,
            command: spec.command,
            args: spec.args,
            created_at_ms: epoch_ms(),
            hooks: spec.hooks,
            terminal: RwLock::new(Terminal {
                screen: Screen::new(INITIAL_COLS, INITIAL_ROWS),
                history: ChunkRing::new(self.cfg.history_cap),
            }),
            state: tokio::sync::Mutex::new(StateRecord::default()),
            is_active: std::sync::atomic::AtomicBool::new(false),
            child_pid: std::sync::atomic::AtomicU32::new(pid),
            exit_status: RwLock::new(None),
            input_tx,
            resize_tx,
            cancel: self.shutdown.child_token(),
        });

        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::clone(&session));
        self.broker.register(&session);
        self.events.emit(SessionEvent::Created {
            id: id.clone(),
            name: session.name.clone(),
            agent_id: session.agent_id.clone(),
        });

        tokio::spawn(reader::run_reader(
            Arc::clone(self),
            Arc::clone(&session),
            backend_handle,
            output_rx,
        ));
        sampler::spawn_sampler(Arc::clone(self), Arc::clone(&session));

        info!(session = %id, command = %session.command, "session created");
        session
    }

    /// Look up a live session by id.
    pub async fn get(&self, id: &str) -> Result<Arc<Session>, ErrorCode> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(ErrorCode::UnknownSession)
    }

    /// Signal the child to stop: SIGTERM now, SIGKILL after the grace window.
    pub async fn stop_session(&self, id: &str) -> Result<(), ErrorCode> {
        let session = self.get(id).await?;
        let pid = session
            .child_pid
            .load(std::sync::atomic::Ordering::Acquire);

        if pid != 0 {
            let _ = kill(Pid::from_raw(-(pid as i32)), Signal::SIGTERM);
        } else {
            // Backends without a real child (tests) tear down via the token.
            session.cancel.cancel();
        }

        let grace = self.cfg.stop_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if session.alive().await && pid != 0 {
                debug!(session = %session.id, "grace expired, sending SIGKILL");
                let _ = kill(Pid::from_raw(-(pid as i32)), Signal::SIGKILL);
            }
        });
        Ok(())
    }

    /// Forward raw bytes to the child, cancelling any in-flight approval.
    ///
    /// Writes after the child exited are silently discarded.
    pub async fn write_input(self: &Arc<Self>, id: &str, bytes: Bytes) -> Result<(), ErrorCode> {
        let session = self.get(id).await?;
        {
            let mut rec = session.state.lock().await;
            self.approval.cancel_for_input(self, &session, &mut rec);
        }
        let _ = session.input_tx.send(bytes).await;
        Ok(())
    }

    /// Resize the PTY window and the headless screen together.
    ///
    /// The screen is reseeded from the surviving history suffix so the
    /// detector sees a coherent grid at the new size.  Resizes after the
    /// child exited are silently discarded.
    pub async fn resize(&self, id: &str, cols: u16, rows: u16) -> Result<(), ErrorCode> {
        if cols == 0 || rows == 0 || cols > MAX_DIMENSION || rows > MAX_DIMENSION {
            return Err(ErrorCode::InvalidArgument);
        }
        let session = self.get(id).await?;
        {
            let mut term = session.terminal.write().await;
            let replay = term.history.snapshot();
            term.screen.reseed(cols, rows, &replay);
        }
        let _ = session.resize_tx.try_send((cols, rows));
        Ok(())
    }

    /// Concatenated output history for late subscribers.
    pub async fn snapshot(&self, id: &str) -> Result<Bytes, ErrorCode> {
        let session = self.get(id).await?;
        let term = session.terminal.read().await;
        Ok(term.history.snapshot())
    }

    /// Rendered screen rows (the detector's view of the session).
    pub async fn screen_lines(&self, id: &str) -> Result<(Vec<String>, u16, u16), ErrorCode> {
        let session = self.get(id).await?;
        let term = session.terminal.read().await;
        let (cols, rows) = term.screen.size();
        Ok((term.screen.lines(), cols, rows))
    }

    /// Summaries of all live sessions.
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();
        let mut infos = Vec::with_capacity(sessions.len());
        for session in sessions {
            infos.push(SessionInfo {
                id: session.id.clone(),
                name: session.name.clone(),
                path: session.worktree_path.display().to_string(),
                state: session.current_state().await.as_str().to_owned(),
                is_active: session
                    .is_active
                    .load(std::sync::atomic::Ordering::Relaxed),
                agent_id: session.agent_id.clone(),
                created_at: session.created_at_ms,
                exit_status: *session.exit_status.read().await,
            });
        }
        infos
    }

    /// Per-session runtime counters (pid, byte counts) for health reporting.
    pub async fn session_stats(&self) -> Vec<SessionStats> {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();
        let mut stats = Vec::with_capacity(sessions.len());
        for session in sessions {
            let pid = session
                .child_pid
                .load(std::sync::atomic::Ordering::Acquire);
            let term = session.terminal.read().await;
            stats.push(SessionStats {
                id: session.id.clone(),
                pid: (pid != 0).then_some(pid),
                bytes_ingested: term.history.appended(),
                bytes_buffered: term.history.len_bytes(),
                chunks: term.history.chunk_count(),
            });
        }
        stats
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Tear down a session after its child exited: record the status, stop
    /// the sampler and any verifier, drop the room, and emit the final event.
    pub(crate) async fn finalize_session(&self, session: &Arc<Session>, status: Option<ExitStatus>) {
        {
            let mut exit = session.exit_status.write().await;
            *exit = Some(status.unwrap_or(ExitStatus {
                code: None,
                signal: None,
            }));
        }
        {
            let mut rec = session.state.lock().await;
            if let Some(token) = rec.verifier_cancel.take() {
                token.cancel();
            }
        }
        session.cancel.cancel();

        self.sessions.write().await.remove(&session.id);
        self.broker.deregister(&session.id);
        self.events.emit(SessionEvent::Destroyed {
            id: session.id.clone(),
            status,
        });
        info!(session = %session.id, ?status, "session destroyed");
    }

    /// Stop every session and wait for teardown, bounded by the grace window.
    pub async fn shutdown_all(&self) {
        let ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        for id in &ids {
            let _ = self.stop_session(id).await;
        }

        let deadline = tokio::time::Instant::now() + self.cfg.stop_grace * 2;
        while self.session_count().await > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.shutdown.cancel();
    }
}

/// Whether `command` resolves to an executable, either as a path or on PATH.
fn executable_exists(command: &str) -> bool {
    if command.contains('/') {
        return Path::new(command).is_file();
    }
    let Ok(path) = std::env::var("PATH") else {
        return false;
    };
    path.split(':')
        .any(|dir| !dir.is_empty() && Path::new(dir).join(command).is_file())
}

/// Current UTC time as milliseconds since the Unix epoch.
fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
