// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: scripted backends, stub verifiers, and
//! builders with fast timings.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::approve::{Verifier, VerifierDecision};
use crate::config::CoreConfig;
use crate::detect::DetectionStrategy;
use crate::pty::{Backend, ExitStatus};
use crate::session::SessionSpec;
use crate::supervisor::Supervisor;
use crate::transport::{build_router, AppState};

/// One timed output emission; `delay` is relative to the previous step.
#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub delay: Duration,
    pub bytes: Bytes,
}

/// Fake backend that plays a timed output script and mirrors every input
/// write to the test, optionally echoing a canned reaction chunk.
pub struct ScriptedBackend {
    script: Vec<ScriptStep>,
    echo_on_input: Option<Bytes>,
    inputs_tx: mpsc::UnboundedSender<Bytes>,
    exit_rx: Option<oneshot::Receiver<ExitStatus>>,
}

impl ScriptedBackend {
    /// Create a backend plus the receiver observing the child's input.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        (
            Self {
                script: Vec::new(),
                echo_on_input: None,
                inputs_tx,
                exit_rx: None,
            },
            inputs_rx,
        )
    }

    /// Append a timed output emission.
    pub fn step(mut self, delay: Duration, bytes: impl Into<Bytes>) -> Self {
        self.script.push(ScriptStep {
            delay,
            bytes: bytes.into(),
        });
        self
    }

    /// Emit this chunk whenever input arrives (a child reacting to a key).
    pub fn echo_on_input(mut self, bytes: &'static [u8]) -> Self {
        self.echo_on_input = Some(Bytes::from_static(bytes));
        self
    }

    /// Wire an exit trigger the test can fire to simulate the child dying.
    pub fn exit_trigger(mut self) -> (Self, oneshot::Sender<ExitStatus>) {
        let (tx, rx) = oneshot::channel();
        self.exit_rx = Some(rx);
        (self, tx)
    }
}

impl Backend for ScriptedBackend {
    fn run(
        &mut self,
        output_tx: mpsc::Sender<Bytes>,
        mut input_rx: mpsc::Receiver<Bytes>,
        mut resize_rx: mpsc::Receiver<(u16, u16)>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ExitStatus>> + Send + '_>> {
        let script = std::mem::take(&mut self.script);
        let echo = self.echo_on_input.clone();
        let inputs = self.inputs_tx.clone();
        let mut exit_rx = self.exit_rx.take();

        Box::pin(async move {
            let mut idx = 0;
            let mut next_at = script
                .first()
                .map(|step| tokio::time::Instant::now() + step.delay);
            let mut input_open = true;
            let mut resize_open = true;

            loop {
                // Input EOF after the script finishes means the child is done.
                if !input_open && next_at.is_none() && exit_rx.is_none() {
                    return Ok(ExitStatus {
                        code: Some(0),
                        signal: None,
                    });
                }

                tokio::select! {
                    _ = async {
                        match next_at {
                            Some(at) => tokio::time::sleep_until(at).await,
                            None => std::future::pending().await,
                        }
                    }, if next_at.is_some() => {
                        let _ = output_tx.send(script[idx].bytes.clone()).await;
                        idx += 1;
                        next_at = script
                            .get(idx)
                            .map(|step| tokio::time::Instant::now() + step.delay);
                    }
                    input = input_rx.recv(), if input_open => {
                        match input {
                            Some(data) => {
                                let _ = inputs.send(data);
                                if let Some(ref echo) = echo {
                                    let _ = output_tx.send(echo.clone()).await;
                                }
                            }
                            None => input_open = false,
                        }
                    }
                    dims = resize_rx.recv(), if resize_open => {
                        if dims.is_none() {
                            resize_open = false;
                        }
                    }
                    status = async {
                        match exit_rx.as_mut() {
                            Some(rx) => rx.await,
                            None => std::future::pending().await,
                        }
                    }, if exit_rx.is_some() => {
                        return Ok(status.unwrap_or(ExitStatus {
                            code: Some(0),
                            signal: None,
                        }));
                    }
                }
            }
        })
    }

    fn child_pid(&self) -> Option<u32> {
        None
    }
}

/// Verifier returning a fixed decision after an optional delay.
pub struct StubVerifier {
    pub needs_permission: bool,
    pub delay: Duration,
}

impl StubVerifier {
    pub fn safe() -> Arc<Self> {
        Arc::new(Self {
            needs_permission: false,
            delay: Duration::ZERO,
        })
    }

    pub fn needs_human() -> Arc<Self> {
        Arc::new(Self {
            needs_permission: true,
            delay: Duration::ZERO,
        })
    }

    pub fn slow(needs_permission: bool, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            needs_permission,
            delay,
        })
    }
}

impl Verifier for StubVerifier {
    fn verify<'a>(
        &'a self,
        _text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<VerifierDecision>> + Send + 'a>> {
        Box::pin(async move {
            if self.delay > Duration::ZERO {
                tokio::time::sleep(self.delay).await;
            }
            Ok(VerifierDecision {
                needs_permission: self.needs_permission,
                reason: None,
            })
        })
    }
}

/// Core config with timings fast enough for tests.
pub fn fast_config(auto_approve: bool) -> CoreConfig {
    CoreConfig {
        sample: Duration::from_millis(10),
        dwell: Duration::from_millis(50),
        history_cap: 64 * 1024,
        stop_grace: Duration::from_millis(300),
        auto_approve,
        verifier_timeout: Duration::from_secs(5),
    }
}

/// Supervisor with fast timings and the given verifier.
pub fn test_supervisor(auto_approve: bool, verifier: Arc<dyn Verifier>) -> Arc<Supervisor> {
    Supervisor::new(fast_config(auto_approve), verifier)
}

/// Session spec pointing at the temp dir, for scripted backends.
pub fn fake_spec(strategy: DetectionStrategy) -> SessionSpec {
    SessionSpec {
        worktree_path: std::env::temp_dir(),
        command: "scripted".to_owned(),
        args: Vec::new(),
        detection_strategy: strategy,
        name: None,
        agent_id: None,
        hooks: Default::default(),
    }
}

/// Standalone session with no backend or tasks behind it, for unit tests
/// that poke the terminal and state record directly.
///
/// Returns the receivers for the input and resize channels so tests can
/// observe what would reach the child.
pub fn bare_session(
    id: &str,
    hooks: crate::hooks::HookSet,
) -> (
    Arc<crate::session::Session>,
    mpsc::Receiver<Bytes>,
    mpsc::Receiver<(u16, u16)>,
) {
    use crate::history::ChunkRing;
    use crate::screen::Screen;
    use crate::session::{Session, StateRecord, Terminal};

    let (input_tx, input_rx) = mpsc::channel(64);
    let (resize_tx, resize_rx) = mpsc::channel(4);
    let session = Arc::new(Session {
        id: id.to_owned(),
        name: None,
        worktree_path: std::env::temp_dir(),
        agent_id: None,
        strategy: DetectionStrategy::Generic,
        command: "scripted".to_owned(),
        args: Vec::new(),
        branch: None,
        created_at_ms: 0,
        hooks,
        terminal: tokio::sync::RwLock::new(Terminal {
            screen: Screen::new(80, 24),
            history: ChunkRing::new(64 * 1024),
        }),
        state: tokio::sync::Mutex::new(StateRecord::default()),
        is_active: std::sync::atomic::AtomicBool::new(false),
        child_pid: std::sync::atomic::AtomicU32::new(0),
        exit_status: tokio::sync::RwLock::new(None),
        input_tx,
        resize_tx,
        cancel: tokio_util::sync::CancellationToken::new(),
    });
    (session, input_rx, resize_rx)
}

/// Serve the router on an ephemeral port for transport tests.
pub async fn spawn_http_server(
    state: Arc<AppState>,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let router = build_router(state);
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok((addr, handle))
}

/// Poll a condition until it holds or the deadline passes.
pub async fn wait_for<F, Fut>(deadline: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let end = tokio::time::Instant::now() + deadline;
    while tokio::time::Instant::now() < end {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
