// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon wiring: tracing, verifier selection, HTTP server, and
//! signal-driven graceful shutdown.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::approve::{HttpVerifier, Verifier, VerifierDecision};
use crate::config::Config;
use crate::supervisor::Supervisor;
use crate::transport::{build_router, AppState};

/// Initialize tracing from the config's level and format.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    if config.log_format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Verifier used when no judge is configured: every prompt needs a human.
/// With auto-approval disabled it is never consulted at all.
struct NeedsHumanVerifier;

impl Verifier for NeedsHumanVerifier {
    fn verify<'a>(
        &'a self,
        _text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<VerifierDecision>> + Send + 'a>> {
        Box::pin(async {
            Ok(VerifierDecision {
                needs_permission: true,
                reason: Some("no verifier configured".to_owned()),
            })
        })
    }
}

/// Run the daemon until SIGINT/SIGTERM, then stop every session and exit.
pub async fn run(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let verifier: Arc<dyn Verifier> = match config.verifier_url.clone() {
        Some(url) => Arc::new(HttpVerifier::new(url)),
        None => Arc::new(NeedsHumanVerifier),
    };

    let supervisor = Supervisor::new(config.core(), verifier);
    let state = AppState::new(Arc::clone(&supervisor))?;
    let router = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(addr = %addr, "corrald listening");

    // Separate token for the HTTP server: sessions keep running (and get a
    // proper SIGTERM → grace → SIGKILL stop) after the listener closes.
    let stop = tokio_util::sync::CancellationToken::new();
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = async {
                match sigterm.as_mut() {
                    Some(sig) => { sig.recv().await; }
                    None => std::future::pending().await,
                }
            } => {}
        }
        info!("shutdown signal received");
        signal_stop.cancel();
    });

    axum::serve(listener, router)
        .with_graceful_shutdown(stop.cancelled_owned())
        .await
        .context("serve")?;

    supervisor.shutdown_all().await;
    info!("corrald stopped");
    Ok(())
}
