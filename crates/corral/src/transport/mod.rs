// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport over the supervisor's in-process API.

pub mod filter;
pub mod http;
pub mod ws;

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ErrorCode;
use crate::supervisor::Supervisor;

use filter::ResponseFilter;

/// Shared transport state passed to all handlers via axum's `State`.
pub struct AppState {
    pub supervisor: Arc<Supervisor>,
    pub filter: ResponseFilter,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(supervisor: Arc<Supervisor>) -> anyhow::Result<Arc<Self>> {
        Ok(Arc::new(Self {
            supervisor,
            filter: ResponseFilter::new()?,
            started_at: Instant::now(),
        }))
    }
}

/// Top-level error response envelope shared across HTTP and WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body containing a machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Convert an [`ErrorCode`] into an axum JSON error response.
pub fn error_response(code: ErrorCode, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    let status =
        StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorResponse {
        error: ErrorBody {
            code: code.as_str().to_owned(),
            message: message.to_owned(),
        },
    };
    (status, Json(body))
}

/// Translate a named key to its terminal escape sequence (case-insensitive).
pub fn encode_key(name: &str) -> Option<Vec<u8>> {
    let lower = name.to_lowercase();
    let bytes: &[u8] = match lower.as_str() {
        "enter" | "return" => b"\r",
        "tab" => b"\t",
        "escape" | "esc" => b"\x1b",
        "backspace" => b"\x7f",
        "delete" | "del" => b"\x1b[3~",
        "up" => b"\x1b[A",
        "down" => b"\x1b[B",
        "right" => b"\x1b[C",
        "left" => b"\x1b[D",
        "home" => b"\x1b[H",
        "end" => b"\x1b[F",
        "pageup" | "page_up" => b"\x1b[5~",
        "pagedown" | "page_down" => b"\x1b[6~",
        "space" => b" ",
        _ => {
            // Generic Ctrl-<letter> handler
            if let Some(ch_str) = lower.strip_prefix("ctrl-") {
                let ch = ch_str.chars().next()?;
                if ch.is_ascii_lowercase() {
                    let ctrl = (ch.to_ascii_uppercase() as u8).wrapping_sub(b'@');
                    return Some(vec![ctrl]);
                }
            }
            return None;
        }
    };
    Some(bytes.to_vec())
}

/// Convert named key sequences to raw bytes for PTY input.
///
/// Returns an error carrying the unrecognised key name if any key is unknown.
pub fn encode_keys(keys: &[String]) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    for key in keys {
        match encode_key(key) {
            Some(bytes) => out.extend_from_slice(&bytes),
            None => return Err(key.clone()),
        }
    }
    Ok(out)
}

/// Build the axum `Router` with all HTTP and WebSocket routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::health))
        .route(
            "/api/v1/sessions",
            get(http::list_sessions).post(http::create_session),
        )
        .route(
            "/api/v1/sessions/{id}",
            axum::routing::delete(http::stop_session),
        )
        .route("/api/v1/sessions/{id}/input", post(http::input))
        .route("/api/v1/sessions/{id}/resize", post(http::resize))
        .route("/api/v1/sessions/{id}/snapshot", get(http::snapshot))
        .route("/api/v1/sessions/{id}/screen", get(http::screen))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
