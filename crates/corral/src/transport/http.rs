// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers mirroring the in-process API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::session::SessionSpec;

use super::{encode_keys, error_response, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub session_count: usize,
    /// Per-session pid and byte counters.
    pub sessions: Vec<crate::supervisor::SessionStats>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sessions = state.supervisor.session_stats().await;
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        session_count: sessions.len(),
        sessions,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub id: String,
    pub name: Option<String>,
    pub agent_id: Option<String>,
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<SessionSpec>,
) -> impl IntoResponse {
    match state.supervisor.create_session(spec).await {
        Ok(session) => Json(CreateSessionResponse {
            id: session.id.clone(),
            name: session.name.clone(),
            agent_id: session.agent_id.clone(),
        })
        .into_response(),
        Err(code) => error_response(code, "session not created").into_response(),
    }
}

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.supervisor.list_sessions().await)
}

pub async fn stop_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.supervisor.stop_session(&id).await {
        Ok(()) => Json(serde_json::json!({ "stopping": true })).into_response(),
        Err(code) => error_response(code, "stop rejected").into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputRequest {
    pub data: Option<String>,
    pub keys: Vec<String>,
}

impl Default for InputRequest {
    fn default() -> Self {
        Self {
            data: None,
            keys: Vec::new(),
        }
    }
}

pub async fn input(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<InputRequest>,
) -> impl IntoResponse {
    let mut bytes = req.data.map(String::into_bytes).unwrap_or_default();
    match encode_keys(&req.keys) {
        Ok(encoded) => bytes.extend_from_slice(&encoded),
        Err(unknown) => {
            return error_response(ErrorCode::InvalidArgument, &format!("unknown key: {unknown}"))
                .into_response();
        }
    }
    if bytes.is_empty() {
        return error_response(ErrorCode::InvalidArgument, "empty input").into_response();
    }
    match state.supervisor.write_input(&id, Bytes::from(bytes)).await {
        Ok(()) => Json(serde_json::json!({ "written": true })).into_response(),
        Err(code) => error_response(code, "input rejected").into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeRequest {
    pub cols: u16,
    pub rows: u16,
}

pub async fn resize(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ResizeRequest>,
) -> impl IntoResponse {
    match state.supervisor.resize(&id, req.cols, req.rows).await {
        Ok(()) => Json(serde_json::json!({ "cols": req.cols, "rows": req.rows })).into_response(),
        Err(code) => error_response(code, "resize rejected").into_response(),
    }
}

pub async fn snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.supervisor.snapshot(&id).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response(),
        Err(code) => error_response(code, "unknown session").into_response(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenResponse {
    pub lines: Vec<String>,
    pub cols: u16,
    pub rows: u16,
}

pub async fn screen(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.supervisor.screen_lines(&id).await {
        Ok((lines, cols, rows)) => Json(ScreenResponse { lines, cols, rows }).into_response(),
        Err(code) => error_response(code, "unknown session").into_response(),
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
