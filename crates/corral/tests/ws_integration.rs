// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol tests over real connections against an in-process
//! axum server, with scripted backends standing in for PTY children.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use corral::detect::DetectionStrategy;
use corral::supervisor::Supervisor;
use corral::test_support::{
    fake_spec, spawn_http_server, test_supervisor, wait_for, ScriptedBackend, StubVerifier,
};
use corral::transport::AppState;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsTx = futures_util::stream::SplitSink<WsStream, WsMessage>;
type WsRx = futures_util::stream::SplitStream<WsStream>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn connect(addr: &std::net::SocketAddr) -> anyhow::Result<(WsTx, WsRx)> {
    let (stream, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await?;
    Ok(stream.split())
}

async fn ws_send(tx: &mut WsTx, value: &serde_json::Value) -> anyhow::Result<()> {
    let text = serde_json::to_string(value)?;
    tx.send(WsMessage::Text(text.into())).await?;
    Ok(())
}

async fn ws_recv(rx: &mut WsRx) -> anyhow::Result<serde_json::Value> {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, rx.next())
            .await
            .map_err(|_| anyhow::anyhow!("ws recv timeout"))?
            .ok_or_else(|| anyhow::anyhow!("ws stream closed"))??;
        match msg {
            WsMessage::Text(text) => return Ok(serde_json::from_str(&text)?),
            _ => continue,
        }
    }
}

/// Receive frames until one matches `event`, returning its payload.
async fn ws_recv_event(rx: &mut WsRx, event: &str) -> anyhow::Result<serde_json::Value> {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        let frame = ws_recv(rx).await?;
        if frame.get("event").and_then(|e| e.as_str()) == Some(event) {
            return Ok(frame.get("payload").cloned().unwrap_or_default());
        }
    }
    anyhow::bail!("no {event} frame before timeout")
}

fn subscribe_frame(session_id: &str) -> serde_json::Value {
    serde_json::json!({"event": "subscribe_session", "payload": {"sessionId": session_id}})
}

async fn daemon() -> anyhow::Result<(Arc<Supervisor>, std::net::SocketAddr)> {
    let sup = test_supervisor(false, StubVerifier::needs_human());
    let state = AppState::new(Arc::clone(&sup))?;
    let (addr, _handle) = spawn_http_server(state).await?;
    Ok((sup, addr))
}

#[tokio::test]
async fn late_subscriber_gets_snapshot_before_live_bytes() -> anyhow::Result<()> {
    let (sup, addr) = daemon().await?;

    // ~10 KiB of pre-subscribe history, then a live tail after a pause.
    let block = vec![b'x'; 10 * 1024];
    let block_len = block.len();
    let (backend, _inputs) = ScriptedBackend::new();
    let backend = backend
        .step(Duration::from_millis(10), block)
        .step(Duration::from_secs(1), Bytes::from_static(b"TAIL"));
    let session = sup
        .attach_backend(fake_spec(DetectionStrategy::Generic), Box::new(backend))
        .await;

    // Wait until the block is in history before joining.
    let filled = wait_for(Duration::from_secs(3), || {
        let sup = Arc::clone(&sup);
        let id = session.id.clone();
        async move {
            sup.snapshot(&id)
                .await
                .map(|s| s.len() >= block_len)
                .unwrap_or(false)
        }
    })
    .await;
    assert!(filled);

    let (mut tx, mut rx) = connect(&addr).await?;
    ws_send(&mut tx, &subscribe_frame(&session.id)).await?;

    // The first terminal_data frame is the whole snapshot.
    let payload = ws_recv_event(&mut rx, "terminal_data").await?;
    let data = payload
        .get("data")
        .and_then(|d| d.as_str())
        .ok_or_else(|| anyhow::anyhow!("no data field"))?
        .to_owned();
    assert!(data.len() >= block_len, "first frame was not the snapshot");
    assert!(!data.contains("TAIL"));

    // The live tail arrives afterwards, never duplicated into the snapshot.
    let payload = ws_recv_event(&mut rx, "terminal_data").await?;
    let tail = payload.get("data").and_then(|d| d.as_str()).unwrap_or("");
    assert!(tail.contains("TAIL"), "live frame: {tail:?}");
    Ok(())
}

#[tokio::test]
async fn dual_subscriber_isolation() -> anyhow::Result<()> {
    let (sup, addr) = daemon().await?;

    let (backend_a, _ia) = ScriptedBackend::new();
    let backend_a = backend_a
        .step(Duration::from_millis(200), Bytes::from_static(b"AAAA"))
        .step(Duration::from_millis(50), Bytes::from_static(b"AAAA"));
    let (backend_b, _ib) = ScriptedBackend::new();
    let backend_b = backend_b
        .step(Duration::from_millis(200), Bytes::from_static(b"BBBB"))
        .step(Duration::from_millis(50), Bytes::from_static(b"BBBB"));

    let a = sup
        .attach_backend(fake_spec(DetectionStrategy::Generic), Box::new(backend_a))
        .await;
    let b = sup
        .attach_backend(fake_spec(DetectionStrategy::Generic), Box::new(backend_b))
        .await;

    let (mut tx_a, mut rx_a) = connect(&addr).await?;
    ws_send(&mut tx_a, &subscribe_frame(&a.id)).await?;
    let (mut tx_b, mut rx_b) = connect(&addr).await?;
    ws_send(&mut tx_b, &subscribe_frame(&b.id)).await?;

    // Collect A's terminal bytes until both emissions arrived.
    let mut a_bytes = String::new();
    while a_bytes.len() < 8 {
        let payload = ws_recv_event(&mut rx_a, "terminal_data").await?;
        let session_id = payload.get("sessionId").and_then(|s| s.as_str());
        assert_eq!(session_id, Some(a.id.as_str()), "foreign session bytes");
        a_bytes.push_str(payload.get("data").and_then(|d| d.as_str()).unwrap_or(""));
    }
    assert_eq!(a_bytes, "AAAAAAAA");
    assert!(!a_bytes.contains('B'));

    // B's subscriber sees only B.
    let mut b_bytes = String::new();
    while b_bytes.len() < 8 {
        let payload = ws_recv_event(&mut rx_b, "terminal_data").await?;
        assert_eq!(
            payload.get("sessionId").and_then(|s| s.as_str()),
            Some(b.id.as_str())
        );
        b_bytes.push_str(payload.get("data").and_then(|d| d.as_str()).unwrap_or(""));
    }
    assert_eq!(b_bytes, "BBBBBBBB");

    // Byte-for-byte match with the supervisor's history.
    assert_eq!(
        sup.snapshot(&a.id).await.map(|s| s.len()).unwrap_or(0),
        a_bytes.len()
    );
    Ok(())
}

#[tokio::test]
async fn input_is_filtered_and_forwarded() -> anyhow::Result<()> {
    let (sup, addr) = daemon().await?;
    let (backend, mut inputs) = ScriptedBackend::new();
    let session = sup
        .attach_backend(fake_spec(DetectionStrategy::Generic), Box::new(backend))
        .await;

    let (mut tx, _rx) = connect(&addr).await?;
    // Device-attribute responses must be stripped; the keystroke survives.
    ws_send(
        &mut tx,
        &serde_json::json!({
            "event": "input",
            "payload": {"sessionId": session.id, "data": "\u{1b}[?1;2cls\r"}
        }),
    )
    .await?;

    let received = tokio::time::timeout(RECV_TIMEOUT, inputs.recv())
        .await
        .map_err(|_| anyhow::anyhow!("input never reached the child"))?
        .ok_or_else(|| anyhow::anyhow!("input channel closed"))?;
    assert_eq!(received, Bytes::from_static(b"ls\r"));
    Ok(())
}

#[tokio::test]
async fn cpr_is_debounced_last_wins_for_claude() -> anyhow::Result<()> {
    let (sup, addr) = daemon().await?;
    let (backend, mut inputs) = ScriptedBackend::new();
    let session = sup
        .attach_backend(fake_spec(DetectionStrategy::Claude), Box::new(backend))
        .await;

    let (mut tx, _rx) = connect(&addr).await?;
    for row in 1..=3 {
        ws_send(
            &mut tx,
            &serde_json::json!({
                "event": "input",
                "payload": {"sessionId": session.id, "data": format!("\u{1b}[{row};1R")}
            }),
        )
        .await?;
    }

    // Far fewer reports than were sent arrive, and the last one delivered
    // is the newest.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let mut delivered = Vec::new();
    while let Ok(report) = inputs.try_recv() {
        delivered.push(report);
    }
    assert!(
        !delivered.is_empty() && delivered.len() <= 2,
        "expected debouncing, saw {delivered:?}"
    );
    assert_eq!(delivered.last(), Some(&Bytes::from_static(b"\x1b[3;1R")));
    Ok(())
}

#[tokio::test]
async fn session_updates_reach_unscoped_subscribers() -> anyhow::Result<()> {
    let (sup, addr) = daemon().await?;

    // A connection with no room subscription at all.
    let (_tx, mut rx) = connect(&addr).await?;

    let (backend, _inputs) = ScriptedBackend::new();
    let backend = backend.step(
        Duration::from_millis(50),
        Bytes::from_static(b"Proceed? (y/n): "),
    );
    let session = sup
        .attach_backend(fake_spec(DetectionStrategy::Generic), Box::new(backend))
        .await;

    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    let mut saw_waiting = false;
    while tokio::time::Instant::now() < deadline {
        let payload = ws_recv_event(&mut rx, "session_update").await?;
        if payload.get("id").and_then(|i| i.as_str()) == Some(session.id.as_str())
            && payload.get("state").and_then(|s| s.as_str()) == Some("waiting_input")
        {
            saw_waiting = true;
            break;
        }
    }
    assert!(saw_waiting, "session_update never reached the subscriber");
    Ok(())
}

#[tokio::test]
async fn resize_applies_via_ws() -> anyhow::Result<()> {
    let (sup, addr) = daemon().await?;
    let (backend, _inputs) = ScriptedBackend::new();
    let session = sup
        .attach_backend(fake_spec(DetectionStrategy::Generic), Box::new(backend))
        .await;

    let (mut tx, _rx) = connect(&addr).await?;
    ws_send(
        &mut tx,
        &serde_json::json!({
            "event": "resize",
            "payload": {"sessionId": session.id, "cols": 132, "rows": 43}
        }),
    )
    .await?;

    let resized = wait_for(Duration::from_secs(2), || {
        let sup = Arc::clone(&sup);
        let id = session.id.clone();
        async move {
            sup.screen_lines(&id)
                .await
                .map(|(_, cols, rows)| (cols, rows) == (132, 43))
                .unwrap_or(false)
        }
    })
    .await;
    assert!(resized);
    Ok(())
}

#[tokio::test]
async fn health_reports_per_session_counters() -> anyhow::Result<()> {
    let (sup, addr) = daemon().await?;
    let (backend, _inputs) = ScriptedBackend::new();
    let backend = backend.step(Duration::from_millis(10), Bytes::from_static(b"hello"));
    let session = sup
        .attach_backend(fake_spec(DetectionStrategy::Generic), Box::new(backend))
        .await;

    let ingested = wait_for(Duration::from_secs(2), || {
        let sup = Arc::clone(&sup);
        let id = session.id.clone();
        async move {
            sup.snapshot(&id)
                .await
                .map(|s| s.len() >= 5)
                .unwrap_or(false)
        }
    })
    .await;
    assert!(ingested);

    let body: serde_json::Value = reqwest::get(format!("http://{addr}/api/v1/health"))
        .await?
        .json()
        .await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessionCount"], 1);

    let stats = body["sessions"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("sessions missing from health body"))?;
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0]["id"], serde_json::json!(session.id));
    // Scripted backends have no real child.
    assert!(stats[0]["pid"].is_null());
    assert!(stats[0]["bytesIngested"].as_u64().unwrap_or(0) >= 5);
    assert!(stats[0]["bytesBuffered"].as_u64().unwrap_or(0) >= 5);
    Ok(())
}

#[tokio::test]
async fn subscribe_unknown_session_yields_error_frame() -> anyhow::Result<()> {
    let (_sup, addr) = daemon().await?;
    let (mut tx, mut rx) = connect(&addr).await?;
    ws_send(&mut tx, &subscribe_frame("no-such-session")).await?;

    let payload = ws_recv_event(&mut rx, "error").await?;
    assert_eq!(
        payload.get("code").and_then(|c| c.as_str()),
        Some("UNKNOWN_SESSION")
    );
    Ok(())
}

#[tokio::test]
async fn destroyed_session_sends_final_update() -> anyhow::Result<()> {
    let (sup, addr) = daemon().await?;
    let (backend, _inputs) = ScriptedBackend::new();
    let (backend, exit) = backend.exit_trigger();
    let session = sup
        .attach_backend(fake_spec(DetectionStrategy::Generic), Box::new(backend))
        .await;

    let (_tx, mut rx) = connect(&addr).await?;
    // Give the server-side handler a moment to subscribe to the event bus.
    tokio::time::sleep(Duration::from_millis(100)).await;
    exit.send(corral::pty::ExitStatus {
        code: Some(7),
        signal: None,
    })
    .ok();

    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    let mut saw_exit = false;
    while tokio::time::Instant::now() < deadline {
        let payload = ws_recv_event(&mut rx, "session_update").await?;
        if payload.get("id").and_then(|i| i.as_str()) == Some(session.id.as_str())
            && payload.get("state").and_then(|s| s.as_str()) == Some("exited")
        {
            // The final update exposes the child's exit status.
            assert_eq!(payload.get("exitCode").and_then(|c| c.as_i64()), Some(7));
            assert!(payload.get("signal").is_none());
            saw_exit = true;
            break;
        }
    }
    assert!(saw_exit, "no final session_update after child exit");
    Ok(())
}
