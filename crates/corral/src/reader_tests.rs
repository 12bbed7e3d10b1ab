// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use bytes::Bytes;

use super::*;
use crate::test_support::bare_session;

#[tokio::test]
async fn feed_appends_history_then_screen_then_room() {
    let broker = Broker::new();
    let (session, _in, _rz) = bare_session("s1", Default::default());
    broker.register(&session);

    let sub = broker.subscriber();
    let mut joined = broker.join(sub, &session).await.unwrap();

    feed_output(&session, &broker, Bytes::from_static(b"hello\r\n")).await;

    let term = session.terminal.read().await;
    assert_eq!(term.history.snapshot(), Bytes::from_static(b"hello\r\n"));
    let first_row = term.screen.lines().into_iter().next().unwrap();
    assert!(first_row.starts_with("hello"));
    drop(term);

    assert_eq!(joined.feed.recv().await.unwrap(), Bytes::from_static(b"hello\r\n"));
}

#[tokio::test]
async fn chunk_identity_is_preserved_through_fanout() {
    let broker = Broker::new();
    let (session, _in, _rz) = bare_session("s1", Default::default());
    broker.register(&session);

    let sub = broker.subscriber();
    let mut joined = broker.join(sub, &session).await.unwrap();

    feed_output(&session, &broker, Bytes::from_static(b"ab")).await;
    feed_output(&session, &broker, Bytes::from_static(b"cd")).await;

    // Two chunks in, two chunks out — never merged or split.
    assert_eq!(joined.feed.recv().await.unwrap(), Bytes::from_static(b"ab"));
    assert_eq!(joined.feed.recv().await.unwrap(), Bytes::from_static(b"cd"));
    let term = session.terminal.read().await;
    assert_eq!(term.history.chunk_count(), 2);
}
