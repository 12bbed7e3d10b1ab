// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription broker: per-session rooms multiplexing the byte streams of
//! many sessions to many subscribers.
//!
//! Subscriber contract: every chunk a session emits is delivered exactly
//! once to each current room member over a bounded broadcast queue; a slow
//! subscriber lags and loses the *oldest* chunks rather than stalling the
//! reader task.  On join, the full pre-join history snapshot is returned to
//! the joiner and is strictly ordered before any live chunk — `join` takes
//! the session's terminal read lock while the bytes path publishes under the
//! write lock, so a chunk lands in the snapshot or the live feed, never both.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, Weak};

use bytes::Bytes;
use tokio::sync::broadcast;

use crate::error::ErrorCode;
use crate::session::Session;

/// Opaque per-connection subscriber handle.
pub type SubscriberId = u64;

/// Buffered chunks per subscriber before drop-oldest kicks in.
const SUBSCRIBER_QUEUE: usize = 256;

struct Room {
    bytes_tx: broadcast::Sender<Bytes>,
    members: HashSet<SubscriberId>,
    session: Weak<Session>,
}

#[derive(Default)]
struct Tables {
    rooms: HashMap<String, Room>,
    /// Which room each subscriber currently occupies.  One room per
    /// subscriber channel: joining a second session force-leaves the first.
    attached: HashMap<SubscriberId, String>,
}

/// Result of a successful join.
pub struct Joined {
    /// Entire pre-join output history.
    pub snapshot: Bytes,
    /// Live chunks from the moment of join onward.
    pub feed: broadcast::Receiver<Bytes>,
}

/// Routes terminal bytes to per-session rooms.  One value, owned by the
/// supervisor, shared with every transport connection.
///
/// The `feed` handle returned by [`Broker::join`] is the delivery channel
/// itself: transports must drop it on leave/disconnect — `leave` and
/// `disconnect` only update room bookkeeping and viewer-focus tracking.
pub struct Broker {
    tables: Mutex<Tables>,
    next_subscriber: AtomicU64,
}

fn lock_tables(broker: &Broker) -> MutexGuard<'_, Tables> {
    match broker.tables.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Broker {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            next_subscriber: AtomicU64::new(1),
        }
    }

    /// Allocate a subscriber id for a new transport connection.
    pub fn subscriber(&self) -> SubscriberId {
        self.next_subscriber.fetch_add(1, Ordering::Relaxed)
    }

    /// Create the room for a newly registered session.
    pub fn register(&self, session: &std::sync::Arc<Session>) {
        let (bytes_tx, _) = broadcast::channel(SUBSCRIBER_QUEUE);
        let mut tables = lock_tables(self);
        tables.rooms.insert(
            session.id.clone(),
            Room {
                bytes_tx,
                members: HashSet::new(),
                session: std::sync::Arc::downgrade(session),
            },
        );
    }

    /// Tear down a session's room; members' feeds observe a closed channel.
    pub fn deregister(&self, session_id: &str) {
        let mut tables = lock_tables(self);
        if let Some(room) = tables.rooms.remove(session_id) {
            for member in &room.members {
                tables.attached.remove(member);
            }
        }
    }

    /// Join `subscriber` to the session's room, force-leaving any previous
    /// room on the same channel, and capture the snapshot + live feed pair.
    pub async fn join(
        &self,
        subscriber: SubscriberId,
        session: &std::sync::Arc<Session>,
    ) -> Result<Joined, ErrorCode> {
        // Hold the terminal read lock across room mutation + snapshot so the
        // bytes path (which publishes under the write lock) cannot interleave.
        let term = session.terminal.read().await;
        let mut tables = lock_tables(self);

        if let Some(previous) = tables.attached.insert(subscriber, session.id.clone()) {
            if previous != session.id {
                leave_room(&mut tables, subscriber, &previous);
            }
        }

        let Some(room) = tables.rooms.get_mut(&session.id) else {
            tables.attached.remove(&subscriber);
            return Err(ErrorCode::UnknownSession);
        };
        room.members.insert(subscriber);
        session
            .is_active
            .store(true, std::sync::atomic::Ordering::Relaxed);

        let feed = room.bytes_tx.subscribe();
        let snapshot = term.history.snapshot();
        Ok(Joined { snapshot, feed })
    }

    /// Remove `subscriber` from the session's room.
    pub fn leave(&self, subscriber: SubscriberId, session_id: &str) {
        let mut tables = lock_tables(self);
        if tables.attached.get(&subscriber).map(String::as_str) == Some(session_id) {
            tables.attached.remove(&subscriber);
        }
        leave_room(&mut tables, subscriber, session_id);
    }

    /// Drop `subscriber` from all rooms and clear its tracking.
    pub fn disconnect(&self, subscriber: SubscriberId) {
        let mut tables = lock_tables(self);
        if let Some(session_id) = tables.attached.remove(&subscriber) {
            leave_room(&mut tables, subscriber, &session_id);
        }
    }

    /// Deliver one chunk to the session's room.
    ///
    /// Called by the reader task under the session's terminal write lock;
    /// never blocks (lagging members drop their oldest chunks).
    pub fn publish(&self, session_id: &str, bytes: &Bytes) {
        let tables = lock_tables(self);
        if let Some(room) = tables.rooms.get(session_id) {
            let _ = room.bytes_tx.send(bytes.clone());
        }
    }

    /// Number of members currently in a session's room.
    pub fn room_size(&self, session_id: &str) -> usize {
        let tables = lock_tables(self);
        tables
            .rooms
            .get(session_id)
            .map(|room| room.members.len())
            .unwrap_or(0)
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove a member from a room, updating the session's viewer-focus flag
/// when the room empties.
fn leave_room(tables: &mut Tables, subscriber: SubscriberId, session_id: &str) {
    if let Some(room) = tables.rooms.get_mut(session_id) {
        room.members.remove(&subscriber);
        if room.members.is_empty() {
            if let Some(session) = room.session.upgrade() {
                session
                    .is_active
                    .store(false, std::sync::atomic::Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
