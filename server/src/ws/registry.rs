//! Connection registry: tracks every open WebSocket channel per user.
//!
//! A user may hold several channels at once (multiple tabs/devices). The
//! registry keeps the channel lists and the "online since" timestamps in one
//! structure behind a single lock, so a user is present in both maps or in
//! neither, and no reader ever sees a half-applied registration.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{ConnectionId, ConnectionSender, UserId};

/// One registered channel.
#[derive(Debug, Clone)]
struct Connection {
    id: ConnectionId,
    sender: ConnectionSender,
}

/// A channel copied out of the registry for delivery outside the lock.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
    pub sender: ConnectionSender,
}

#[derive(Debug, Default)]
struct RegistryInner {
    connections: HashMap<UserId, Vec<Connection>>,
    first_connected_at: HashMap<UserId, DateTime<Utc>>,
}

impl RegistryInner {
    fn online_user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.connections.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn recipients(&self) -> Vec<Recipient> {
        self.connections
            .iter()
            .flat_map(|(user_id, conns)| {
                conns.iter().map(move |conn| Recipient {
                    user_id: *user_id,
                    connection_id: conn.id,
                    sender: conn.sender.clone(),
                })
            })
            .collect()
    }

    /// Returns how many channels the user has afterwards.
    fn insert(&mut self, user_id: UserId, id: ConnectionId, sender: ConnectionSender) -> usize {
        let conns = self.connections.entry(user_id).or_default();
        conns.push(Connection { id, sender });
        let conn_count = conns.len();
        self.first_connected_at.entry(user_id).or_insert_with(Utc::now);
        conn_count
    }

    fn remove_user(&mut self, user_id: UserId) -> usize {
        self.first_connected_at.remove(&user_id);
        self.connections
            .remove(&user_id)
            .map(|conns| conns.len())
            .unwrap_or(0)
    }
}

/// In-memory registry of live channels, keyed by user.
///
/// Constructed once at startup and shared through `AppState`; nothing here is
/// global. All methods take `&self` and are safe to call from any task.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
    next_connection_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a channel for `user_id`. Stamps the connect time when this is the
    /// user's first channel. Duplicate senders are not deduplicated.
    pub fn register(&self, user_id: UserId, sender: ConnectionSender) -> ConnectionId {
        let id = self.next_id();
        let conn_count = self.inner.lock().insert(user_id, id, sender);
        log_registered(user_id, id, conn_count);
        id
    }

    /// Register a channel and run `on_registered` while the registry lock is
    /// still held, with the resulting online set and every registered channel
    /// (the new one included).
    ///
    /// Anything `on_registered` enqueues is guaranteed to precede messages
    /// from dispatches that observe the new channel. `on_registered` must not
    /// block or call back into the registry.
    pub fn register_with<F>(
        &self,
        user_id: UserId,
        sender: ConnectionSender,
        on_registered: F,
    ) -> ConnectionId
    where
        F: FnOnce(&[UserId], &[Recipient]),
    {
        let id = self.next_id();

        let mut inner = self.inner.lock();
        let conn_count = inner.insert(user_id, id, sender);
        on_registered(&inner.online_user_ids(), &inner.recipients());
        drop(inner);

        log_registered(user_id, id, conn_count);
        id
    }

    /// Run `f` with the online set and every registered channel under one
    /// lock acquisition. Presence snapshots enqueued from here reach every
    /// channel in the same order as the registry changes they describe.
    /// `f` must not block or call back into the registry.
    pub fn with_presence<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[UserId], &[Recipient]) -> R,
    {
        let inner = self.inner.lock();
        f(&inner.online_user_ids(), &inner.recipients())
    }

    /// Remove every channel of `user_id` and clear its connect time.
    /// Returns `false` when the user had nothing registered.
    pub fn unregister(&self, user_id: UserId) -> bool {
        let removed = self.inner.lock().remove_user(user_id);
        if removed > 0 {
            tracing::debug!(
                user_id = %user_id,
                connections = removed,
                "User unregistered"
            );
        }
        removed > 0
    }

    /// Remove a single channel. The user entry and its connect time go away
    /// with the last channel. Returns `false` when the channel was not found.
    pub fn unregister_connection(&self, user_id: UserId, connection_id: ConnectionId) -> bool {
        let mut inner = self.inner.lock();
        let Some(conns) = inner.connections.get_mut(&user_id) else {
            return false;
        };

        let before = conns.len();
        conns.retain(|conn| conn.id != connection_id);
        let removed = conns.len() != before;
        let remaining = conns.len();
        if remaining == 0 {
            inner.remove_user(user_id);
        }
        drop(inner);

        if removed {
            tracing::debug!(
                user_id = %user_id,
                connection_id = %connection_id,
                remaining,
                "Connection unregistered"
            );
        }
        removed
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.inner.lock().connections.contains_key(&user_id)
    }

    /// Snapshot of currently connected users, ascending by id.
    pub fn online_user_ids(&self) -> Vec<UserId> {
        self.inner.lock().online_user_ids()
    }

    /// When the user went from zero to one channel, if currently online.
    pub fn connected_at(&self, user_id: UserId) -> Option<DateTime<Utc>> {
        self.inner.lock().first_connected_at.get(&user_id).copied()
    }

    pub fn connection_count(&self, user_id: UserId) -> usize {
        self.inner
            .lock()
            .connections
            .get(&user_id)
            .map(|conns| conns.len())
            .unwrap_or(0)
    }

    pub fn user_count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    /// Copy out the channels of one user.
    pub fn recipients_for(&self, user_id: UserId) -> Vec<Recipient> {
        let inner = self.inner.lock();
        inner
            .connections
            .get(&user_id)
            .map(|conns| {
                conns
                    .iter()
                    .map(|conn| Recipient {
                        user_id,
                        connection_id: conn.id,
                        sender: conn.sender.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Copy out every registered channel.
    pub fn all_recipients(&self) -> Vec<Recipient> {
        self.inner.lock().recipients()
    }

    /// Drop all state. Test harnesses only.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.connections.clear();
        inner.first_connected_at.clear();
    }

    fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }
}

fn log_registered(user_id: UserId, id: ConnectionId, conn_count: usize) {
    tracing::debug!(
        user_id = %user_id,
        connection_id = %id,
        connections = conn_count,
        "Connection registered"
    );
}
