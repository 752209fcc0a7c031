//! Live connection registry.
//!
//! Maps [`ConnectionId`] to [`ConnectionInfo`] for every connection whose
//! transport is still open. Shared by the accept loop, every connection's
//! cleanup path, and any observer (admin views, tests).

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Notify;

use crate::net::connection::{ConnectionId, ConnectionInfo};

struct RegistryInner {
    connections: DashMap<ConnectionId, ConnectionInfo>,
    emptied: Notify,
}

/// Concurrent map of live connections. Cloning shares the same map.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                connections: DashMap::new(),
                emptied: Notify::new(),
            }),
        }
    }

    /// Register a connection. Returns the previous entry under the same id, if any.
    pub fn insert(&self, info: ConnectionInfo) -> Option<ConnectionInfo> {
        self.inner.connections.insert(info.id(), info)
    }

    /// Deregister a connection. Only the first call for a given id returns `Some`.
    pub fn remove(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        let removed = self.inner.connections.remove(&id).map(|(_, info)| info);
        if removed.is_some() && self.inner.connections.is_empty() {
            self.inner.emptied.notify_waiters();
        }
        removed
    }

    /// Look up a live connection.
    pub fn get(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.inner.connections.get(&id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.inner.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.connections.is_empty()
    }

    /// Point-in-time copy of all live connections, ordered by id.
    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        let mut entries: Vec<ConnectionInfo> = self
            .inner
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by_key(ConnectionInfo::id);
        entries
    }

    /// Visit every live connection until `visit` returns `false`.
    ///
    /// Iterates over a snapshot, so `visit` may call back into the registry
    /// (including `remove`) without deadlocking.
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&ConnectionInfo) -> bool,
    {
        for info in self.snapshot() {
            if !visit(&info) {
                break;
            }
        }
    }

    /// Wait until no connections are registered.
    pub async fn wait_empty(&self) {
        loop {
            let notified = self.inner.emptied.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("live", &self.len()).finish()
    }
}
