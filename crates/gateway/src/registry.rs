use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

use {
    tokio::sync::{RwLock, mpsc, watch},
    tokio_util::sync::CancellationToken,
    tracing::debug,
};

use wicket_protocol::ConnId;

use crate::ControlError;

// ── Registered connection ────────────────────────────────────────────────────

/// A WebSocket client currently admitted to the gateway.
#[derive(Debug)]
pub struct RegisteredConnection {
    pub conn_id: ConnId,
    /// Set only when admitted via a one-time code; used for revocation lookup.
    pub access_request_id: Option<String>,
    /// Channel for sending serialized frames to this client's write loop.
    pub sender: mpsc::UnboundedSender<String>,
    /// Cancelled to force-close the connection.
    pub cancel: CancellationToken,
    pub connected_at: Instant,
}

impl RegisteredConnection {
    /// Send a serialized JSON frame. Returns false if the write loop is gone.
    pub fn send(&self, frame: &str) -> bool {
        self.sender.send(frame.to_string()).is_ok()
    }
}

// ── Connection registry ──────────────────────────────────────────────────────

/// Live connections, keyed by their gateway-assigned id.
///
/// Ids come from a process-lifetime counter, so no two concurrently
/// registered connections ever share one. Snapshots of the current id set
/// are published on a watch channel for the operator surface.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnId, RegisteredConnection>>,
    next_id: AtomicU64,
    snapshot: watch::Sender<Vec<ConnId>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Vec::new());
        Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            snapshot,
        }
    }

    /// Admit a connection: assign a fresh id, store the entry, publish.
    pub async fn register(
        &self,
        sender: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
        access_request_id: Option<String>,
    ) -> ConnId {
        let conn_id = ConnId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mut connections = self.connections.write().await;
        connections.insert(conn_id, RegisteredConnection {
            conn_id,
            access_request_id,
            sender,
            cancel,
            connected_at: Instant::now(),
        });
        self.publish(&connections);
        conn_id
    }

    /// Idempotent removal; no-op if the id is absent.
    pub async fn unregister(&self, conn_id: ConnId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.remove(&conn_id) {
            debug!(
                conn = %conn_id,
                uptime_secs = connection.connected_at.elapsed().as_secs(),
                "connection unregistered"
            );
            self.publish(&connections);
        }
    }

    /// Deliver one frame to one connection. False if it is gone.
    pub async fn send_to(&self, conn_id: ConnId, frame: &str) -> bool {
        let connections = self.connections.read().await;
        connections.get(&conn_id).is_some_and(|c| c.send(frame))
    }

    /// Deliver one frame to every connection registered right now.
    pub async fn broadcast(&self, frame: &str) {
        let connections = self.connections.read().await;
        for connection in connections.values() {
            if !connection.send(frame) {
                debug!(conn = %connection.conn_id, "broadcast skipped closed connection");
            }
        }
    }

    /// Snapshot of currently registered ids.
    pub async fn list(&self) -> Vec<ConnId> {
        let connections = self.connections.read().await;
        let mut ids: Vec<ConnId> = connections.keys().copied().collect();
        ids.sort();
        ids
    }

    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Force-close the connection admitted for `request_id`.
    ///
    /// Unlike approve/refuse, a miss here is a caller error: revocation is
    /// expected to reference a known, currently admitted identity.
    pub async fn revoke_by_access_request(&self, request_id: &str) -> Result<ConnId, ControlError> {
        let mut connections = self.connections.write().await;
        let conn_id = connections
            .values()
            .find(|c| c.access_request_id.as_deref() == Some(request_id))
            .map(|c| c.conn_id)
            .ok_or_else(|| ControlError::UnknownConnection(request_id.to_string()))?;
        if let Some(connection) = connections.remove(&conn_id) {
            connection.cancel.cancel();
        }
        self.publish(&connections);
        Ok(conn_id)
    }

    /// Observe the id snapshot: current value immediately, then every change.
    pub fn watch(&self) -> watch::Receiver<Vec<ConnId>> {
        self.snapshot.subscribe()
    }

    /// Cancel and drop every connection (gateway shutdown).
    pub async fn drain(&self) {
        let mut connections = self.connections.write().await;
        for connection in connections.values() {
            connection.cancel.cancel();
        }
        connections.clear();
        self.publish(&connections);
    }

    fn publish(&self, connections: &HashMap<ConnId, RegisteredConnection>) {
        let mut ids: Vec<ConnId> = connections.keys().copied().collect();
        ids.sort();
        self.snapshot.send_replace(ids);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn entry() -> (mpsc::UnboundedSender<String>, mpsc::UnboundedReceiver<String>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn assigns_unique_sequential_ids() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = entry();
        let a = registry
            .register(tx.clone(), CancellationToken::new(), None)
            .await;
        let b = registry.register(tx, CancellationToken::new(), None).await;
        assert_ne!(a, b);
        assert_eq!(registry.list().await, vec![a, b]);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = entry();
        let id = registry.register(tx, CancellationToken::new(), None).await;
        registry.unregister(id).await;
        registry.unregister(id).await;
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn send_to_missing_connection_is_false() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.send_to(ConnId(99), "{}").await);
    }

    #[tokio::test]
    async fn revoke_cancels_and_removes() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = entry();
        let cancel = CancellationToken::new();
        let id = registry
            .register(tx, cancel.clone(), Some("req-1".into()))
            .await;

        let revoked = registry.revoke_by_access_request("req-1").await.unwrap();
        assert_eq!(revoked, id);
        assert!(cancel.is_cancelled());
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn revoke_unknown_is_an_error() {
        let registry = ConnectionRegistry::new();
        let err = registry.revoke_by_access_request("nope").await.unwrap_err();
        assert!(matches!(err, ControlError::UnknownConnection(_)));
    }

    #[tokio::test]
    async fn shared_code_connections_are_not_revocable() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = entry();
        registry.register(tx, CancellationToken::new(), None).await;
        assert!(registry.revoke_by_access_request("req-1").await.is_err());
    }

    #[tokio::test]
    async fn watch_sees_registrations() {
        let registry = ConnectionRegistry::new();
        let mut watcher = registry.watch();
        assert!(watcher.borrow().is_empty());

        let (tx, _rx) = entry();
        let id = registry.register(tx, CancellationToken::new(), None).await;
        watcher.changed().await.unwrap();
        assert_eq!(*watcher.borrow(), vec![id]);
    }
}
