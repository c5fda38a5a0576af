use std::time::Instant;

use {
    tokio::sync::{Mutex, oneshot, watch},
    tracing::debug,
};

/// Resolution delivered to a parked `/demande` long-poll.
#[derive(Debug, PartialEq, Eq)]
pub enum AccessReply {
    /// Approved: the full `<code>:<id>` credential for the follow-up
    /// connection upgrade.
    Granted { credential: String },
    Denied,
}

struct PendingRequest {
    id: String,
    reply: oneshot::Sender<AccessReply>,
    submitted_at: Instant,
}

/// Pending human-approval requests, in submission order.
///
/// Each entry parks one HTTP long-poll behind a oneshot reply handle that
/// is resolvable exactly once; the entry is removed the moment it resolves,
/// so approve-then-refuse races cannot happen by construction. Snapshots of
/// the pending id list are published on a watch channel.
pub struct AccessRequestQueue {
    pending: Mutex<Vec<PendingRequest>>,
    snapshot: watch::Sender<Vec<String>>,
}

impl Default for AccessRequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessRequestQueue {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Vec::new());
        Self {
            pending: Mutex::new(Vec::new()),
            snapshot,
        }
    }

    /// Park a new request. False (and no state change) if the id is
    /// already pending: a duplicate ask for an in-flight id carries no new
    /// information.
    pub async fn submit(&self, id: &str, reply: oneshot::Sender<AccessReply>) -> bool {
        let mut pending = self.pending.lock().await;
        if pending.iter().any(|r| r.id == id) {
            return false;
        }
        pending.push(PendingRequest {
            id: id.to_string(),
            reply,
            submitted_at: Instant::now(),
        });
        self.publish(&pending);
        true
    }

    /// Remove an entry for resolution, handing back its reply handle.
    pub async fn take(&self, id: &str) -> Option<oneshot::Sender<AccessReply>> {
        let mut pending = self.pending.lock().await;
        let position = pending.iter().position(|r| r.id == id)?;
        let entry = pending.remove(position);
        self.publish(&pending);
        debug!(
            request_id = %entry.id,
            waited_secs = entry.submitted_at.elapsed().as_secs(),
            "access request resolved"
        );
        Some(entry.reply)
    }

    /// Drop an entry without resolving it (TTL expiry). False if absent.
    pub async fn remove(&self, id: &str) -> bool {
        let mut pending = self.pending.lock().await;
        let Some(position) = pending.iter().position(|r| r.id == id) else {
            return false;
        };
        pending.remove(position);
        self.publish(&pending);
        true
    }

    /// Snapshot of currently pending ids, in submission order.
    pub async fn list(&self) -> Vec<String> {
        self.pending.lock().await.iter().map(|r| r.id.clone()).collect()
    }

    /// Observe the pending-id snapshot: current value immediately, then
    /// every change.
    pub fn watch(&self) -> watch::Receiver<Vec<String>> {
        self.snapshot.subscribe()
    }

    /// Deny everything still pending (gateway shutdown).
    pub async fn drain(&self) {
        let mut pending = self.pending.lock().await;
        for entry in pending.drain(..) {
            let _ = entry.reply.send(AccessReply::Denied);
        }
        self.publish(&pending);
    }

    fn publish(&self, pending: &[PendingRequest]) {
        self.snapshot
            .send_replace(pending.iter().map(|r| r.id.clone()).collect());
    }
}
