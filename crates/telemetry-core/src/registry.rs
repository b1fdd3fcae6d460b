//! Subscriber registry for live push delivery
//!
//! Each subscriber is a bounded queue whose receiving half is owned by the
//! connection task. The registry only holds the sending half, so a
//! connection that goes away closes its queue and is dropped on the next
//! broadcast.

use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::SendTimeoutError};

/// Registry-assigned handle for one push connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub_{}", self.0)
    }
}

/// Serialized payload shared by every recipient of a broadcast
pub type Payload = Arc<str>;

/// Outcome of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers the payload was queued for
    pub delivered: usize,
    /// Subscribers removed because their queue was closed or stayed full past the timeout
    pub dropped: Vec<SubscriberId>,
}

/// Thread-safe set of connected subscribers
pub struct SubscriberRegistry {
    members: RwLock<HashMap<SubscriberId, mpsc::Sender<Payload>>>,
    next_id: AtomicU64,
    send_timeout: Duration,
}

impl SubscriberRegistry {
    /// Create an empty registry; `send_timeout` bounds each per-subscriber send
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            members: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            send_timeout,
        }
    }

    /// Register a new subscriber with a queue of `buffer` payloads
    pub fn add(&self, buffer: usize) -> (SubscriberId, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.members.write().insert(id, tx);
        tracing::debug!(subscriber_id = %id, "Subscriber registered");
        (id, rx)
    }

    /// Deregister a subscriber; returns false if it was already gone
    pub fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.members.write().remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber_id = %id, "Subscriber removed");
        }
        removed
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.members.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Deliver a payload to every current subscriber
    ///
    /// Membership is snapshotted up front; sends then run concurrently, each
    /// bounded by the send timeout. Failing subscribers are removed and never
    /// affect delivery to the others.
    pub async fn broadcast(&self, payload: Payload) -> BroadcastReport {
        let snapshot: Vec<(SubscriberId, mpsc::Sender<Payload>)> = self
            .members
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        if snapshot.is_empty() {
            return BroadcastReport::default();
        }

        let timeout = self.send_timeout;
        let sends = snapshot.into_iter().map(|(id, tx)| {
            let payload = Arc::clone(&payload);
            async move { (id, tx.send_timeout(payload, timeout).await) }
        });

        let mut report = BroadcastReport::default();
        for (id, result) in join_all(sends).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(SendTimeoutError::Timeout(_)) => {
                    tracing::warn!(subscriber_id = %id, "Subscriber too slow, dropping");
                    self.remove(id);
                    report.dropped.push(id);
                }
                Err(SendTimeoutError::Closed(_)) => {
                    tracing::debug!(subscriber_id = %id, "Subscriber gone, dropping");
                    self.remove(id);
                    report.dropped.push(id);
                }
            }
        }

        tracing::debug!(
            delivered = report.delivered,
            dropped = report.dropped.len(),
            "Broadcast complete"
        );
        report
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
