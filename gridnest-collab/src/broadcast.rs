//! Fan-out of committed documents to every connected viewer.
//!
//! Uses a tokio broadcast channel: one encode per write, one `Arc` clone per
//! subscriber. There is no originator filtering; the client that caused a
//! change receives the same frame as everyone else.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::protocol::{BroadcastMessage, ProtocolError};

/// Statistics for monitoring broadcast health.
#[derive(Debug, Clone, Default)]
pub struct BroadcastStats {
    pub messages_sent: u64,
    pub messages_lagged: u64,
    pub active_subscribers: usize,
}

/// Atomic counters, so broadcasting never takes a lock.
struct AtomicBroadcastStats {
    messages_sent: AtomicU64,
    messages_lagged: AtomicU64,
}

impl AtomicBroadcastStats {
    fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            messages_lagged: AtomicU64::new(0),
        }
    }
}

/// A connected push-channel subscriber.
#[derive(Debug, Clone)]
pub struct SubscriberInfo {
    pub subscriber_id: Uuid,
    pub remote_addr: Option<SocketAddr>,
    pub connected_at: Instant,
}

impl SubscriberInfo {
    pub fn new(remote_addr: Option<SocketAddr>) -> Self {
        Self {
            subscriber_id: Uuid::new_v4(),
            remote_addr,
            connected_at: Instant::now(),
        }
    }
}

/// Broadcast group for the project document.
pub struct BroadcastGroup {
    sender: broadcast::Sender<Arc<String>>,
    subscribers: Arc<RwLock<HashMap<Uuid, SubscriberInfo>>>,
    atomic_stats: Arc<AtomicBroadcastStats>,
}

impl BroadcastGroup {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            atomic_stats: Arc::new(AtomicBroadcastStats::new()),
        }
    }

    /// Register a subscriber and hand back its receiver.
    pub async fn add_subscriber(&self, info: SubscriberInfo) -> broadcast::Receiver<Arc<String>> {
        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(info.subscriber_id, info);
        self.sender.subscribe()
    }

    pub async fn remove_subscriber(&self, subscriber_id: &Uuid) -> Option<SubscriberInfo> {
        self.subscribers.write().await.remove(subscriber_id)
    }

    /// Encode once and send to every receiver. Returns the receiver count.
    pub fn broadcast(&self, msg: &BroadcastMessage) -> Result<usize, ProtocolError> {
        let encoded = Arc::new(msg.encode()?);
        Ok(self.broadcast_raw(encoded))
    }

    /// Send a pre-encoded frame.
    pub fn broadcast_raw(&self, encoded: Arc<String>) -> usize {
        // No receivers is not an error: nobody is watching yet.
        let count = self.sender.send(encoded).unwrap_or(0);
        self.atomic_stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        count
    }

    /// Account for frames a slow receiver skipped.
    pub fn record_lag(&self, skipped: u64) {
        self.atomic_stats
            .messages_lagged
            .fetch_add(skipped, Ordering::Relaxed);
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn stats(&self) -> BroadcastStats {
        let subscribers = self.subscribers.read().await;
        BroadcastStats {
            messages_sent: self.atomic_stats.messages_sent.load(Ordering::Relaxed),
            messages_lagged: self.atomic_stats.messages_lagged.load(Ordering::Relaxed),
            active_subscribers: subscribers.len(),
        }
    }

    /// Raw receiver without subscriber bookkeeping.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<String>> {
        self.sender.subscribe()
    }
}
