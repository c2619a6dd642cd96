//! Fan-out of newly created records to all live stream subscribers.
//!
//! Each subscriber gets its own unbounded channel so a dead or slow
//! connection can be detected and evicted individually without affecting
//! delivery to the others. Records are published after the store has
//! persisted them, so subscribers never observe an unpersisted record.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::record::Confession;

type SubscriberMap = HashMap<u64, mpsc::UnboundedSender<Confession>>;

/// Broadcast hub: registry of live subscribers plus publish fan-out.
pub struct BroadcastHub {
    subscribers: Arc<Mutex<SubscriberMap>>,
    next_id: AtomicU64,
}

/// Handle for one subscriber. Receives published records via [`recv`] and
/// unsubscribes automatically when dropped.
///
/// [`recv`]: Subscription::recv
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<Confession>,
    subscribers: Arc<Mutex<SubscriberMap>>,
}

impl Subscription {
    /// Subscriber id, usable with [`BroadcastHub::unsubscribe`].
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next published record. Returns `None` once the
    /// subscription has been removed from the hub.
    pub async fn recv(&mut self) -> Option<Confession> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.remove(&self.id);
        }
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber and return its handle.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .insert(id, sender);
        tracing::debug!("Subscriber {} registered", id);
        Subscription {
            id,
            receiver,
            subscribers: self.subscribers.clone(),
        }
    }

    /// Remove a subscriber. Idempotent: unknown or already-removed ids are
    /// a no-op.
    pub fn unsubscribe(&self, id: u64) {
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .remove(&id);
    }

    /// Deliver `record` to every current subscriber, evicting any whose
    /// channel is closed. Returns the number of successful deliveries.
    pub fn publish(&self, record: &Confession) -> usize {
        // Snapshot the sender set so delivery never races subscriber
        // registration or removal.
        let snapshot: Vec<(u64, mpsc::UnboundedSender<Confession>)> = {
            let subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
            subscribers.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, sender) in &snapshot {
            if sender.send(record.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
            for id in &dead {
                subscribers.remove(id);
                tracing::debug!("Evicted dead subscriber {}", id);
            }
        }

        delivered
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("subscriber lock poisoned").len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
