//! In-process pub/sub
//!
//! A [`LocalHub`] plays the role of the network: every [`LocalPubSub`] handle
//! created from the same hub sees every record published on a topic it has
//! subscribed to, including its own. Useful for tests, demos, and the
//! single-machine CLI.

use super::{PubSub, PubSubError, Result, Subscription, SubscriptionId, TransportRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Default per-subscription buffer
pub const DEFAULT_SUBSCRIPTION_CAPACITY: usize = 256;

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    owner: String,
    tx: mpsc::Sender<TransportRecord>,
}

#[derive(Debug, Default)]
struct HubState {
    topics: HashMap<String, Vec<Subscriber>>,
}

/// Shared in-process "network"
#[derive(Debug, Clone)]
pub struct LocalHub {
    state: Arc<Mutex<HubState>>,
    next_id: Arc<AtomicU64>,
    seqno: Arc<AtomicU64>,
    capacity: usize,
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIPTION_CAPACITY)
    }
}

impl LocalHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hub whose subscriptions buffer `capacity` records
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState::default())),
            next_id: Arc::new(AtomicU64::new(1)),
            seqno: Arc::new(AtomicU64::new(1)),
            capacity: capacity.max(1),
        }
    }

    /// Attach a node identified by `peer_id`
    pub fn node(&self, peer_id: impl Into<String>) -> LocalPubSub {
        LocalPubSub {
            hub: self.clone(),
            peer_id: peer_id.into(),
        }
    }

    /// Deliver a record as if `from` had published it
    ///
    /// Lets tests inject arbitrary (including hostile) payloads.
    pub async fn inject(&self, from: &str, topic: &str, data: Vec<u8>) -> Result<()> {
        let record = TransportRecord {
            from: from.to_string(),
            seqno: self.seqno.fetch_add(1, Ordering::Relaxed).to_be_bytes().to_vec(),
            topic: topic.to_string(),
            data,
        };
        self.deliver(record).await
    }

    /// Number of live subscriptions on a topic
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        let state = self.state.lock().await;
        state
            .topics
            .get(topic)
            .map(|subs| subs.iter().filter(|s| !s.tx.is_closed()).count())
            .unwrap_or(0)
    }

    async fn deliver(&self, record: TransportRecord) -> Result<()> {
        // Snapshot senders so slow subscribers don't hold the hub lock
        let senders: Vec<mpsc::Sender<TransportRecord>> = {
            let mut state = self.state.lock().await;
            let Some(subs) = state.topics.get_mut(&record.topic) else {
                return Ok(());
            };
            subs.retain(|s| !s.tx.is_closed());
            subs.iter().map(|s| s.tx.clone()).collect()
        };

        for tx in senders {
            if tx.send(record.clone()).await.is_err() {
                tracing::trace!(topic = %record.topic, "Subscriber went away during delivery");
            }
        }
        Ok(())
    }
}

/// One node's view of a [`LocalHub`]
#[derive(Debug, Clone)]
pub struct LocalPubSub {
    hub: LocalHub,
    peer_id: String,
}

#[async_trait]
impl PubSub for LocalPubSub {
    async fn local_peer_id(&self) -> Result<String> {
        Ok(self.peer_id.clone())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        let (tx, receiver) = mpsc::channel(self.hub.capacity);
        let id = SubscriptionId(self.hub.next_id.fetch_add(1, Ordering::Relaxed));

        let mut state = self.hub.state.lock().await;
        state
            .topics
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber {
                id,
                owner: self.peer_id.clone(),
                tx,
            });

        tracing::debug!(peer_id = %self.peer_id, topic, "Subscribed");
        Ok(Subscription {
            id,
            topic: topic.to_string(),
            receiver,
        })
    }

    async fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> Result<()> {
        let mut state = self.hub.state.lock().await;
        let subs = state
            .topics
            .get_mut(topic)
            .ok_or_else(|| PubSubError::NotSubscribed(topic.to_string()))?;

        let before = subs.len();
        subs.retain(|s| !(s.id == id && s.owner == self.peer_id));
        if subs.len() == before {
            return Err(PubSubError::NotSubscribed(topic.to_string()));
        }

        tracing::debug!(peer_id = %self.peer_id, topic, "Unsubscribed");
        Ok(())
    }

    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<()> {
        self.hub.inject(&self.peer_id, topic, data).await
    }
}
