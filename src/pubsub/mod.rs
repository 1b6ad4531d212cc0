//! Topic-based broadcast channel
//!
//! Defines the trait the messaging engine uses to reach other participants:
//! publish bytes on a topic, receive every record published on a topic.
//!
//! # Delivery
//!
//! Delivery is best effort. Records may be dropped or duplicated by the
//! underlying network; the `seqno` on each record exists for transport-level
//! deduplication only. Publishers normally receive their own records back.

mod local;

pub use local::{LocalHub, LocalPubSub};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// PubSub errors
#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("channel closed")]
    Closed,

    #[error("not subscribed to topic: {0}")]
    NotSubscribed(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type for pubsub operations
pub type Result<T> = std::result::Result<T, PubSubError>;

/// Identifier for one subscription, unique per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A record delivered on a topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRecord {
    /// Peer ID of the publisher
    pub from: String,

    /// Transport sequence token
    pub seqno: Vec<u8>,

    /// Topic the record was published on
    pub topic: String,

    /// Raw payload
    pub data: Vec<u8>,
}

/// An active subscription
///
/// Records arrive on `receiver` until the subscription is cancelled with
/// [`PubSub::unsubscribe`] or the channel shuts down.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub topic: String,
    pub receiver: mpsc::Receiver<TransportRecord>,
}

/// Trait for broadcast channel backends
#[async_trait]
pub trait PubSub: Send + Sync {
    /// Peer ID this node publishes as
    async fn local_peer_id(&self) -> Result<String>;

    /// Start receiving records for `topic`
    async fn subscribe(&self, topic: &str) -> Result<Subscription>;

    /// Stop a subscription; its receiver yields `None` afterwards
    async fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> Result<()>;

    /// Publish `data` to every subscriber of `topic`
    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<()>;
}
