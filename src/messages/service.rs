//! Messaging facade
//!
//! [`Messages`] subscribes to the broadcast topic on construction and records
//! every accepted inbound envelope. Locally it exposes `broadcast`, `feed`
//! and the read-side helpers.
//!
//! Each inbound record is handled inside its own failure boundary: rejected
//! envelopes, failed writes and even panics are logged and the listener
//! moves on to the next record.

use super::envelope::{validate_record, Envelope};
use super::feed::Feed;
use super::message::{Message, MessageId, PeerHistory};
use super::writer::HistoryWriter;
use crate::config::ChatterboxConfig;
use crate::locks::KeyMutex;
use crate::peers::PeerDirectory;
use crate::pubsub::{PubSub, SubscriptionId, TransportRecord};
use crate::store::HistoryStore;
use crate::{ChatterboxError, Result};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Broadcast, receive and observe messages
pub struct Messages {
    pubsub: Arc<dyn PubSub>,
    writer: HistoryWriter,
    own_peer_id: String,
    topic: String,
    subscription: SubscriptionId,
    shutdown: CancellationToken,
    listener: Option<JoinHandle<()>>,
}

impl Messages {
    /// Subscribe to the broadcast topic and start handling inbound envelopes
    ///
    /// Must be called from within a tokio runtime.
    pub async fn new(
        pubsub: Arc<dyn PubSub>,
        store: Arc<dyn HistoryStore>,
        directory: Arc<dyn PeerDirectory>,
        mutex: KeyMutex,
        config: &ChatterboxConfig,
    ) -> Result<Self> {
        let own_peer_id = pubsub.local_peer_id().await?;
        let writer = HistoryWriter::new(store, directory, mutex, config);
        let topic = config.topics.broadcast.clone();

        let subscription = pubsub.subscribe(&topic).await?;
        tracing::info!(peer_id = %own_peer_id, topic = %topic, "Listening for broadcasts");

        let shutdown = CancellationToken::new();
        let listener = tokio::spawn(listen(
            subscription.receiver,
            writer.clone(),
            own_peer_id.clone(),
            shutdown.clone(),
        ));

        Ok(Self {
            pubsub,
            writer,
            own_peer_id,
            topic,
            subscription: subscription.id,
            shutdown,
            listener: Some(listener),
        })
    }

    /// Peer ID this node broadcasts as
    pub fn own_peer_id(&self) -> &str {
        &self.own_peer_id
    }

    /// Topic envelopes are published on
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Record `text` in this node's own history, then publish it
    ///
    /// If publishing fails the local record stays and the error is returned.
    pub async fn broadcast(&self, text: &str) -> Result<Message> {
        if text.is_empty() {
            return Err(ChatterboxError::InvalidText);
        }

        let message = self.writer.write(&self.own_peer_id, text).await?;

        let payload = Envelope::new(text).to_bytes()?;
        self.pubsub.publish(&self.topic, payload).await?;

        tracing::debug!(topic = %self.topic, len = text.len(), "Broadcast published");
        Ok(message)
    }

    /// Live snapshots of `peer_id`'s history until `token` is cancelled
    pub fn feed(&self, peer_id: &str, token: CancellationToken) -> Result<Feed> {
        self.writer.feed(peer_id, token)
    }

    /// Current history for `peer_id`; empty if nothing was recorded
    pub async fn list(&self, peer_id: &str) -> Result<PeerHistory> {
        self.writer.read(peer_id).await
    }

    /// Mark one message from `peer_id` as read
    pub async fn mark_read(&self, peer_id: &str, message_id: &MessageId) -> Result<bool> {
        self.writer.mark_read(peer_id, message_id).await
    }

    /// Stop listening for broadcasts
    ///
    /// The record being handled, if any, is finished first.
    pub async fn destroy(mut self) -> Result<()> {
        let unsubscribed = self.pubsub.unsubscribe(&self.topic, self.subscription).await;
        self.shutdown.cancel();

        if let Some(listener) = self.listener.take() {
            if let Err(e) = listener.await {
                tracing::warn!(error = %e, "Broadcast listener ended abnormally");
            }
        }

        tracing::info!(topic = %self.topic, "Stopped listening for broadcasts");
        unsubscribed.map_err(ChatterboxError::from)
    }
}

impl Drop for Messages {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for Messages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messages")
            .field("own_peer_id", &self.own_peer_id)
            .field("topic", &self.topic)
            .field("writer", &self.writer)
            .finish_non_exhaustive()
    }
}

async fn listen(
    mut receiver: mpsc::Receiver<TransportRecord>,
    writer: HistoryWriter,
    own_peer_id: String,
    shutdown: CancellationToken,
) {
    loop {
        let record = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            record = receiver.recv() => match record {
                Some(record) => record,
                None => break,
            },
        };

        let handled = AssertUnwindSafe(handle_record(&writer, &own_peer_id, record))
            .catch_unwind()
            .await;
        if handled.is_err() {
            tracing::error!("Broadcast handler panicked, continuing with next record");
        }
    }
    tracing::debug!("Broadcast listener stopped");
}

async fn handle_record(writer: &HistoryWriter, own_peer_id: &str, record: TransportRecord) {
    let inbound = match validate_record(&record, own_peer_id) {
        Ok(inbound) => inbound,
        Err(reason) => {
            tracing::debug!(from = %record.from, reason = %reason, "Dropped envelope");
            return;
        }
    };

    match writer.write(&inbound.peer_id, &inbound.text).await {
        Ok(_) => {}
        Err(e) if e.is_invalid_input() => {
            tracing::warn!(peer_id = %inbound.peer_id, error = %e, "Dropped inbound message");
        }
        Err(e) => {
            tracing::error!(
                peer_id = %inbound.peer_id,
                error = %e,
                "Failed to record inbound message"
            );
        }
    }
}
