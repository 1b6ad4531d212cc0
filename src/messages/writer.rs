//! History writer
//!
//! Appends one message to a peer's persisted history. Every
//! read-modify-write of a history runs under the [`KeyMutex`] entry for that
//! peer, so a local broadcast and an inbound envelope for the same peer can
//! never overwrite each other.
//!
//! Retention: friends keep the most recent `friends_message_history_size`
//! messages, everyone else (including this node, unless marked a friend)
//! keeps only the latest one.

use super::feed::{self, ChangeBus, Feed};
use super::message::{now_millis, Message, MessageId, PeerHistory};
use crate::config::ChatterboxConfig;
use crate::locks::KeyMutex;
use crate::peers::{is_valid_peer_id, PeerDirectory, PeerUpdate};
use crate::store::{self, HistoryStore};
use crate::{ChatterboxError, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Load a history, treating a missing file as empty
pub(crate) async fn load_history(
    store: &dyn HistoryStore,
    path: &str,
) -> store::Result<PeerHistory> {
    Ok(store::read_json(store, path).await?.unwrap_or_default())
}

/// Serialized, retention-aware writes to peer histories
#[derive(Clone)]
pub struct HistoryWriter {
    store: Arc<dyn HistoryStore>,
    directory: Arc<dyn PeerDirectory>,
    mutex: KeyMutex,
    bus: ChangeBus,
    peers_path: String,
    friends_history_size: usize,
}

impl HistoryWriter {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        directory: Arc<dyn PeerDirectory>,
        mutex: KeyMutex,
        config: &ChatterboxConfig,
    ) -> Self {
        Self {
            store,
            directory,
            mutex,
            bus: ChangeBus::new(config.feed_channel_capacity),
            peers_path: config.peers_path(),
            friends_history_size: config.friends_message_history_size.max(1),
        }
    }

    /// Notifications sent after every completed write
    pub fn changes(&self) -> &ChangeBus {
        &self.bus
    }

    /// Append `text` to `peer_id`'s history and return the recorded message
    pub async fn write(&self, peer_id: &str, text: &str) -> Result<Message> {
        check_peer_id(peer_id)?;
        if text.is_empty() {
            return Err(ChatterboxError::InvalidText);
        }

        let message = {
            let _guard = self.mutex.acquire(peer_id).await;
            let path = self.history_path(peer_id);

            let mut history = load_history(self.store.as_ref(), &path).await?;
            // A failed lookup must not trim a friend's history down to one
            let cap = self.retention_cap(peer_id).await?;
            let message = Message::new(text);
            history.push_capped(message.clone(), cap);
            store::write_json(self.store.as_ref(), &path, &history).await?;

            tracing::debug!(peer_id, len = history.len(), cap, "Message recorded");

            // Notify while still holding the lock so notifications follow write order
            self.bus.notify(peer_id);
            message
        };

        // Best effort; the history is already persisted
        if let Err(e) = self
            .directory
            .set(peer_id, PeerUpdate::last_message(&message))
            .await
        {
            tracing::warn!(peer_id, error = %e, "Failed to update peer summary");
        }

        Ok(message)
    }

    /// Current persisted history for `peer_id`
    pub async fn read(&self, peer_id: &str) -> Result<PeerHistory> {
        check_peer_id(peer_id)?;
        Ok(load_history(self.store.as_ref(), &self.history_path(peer_id)).await?)
    }

    /// Set `read_at` on one message
    ///
    /// Returns `false` if the message is not in the history. Already-read
    /// messages keep their first `read_at`.
    pub async fn mark_read(&self, peer_id: &str, message_id: &MessageId) -> Result<bool> {
        check_peer_id(peer_id)?;

        let _guard = self.mutex.acquire(peer_id).await;
        let path = self.history_path(peer_id);
        let mut history = load_history(self.store.as_ref(), &path).await?;

        let Some(message) = history.get_mut(message_id) else {
            return Ok(false);
        };
        if message.is_read() {
            return Ok(true);
        }
        message.read_at = Some(now_millis());

        store::write_json(self.store.as_ref(), &path, &history).await?;
        tracing::debug!(peer_id, message_id = %message_id, "Message marked read");
        self.bus.notify(peer_id);
        Ok(true)
    }

    /// Open a live feed over `peer_id`'s history
    pub fn feed(&self, peer_id: &str, token: CancellationToken) -> Result<Feed> {
        check_peer_id(peer_id)?;
        Ok(feed::watch(
            self.store.clone(),
            self.history_path(peer_id),
            peer_id.to_string(),
            &self.bus,
            token,
        ))
    }

    fn history_path(&self, peer_id: &str) -> String {
        store::messages_path(&self.peers_path, peer_id)
    }

    async fn retention_cap(&self, peer_id: &str) -> Result<usize> {
        if self.directory.is_friend(peer_id).await? {
            Ok(self.friends_history_size)
        } else {
            Ok(1)
        }
    }
}

impl std::fmt::Debug for HistoryWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryWriter")
            .field("peers_path", &self.peers_path)
            .field("friends_history_size", &self.friends_history_size)
            .finish_non_exhaustive()
    }
}

fn check_peer_id(peer_id: &str) -> Result<()> {
    if is_valid_peer_id(peer_id) {
        Ok(())
    } else {
        Err(ChatterboxError::InvalidPeerId(peer_id.to_string()))
    }
}
