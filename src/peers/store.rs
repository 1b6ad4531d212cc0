//! Store-backed peer directory
//!
//! Each peer's record lives next to its message history:
//!
//! ```text
//! <peers_path>/<peerId>/info.json
//! ```
//!
//! Updates are read-modify-write under the shared [`KeyMutex`], keyed
//! `info:<peerId>` so they never wait on the same peer's history writes.

use super::{validate_peer_id, PeerDirectory, PeerInfo, PeerUpdate, Result};
use crate::locks::KeyMutex;
use crate::store::{self, HistoryStore};
use async_trait::async_trait;
use std::sync::Arc;

/// Peer directory persisted through a [`HistoryStore`]
#[derive(Clone)]
pub struct StoreDirectory {
    store: Arc<dyn HistoryStore>,
    mutex: KeyMutex,
    peers_path: String,
}

impl StoreDirectory {
    /// Create a directory rooted at `peers_path` inside `store`
    pub fn new(
        store: Arc<dyn HistoryStore>,
        mutex: KeyMutex,
        peers_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            mutex,
            peers_path: peers_path.into(),
        }
    }

    fn lock_key(peer_id: &str) -> String {
        format!("info:{}", peer_id)
    }
}

impl std::fmt::Debug for StoreDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreDirectory")
            .field("peers_path", &self.peers_path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PeerDirectory for StoreDirectory {
    async fn get(&self, peer_id: &str) -> Result<Option<PeerInfo>> {
        if validate_peer_id(peer_id).is_err() {
            return Ok(None);
        }
        let path = store::info_path(&self.peers_path, peer_id);
        Ok(store::read_json(self.store.as_ref(), &path).await?)
    }

    async fn set(&self, peer_id: &str, update: PeerUpdate) -> Result<()> {
        validate_peer_id(peer_id)?;
        update.validate()?;

        let _guard = self.mutex.acquire(Self::lock_key(peer_id)).await;
        let path = store::info_path(&self.peers_path, peer_id);

        let mut info: PeerInfo = store::read_json(self.store.as_ref(), &path)
            .await?
            .unwrap_or_default();
        info.apply(update);
        store::write_json(self.store.as_ref(), &path, &info).await?;

        tracing::trace!(peer_id, "Peer info updated");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut peers = Vec::new();
        for peer_id in self.store.list(&self.peers_path).await? {
            let path = store::info_path(&self.peers_path, &peer_id);
            // Peers that only have a history have no directory record yet
            if self.store.read(&path).await?.is_some() {
                peers.push(peer_id);
            }
        }
        Ok(peers)
    }
}
