//! In-memory peer directory

use super::{validate_peer_id, PeerDirectory, PeerInfo, PeerUpdate, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Peer directory kept in a shared map
///
/// Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    peers: Arc<RwLock<BTreeMap<String, PeerInfo>>>,
}

impl MemoryDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory with `peer_ids` already marked as friends
    pub async fn with_friends<I, S>(peer_ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let directory = Self::new();
        for peer_id in peer_ids {
            directory
                .set(peer_id.as_ref(), PeerUpdate::friend(true))
                .await?;
        }
        Ok(directory)
    }
}

#[async_trait]
impl PeerDirectory for MemoryDirectory {
    async fn get(&self, peer_id: &str) -> Result<Option<PeerInfo>> {
        Ok(self.peers.read().await.get(peer_id).cloned())
    }

    async fn set(&self, peer_id: &str, update: PeerUpdate) -> Result<()> {
        validate_peer_id(peer_id)?;
        update.validate()?;

        let mut peers = self.peers.write().await;
        peers.entry(peer_id.to_string()).or_default().apply(update);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.peers.read().await.keys().cloned().collect())
    }
}
