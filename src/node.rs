//! A running Chatterbox node
//!
//! Wires configuration, the shared [`KeyMutex`], the store-backed peer
//! directory and the [`Messages`] facade over a pub/sub channel and a store.

use crate::config::{validate_config_result, ChatterboxConfig};
use crate::locks::KeyMutex;
use crate::messages::Messages;
use crate::peers::{PeerDirectory, StoreDirectory};
use crate::pubsub::PubSub;
use crate::store::HistoryStore;
use crate::Result;
use std::sync::Arc;

/// Peer directory plus messaging over one identity
#[derive(Debug)]
pub struct Chatterbox {
    peers: StoreDirectory,
    messages: Messages,
}

impl Chatterbox {
    /// Validate `config`, then start listening for broadcasts
    pub async fn open(
        pubsub: Arc<dyn PubSub>,
        store: Arc<dyn HistoryStore>,
        config: ChatterboxConfig,
    ) -> Result<Self> {
        validate_config_result(&config)?;

        let mutex = KeyMutex::new();
        let peers = StoreDirectory::new(store.clone(), mutex.clone(), config.peers_path());
        let directory: Arc<dyn PeerDirectory> = Arc::new(peers.clone());
        let messages = Messages::new(pubsub, store, directory, mutex, &config).await?;

        tracing::info!(
            peer_id = %messages.own_peer_id(),
            repo_dir = %config.repo_dir,
            "Node started"
        );

        Ok(Self { peers, messages })
    }

    /// Peer directory shared with the history writer
    pub fn peers(&self) -> &StoreDirectory {
        &self.peers
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    /// Peer ID this node broadcasts as
    pub fn peer_id(&self) -> &str {
        self.messages.own_peer_id()
    }

    /// Stop listening; in-flight writes finish first
    pub async fn destroy(self) -> Result<()> {
        self.messages.destroy().await
    }
}
