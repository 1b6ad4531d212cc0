//! Path-addressed storage
//!
//! Defines the trait for pluggable byte storage backends. Paths are
//! slash-separated strings such as `/.chatterbox/peers/<peerId>/messages.json`.
//!
//! # Backends
//!
//! - [`FilesystemStore`] - files under a root directory, atomic replace on write
//! - [`MemoryStore`] - in-process map, for tests and ephemeral nodes

mod filesystem;
mod memory;

pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Trait for byte storage backends
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Read the bytes at `path`, `None` if nothing was ever written there
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the bytes at `path`, creating parents as needed
    ///
    /// Readers observe either the previous or the new content, never a mix.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Names of the direct children of directory `path`, sorted
    ///
    /// A directory that was never written under lists as empty.
    async fn list(&self, path: &str) -> Result<Vec<String>>;
}

/// Directory holding everything stored for one peer
pub fn peer_dir(peers_path: &str, peer_id: &str) -> String {
    format!("{}/{}", peers_path.trim_end_matches('/'), peer_id)
}

/// Location of a peer's message history
pub fn messages_path(peers_path: &str, peer_id: &str) -> String {
    format!("{}/messages.json", peer_dir(peers_path, peer_id))
}

/// Location of a peer's directory record
pub fn info_path(peers_path: &str, peer_id: &str) -> String {
    format!("{}/info.json", peer_dir(peers_path, peer_id))
}

/// Read and decode a JSON document, `None` if the path does not exist
pub async fn read_json<T: DeserializeOwned>(
    store: &dyn HistoryStore,
    path: &str,
) -> Result<Option<T>> {
    match store.read(path).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode a value as JSON and write it
pub async fn write_json<T: Serialize + ?Sized>(
    store: &dyn HistoryStore,
    path: &str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    store.write(path, &bytes).await
}
