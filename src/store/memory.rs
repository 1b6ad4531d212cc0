//! In-memory store

use super::{HistoryStore, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Store that keeps documents in a shared map
///
/// Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// All paths currently stored, sorted
    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.data.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().await.get(path).cloned())
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        self.data
            .write()
            .await
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let data = self.data.read().await;
        let mut names: Vec<String> = data
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}
