//! Filesystem-backed store
//!
//! Maps store paths onto files under a root directory:
//!
//! ```text
//! <root>/
//!   .chatterbox/
//!     peers/
//!       <peerId>/
//!         messages.json
//!         info.json
//! ```
//!
//! Writes go to a temporary sibling file that is then renamed over the target,
//! so a concurrent reader sees the old or the new document, never half of one.

use super::{HistoryStore, Result, StoreError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Filesystem store rooted at a directory
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    /// Directory all store paths resolve under
    root: PathBuf,
}

impl FilesystemStore {
    /// Create a store rooted at `root` (created lazily on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a store path to a file path under the root
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        for component in relative.components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(StoreError::InvalidPath(path.to_string()));
            }
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl HistoryStore for FilesystemStore {
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let file = self.resolve(path)?;
        match fs::read(&file).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
        let tmp = file.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        fs::write(&tmp, data).await?;
        if let Err(e) = fs::rename(&tmp, &file).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::trace!(path = %file.display(), bytes = data.len(), "Wrote file");
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.resolve(path)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            // Skip in-flight temp files from concurrent writes
            if name.starts_with('.') && name.ends_with(".tmp") {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let temp = TempDir::new().unwrap();
        let store = FilesystemStore::new(temp.path());

        let result = store.read("/.chatterbox/peers/x/messages.json").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_write_creates_parents_and_replaces() {
        let temp = TempDir::new().unwrap();
        let store = FilesystemStore::new(temp.path());
        let path = "/.chatterbox/peers/x/messages.json";

        store.write(path, b"[1]").await.unwrap();
        store.write(path, b"[1,2]").await.unwrap();

        let bytes = store.read(path).await.unwrap().unwrap();
        assert_eq!(bytes, b"[1,2]");
        assert!(temp.path().join(".chatterbox/peers/x/messages.json").exists());

        // No temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(temp.path().join(".chatterbox/peers/x"))
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_list_directories() {
        let temp = TempDir::new().unwrap();
        let store = FilesystemStore::new(temp.path());

        assert!(store.list("/peers").await.unwrap().is_empty());

        store.write("/peers/b/messages.json", b"[]").await.unwrap();
        store.write("/peers/a/info.json", b"{}").await.unwrap();
        assert_eq!(store.list("/peers").await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let temp = TempDir::new().unwrap();
        let store = FilesystemStore::new(temp.path());

        let result = store.write("/peers/../../etc/passwd", b"x").await;
        assert!(matches!(result, Err(StoreError::InvalidPath(_))));

        let result = store.read("/").await;
        assert!(matches!(result, Err(StoreError::InvalidPath(_))));
    }
}
