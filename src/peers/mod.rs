//! Peer directory
//!
//! Per-peer metadata the messaging engine consults and updates:
//! - `is_friend` decides how much history is retained for a peer
//! - `last_seen_at` / `last_message` summarise the latest message
//!
//! Unknown peers are never an error: they read as `None` and are not friends.
//!
//! # Backends
//!
//! - [`MemoryDirectory`] - in-process map, for tests
//! - [`StoreDirectory`] - `info.json` per peer inside a [`HistoryStore`](crate::store::HistoryStore)

mod memory;
mod store;

pub use memory::MemoryDirectory;
pub use store::StoreDirectory;

use crate::messages::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Peer directory errors
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("invalid peer ID: {0:?}")]
    InvalidPeerId(String),

    #[error("invalid name")]
    InvalidName,

    #[error("invalid avatar")]
    InvalidAvatar,

    #[error("invalid last seen time")]
    InvalidLastSeenAt,

    #[error("invalid message: {0}")]
    InvalidMessage(&'static str),

    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
}

/// Result type for directory operations
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Everything known about a peer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    /// Last time a message from this peer was recorded (ms since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,

    #[serde(default)]
    pub is_friend: bool,
}

impl PeerInfo {
    /// Apply the fields set in `update`
    pub fn apply(&mut self, update: PeerUpdate) {
        if let Some(name) = update.name {
            self.name = Some(name);
        }
        if let Some(avatar) = update.avatar {
            self.avatar = Some(avatar);
        }
        // Summaries only move forward; concurrent writers may finish out of order
        if let Some(last_seen_at) = update.last_seen_at {
            self.last_seen_at =
                Some(self.last_seen_at.map_or(last_seen_at, |t| t.max(last_seen_at)));
        }
        if let Some(last_message) = update.last_message {
            let newer = self
                .last_message
                .as_ref()
                .map_or(true, |current| last_message.received_at >= current.received_at);
            if newer {
                self.last_message = Some(last_message);
            }
        }
        if let Some(is_friend) = update.is_friend {
            self.is_friend = is_friend;
        }
    }
}

/// A partial change to a [`PeerInfo`]; `None` fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerUpdate {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub last_seen_at: Option<i64>,
    pub last_message: Option<Message>,
    pub is_friend: Option<bool>,
}

impl PeerUpdate {
    /// Summary update written after a message is recorded
    pub fn last_message(message: &Message) -> Self {
        Self {
            last_seen_at: Some(message.received_at),
            last_message: Some(message.clone()),
            ..Default::default()
        }
    }

    /// Mark or unmark as friend
    pub fn friend(is_friend: bool) -> Self {
        Self {
            is_friend: Some(is_friend),
            ..Default::default()
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the avatar reference
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    /// Check every set field
    pub fn validate(&self) -> Result<()> {
        if matches!(self.name.as_deref(), Some("")) {
            return Err(DirectoryError::InvalidName);
        }
        if matches!(self.avatar.as_deref(), Some("")) {
            return Err(DirectoryError::InvalidAvatar);
        }
        if matches!(self.last_seen_at, Some(t) if t <= 0) {
            return Err(DirectoryError::InvalidLastSeenAt);
        }
        if let Some(ref message) = self.last_message {
            validate_message(message)?;
        }
        Ok(())
    }
}

/// Is `peer_id` usable as a peer identifier?
///
/// Peer IDs become a path segment in the store, so separators, whitespace,
/// control characters and the `.`/`..` segments are refused. `:` is refused
/// too; it separates lock key prefixes from peer IDs.
pub fn is_valid_peer_id(peer_id: &str) -> bool {
    !peer_id.is_empty()
        && peer_id != "."
        && peer_id != ".."
        && !peer_id
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':') || c.is_whitespace() || c.is_control())
}

/// Check a peer ID, returning a directory error if unusable
pub fn validate_peer_id(peer_id: &str) -> Result<()> {
    if is_valid_peer_id(peer_id) {
        Ok(())
    } else {
        Err(DirectoryError::InvalidPeerId(peer_id.to_string()))
    }
}

/// Check a message summary before storing it
pub fn validate_message(message: &Message) -> Result<()> {
    if message.id.as_str().is_empty() {
        return Err(DirectoryError::InvalidMessage("invalid message ID"));
    }
    if message.text.is_empty() {
        return Err(DirectoryError::InvalidMessage("invalid message text"));
    }
    if message.received_at <= 0 {
        return Err(DirectoryError::InvalidMessage(
            "invalid message received time",
        ));
    }
    if matches!(message.read_at, Some(t) if t <= 0) {
        return Err(DirectoryError::InvalidMessage("invalid message read time"));
    }
    Ok(())
}

/// Trait for peer directory backends
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    /// Look up a peer, `None` if unknown
    async fn get(&self, peer_id: &str) -> Result<Option<PeerInfo>>;

    /// Merge `update` into the peer's record, creating it if needed
    async fn set(&self, peer_id: &str, update: PeerUpdate) -> Result<()>;

    /// All known peer IDs, sorted
    async fn list(&self) -> Result<Vec<String>>;

    /// Is the peer marked as a friend? Unknown peers are not.
    async fn is_friend(&self, peer_id: &str) -> Result<bool> {
        Ok(self
            .get(peer_id)
            .await?
            .map(|info| info.is_friend)
            .unwrap_or(false))
    }

    /// Mark or unmark a peer as a friend
    async fn set_friend(&self, peer_id: &str, is_friend: bool) -> Result<()> {
        self.set(peer_id, PeerUpdate::friend(is_friend)).await
    }

    /// IDs of every peer marked as a friend, sorted
    async fn list_friends(&self) -> Result<Vec<String>> {
        let mut friends = Vec::new();
        for peer_id in self.list().await? {
            if self.is_friend(&peer_id).await? {
                friends.push(peer_id);
            }
        }
        Ok(friends)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MessageId;

    #[test]
    fn test_peer_id_rules() {
        assert!(is_valid_peer_id("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG"));
        assert!(is_valid_peer_id("peer-a"));
        assert!(!is_valid_peer_id(""));
        assert!(!is_valid_peer_id("."));
        assert!(!is_valid_peer_id(".."));
        assert!(!is_valid_peer_id("a/b"));
        assert!(!is_valid_peer_id("a\\b"));
        assert!(!is_valid_peer_id("NOT A PEER ID"));
        assert!(!is_valid_peer_id("nul\0"));
        assert!(!is_valid_peer_id("info:alice"));
    }

    #[test]
    fn test_update_validation() {
        assert!(PeerUpdate::friend(true).validate().is_ok());
        assert!(matches!(
            PeerUpdate::default().with_name("").validate(),
            Err(DirectoryError::InvalidName)
        ));
        assert!(matches!(
            PeerUpdate::default().with_avatar("").validate(),
            Err(DirectoryError::InvalidAvatar)
        ));

        let update = PeerUpdate {
            last_seen_at: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            update.validate(),
            Err(DirectoryError::InvalidLastSeenAt)
        ));
    }

    #[test]
    fn test_message_validation() {
        let good = Message::new("hi");
        assert!(validate_message(&good).is_ok());
        assert!(PeerUpdate::last_message(&good).validate().is_ok());

        let mut bad = good.clone();
        bad.id = MessageId::from_string("");
        assert!(validate_message(&bad).is_err());

        let mut bad = good.clone();
        bad.text.clear();
        assert!(validate_message(&bad).is_err());

        let mut bad = good.clone();
        bad.received_at = 0;
        assert!(validate_message(&bad).is_err());

        let mut bad = good;
        bad.read_at = Some(-1);
        assert!(validate_message(&bad).is_err());
    }

    #[test]
    fn test_apply_merges_fields() {
        let mut info = PeerInfo {
            name: Some("alice".to_string()),
            ..Default::default()
        };
        info.apply(PeerUpdate::friend(true));
        assert_eq!(info.name.as_deref(), Some("alice"));
        assert!(info.is_friend);

        let message = Message::new("hello");
        info.apply(PeerUpdate::last_message(&message));
        assert_eq!(info.last_seen_at, Some(message.received_at));
        assert_eq!(info.last_message, Some(message));
        assert!(info.is_friend);
    }

    #[test]
    fn test_apply_keeps_newest_summary() {
        let mut newer = Message::new("newer");
        newer.received_at = 2_000;
        let mut older = Message::new("older");
        older.received_at = 1_000;

        let mut info = PeerInfo::default();
        info.apply(PeerUpdate::last_message(&newer));
        info.apply(PeerUpdate::last_message(&older));

        assert_eq!(info.last_seen_at, Some(2_000));
        assert_eq!(info.last_message.map(|m| m.text), Some("newer".to_string()));
    }

    #[test]
    fn test_info_json_format() {
        let info = PeerInfo {
            name: Some("bob".to_string()),
            is_friend: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, r#"{"name":"bob","isFriend":true}"#);

        let parsed: PeerInfo = serde_json::from_str("{}").unwrap();
        assert!(!parsed.is_friend);
    }
}
