//! Error types for Chatterbox
//!
//! Caller input errors (`InvalidPeerId`, `InvalidText`) are reported to the
//! direct caller. Storage failures surface as `Persistence`. Untrusted network
//! input never reaches this type; see [`crate::messages::EnvelopeRejection`].

use crate::peers::DirectoryError;
use crate::pubsub::PubSubError;
use crate::store::StoreError;
use thiserror::Error;

/// Result type alias for Chatterbox operations
pub type Result<T> = std::result::Result<T, ChatterboxError>;

/// Top-level error type for Chatterbox operations
#[derive(Error, Debug)]
pub enum ChatterboxError {
    /// Peer ID was empty or not usable as a path segment
    #[error("invalid peer ID: {0:?}")]
    InvalidPeerId(String),

    /// Message text was empty
    #[error("invalid message text")]
    InvalidText,

    /// Reading or writing persisted state failed
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Broadcast channel errors
    #[error("pubsub error: {0}")]
    PubSub(#[from] PubSubError),

    /// Peer directory errors
    #[error("peer directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// A feed was cancelled by its token
    #[error("aborted")]
    Aborted,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Anyhow errors (for more context)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl ChatterboxError {
    /// True for errors caused by the caller's arguments rather than the system
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            ChatterboxError::InvalidPeerId(_) | ChatterboxError::InvalidText
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_classification() {
        assert!(ChatterboxError::InvalidText.is_invalid_input());
        assert!(ChatterboxError::InvalidPeerId(String::new()).is_invalid_input());
        assert!(!ChatterboxError::Aborted.is_invalid_input());
        assert!(!ChatterboxError::Other("boom".to_string()).is_invalid_input());
    }

    #[test]
    fn test_store_error_converts_to_persistence() {
        let err: ChatterboxError = StoreError::Storage("disk full".to_string()).into();
        assert!(matches!(err, ChatterboxError::Persistence(_)));
        assert!(err.to_string().contains("disk full"));
    }
}
