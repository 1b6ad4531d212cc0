//! Chatterbox configuration file handling
//!
//! Loads and manages the ~/.config/chatterbox/config.yaml file.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pub/sub topic names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicsConfig {
    /// Topic every chat envelope is published on
    #[serde(default = "default_broadcast_topic")]
    pub broadcast: String,

    /// Presence announcement topic
    #[serde(default = "default_beacon_topic")]
    pub beacon: String,
}

fn default_broadcast_topic() -> String {
    "/chatterbox/broadcast".to_string()
}

fn default_beacon_topic() -> String {
    "/chatterbox/beacon".to_string()
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            broadcast: default_broadcast_topic(),
            beacon: default_beacon_topic(),
        }
    }
}

/// Chatterbox configuration
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatterboxConfig {
    /// Root of all persisted state inside the store
    #[serde(default = "default_repo_dir")]
    pub repo_dir: String,

    #[serde(default)]
    pub topics: TopicsConfig,

    /// Messages kept per friend; everyone else keeps only the latest
    #[serde(default = "default_friends_message_history_size")]
    pub friends_message_history_size: usize,

    /// Seconds between presence announcements
    #[serde(default = "default_beacon_interval_secs")]
    pub beacon_interval_secs: u64,

    /// Buffered change notifications before slow feeds start skipping ahead
    #[serde(default = "default_feed_channel_capacity")]
    pub feed_channel_capacity: usize,
}

fn default_repo_dir() -> String {
    "/.chatterbox".to_string()
}

fn default_friends_message_history_size() -> usize {
    1000
}

fn default_beacon_interval_secs() -> u64 {
    5 * 60
}

fn default_feed_channel_capacity() -> usize {
    256
}

impl ChatterboxConfig {
    /// Create a configuration with every default
    pub fn new() -> Self {
        Self {
            repo_dir: default_repo_dir(),
            topics: TopicsConfig::default(),
            friends_message_history_size: default_friends_message_history_size(),
            beacon_interval_secs: default_beacon_interval_secs(),
            feed_channel_capacity: default_feed_channel_capacity(),
        }
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::ChatterboxError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading Chatterbox configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            repo_dir = %config.repo_dir,
            broadcast = %config.topics.broadcast,
            history = config.friends_message_history_size,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Load from `path` if it exists, otherwise use defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::new())
        }
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving Chatterbox configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/chatterbox/config.yaml)
    pub fn default_path() -> PathBuf {
        // Always use ~/.config for consistency across platforms (macOS, Linux)
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("chatterbox");
        path.push("config.yaml");
        path
    }

    /// Directory holding one subdirectory per peer
    pub fn peers_path(&self) -> String {
        format!("{}/peers", self.repo_dir.trim_end_matches('/'))
    }

    /// Presence announcement period
    pub fn beacon_interval(&self) -> Duration {
        Duration::from_secs(self.beacon_interval_secs)
    }
}

impl Default for ChatterboxConfig {
    fn default() -> Self {
        Self::new()
    }
}
