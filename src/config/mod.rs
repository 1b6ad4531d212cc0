//! Configuration system
//!
//! Loads ~/.config/chatterbox/config.yaml with support for:
//! - Repository location (where peer histories are kept)
//! - Broadcast and beacon topic names
//! - History retention for friends
//! - Change-notification buffer size

mod chatterbox_config;
pub mod validation;

pub use chatterbox_config::{ChatterboxConfig, TopicsConfig};
pub use validation::{validate_config, validate_config_result, ValidationError};
