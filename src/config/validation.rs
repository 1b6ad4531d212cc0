//! Configuration validation
//!
//! Validates Chatterbox configuration for correctness:
//! - Repository directory is set
//! - Topics are set and distinct
//! - Friend history and feed buffer sizes are at least one

use super::chatterbox_config::ChatterboxConfig;
use crate::ChatterboxError;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub context: Option<String>,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: None,
            field: field.into(),
            message: message.into(),
        }
    }

    fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref ctx) = self.context {
            write!(f, "[{}] {}: {}", ctx, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a Chatterbox configuration
pub fn validate_config(config: &ChatterboxConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if config.repo_dir.trim().is_empty() {
        errors.push(ValidationError::new(
            "repo_dir",
            "Repository directory cannot be empty",
        ));
    }

    for (field, topic) in [
        ("broadcast", &config.topics.broadcast),
        ("beacon", &config.topics.beacon),
    ] {
        if topic.trim().is_empty() {
            errors.push(
                ValidationError::new(field, "Topic cannot be empty").with_context("topics"),
            );
        }
    }

    if !config.topics.broadcast.is_empty() && config.topics.broadcast == config.topics.beacon {
        errors.push(
            ValidationError::new(
                "beacon",
                format!(
                    "Beacon topic must differ from broadcast topic '{}'",
                    config.topics.broadcast
                ),
            )
            .with_context("topics"),
        );
    }

    if config.friends_message_history_size == 0 {
        errors.push(ValidationError::new(
            "friends_message_history_size",
            "Must keep at least one message",
        ));
    }

    if config.feed_channel_capacity == 0 {
        errors.push(ValidationError::new(
            "feed_channel_capacity",
            "Capacity must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate configuration and return a Result
pub fn validate_config_result(config: &ChatterboxConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        ChatterboxError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}
