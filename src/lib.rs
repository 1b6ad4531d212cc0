//! Chatterbox - Peer-to-peer contact messaging
//!
//! Every participant announces short text messages on a shared pub/sub topic.
//! Each listener independently decides how much of a sender's history to keep:
//! friends get a configurable backlog, everyone else only their latest message.
//!
//! # Architecture
//!
//! - **locks**: Named async locks keyed by peer ID (`KeyMutex`)
//! - **messages**: Envelope validation, history writer, live feeds and the
//!   `Messages` facade
//! - **store**: Path-addressed byte storage (filesystem, in-memory)
//! - **pubsub**: Topic-based broadcast channel (in-process loopback)
//! - **peers**: Peer directory (friend flags, last message summary)
//! - **config**: YAML configuration and validation
//! - **node**: Composition of the above into a running `Chatterbox`

// Core modules
pub mod config;
pub mod error;
pub mod locks;
pub mod logging;

// Substrates
pub mod peers;
pub mod pubsub;
pub mod store;

// Messaging engine
pub mod messages;
pub mod node;

// Re-exports
pub use error::{ChatterboxError, Result};
pub use node::Chatterbox;
