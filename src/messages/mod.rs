//! Messaging engine
//!
//! Inbound envelopes and local broadcasts both end up in the
//! [`HistoryWriter`], serialized per peer by the shared
//! [`KeyMutex`](crate::locks::KeyMutex). Every completed write is announced on
//! the [`ChangeBus`], which drives any open [`Feed`].
//!
//! ```text
//! broadcast(text) ──┐
//!                   ├─► HistoryWriter ─► store ─► ChangeBus ─► feeds
//! pubsub record ─► validate ─┘
//! ```

mod envelope;
mod feed;
mod message;
mod service;
mod writer;

pub use envelope::{
    validate, validate_record, Envelope, EnvelopeRejection, InboundMessage, ENVELOPE_VERSION,
};
pub use feed::{ChangeBus, Feed, FeedError};
pub use message::{now_millis, Message, MessageId, PeerHistory};
pub use service::Messages;
pub use writer::HistoryWriter;

pub use tokio_util::sync::CancellationToken;
