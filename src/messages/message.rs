//! Message and history types
//!
//! A [`Message`] is one text received from (or sent by) a peer. A
//! [`PeerHistory`] is the ordered list kept for one peer, most recent last.
//!
//! Both serialize to the persisted JSON format:
//!
//! ```json
//! [{"id":"…","text":"hello","receivedAt":1700000000000}]
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Unique message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generate a fresh random ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Create from an existing string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the underlying string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current time as milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A single message in a peer's history
///
/// Immutable once persisted, except for `read_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique ID assigned when the message was recorded
    pub id: MessageId,

    /// Message body, never empty
    pub text: String,

    /// When the message was recorded (ms since epoch)
    pub received_at: i64,

    /// When the local user read it (ms since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<i64>,
}

impl Message {
    /// Create a message received now with a fresh ID
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            text: text.into(),
            received_at: now_millis(),
            read_at: None,
        }
    }

    /// `received_at` as a UTC timestamp
    pub fn received_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.received_at).single()
    }

    /// Has the message been marked read?
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// Ordered messages for one peer, most recent last
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerHistory(Vec<Message>);

impl PeerHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` and drop the oldest entries beyond `cap`
    ///
    /// A `cap` of zero is treated as one so the newest message always survives.
    pub fn push_capped(&mut self, message: Message, cap: usize) {
        self.0.push(message);
        let cap = cap.max(1);
        if self.0.len() > cap {
            let excess = self.0.len() - cap;
            self.0.drain(..excess);
        }
    }

    /// Find a message by ID
    pub fn get_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.0.iter_mut().find(|m| &m.id == id)
    }

    /// Number of unread messages
    pub fn unread_count(&self) -> usize {
        self.0.iter().filter(|m| !m.is_read()).count()
    }
}

impl Deref for PeerHistory {
    type Target = [Message];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Message>> for PeerHistory {
    fn from(messages: Vec<Message>) -> Self {
        Self(messages)
    }
}

impl IntoIterator for PeerHistory {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
