//! Broadcast envelope codec and validation
//!
//! Wire format (UTF-8 JSON, unknown fields ignored):
//!
//! ```json
//! {"version":"1.0.0","text":"hello"}
//! ```
//!
//! Inbound envelopes are untrusted. [`validate`] classifies every rejection
//! so it can be logged, but rejections are never surfaced to callers.

use crate::pubsub::TransportRecord;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// The only envelope schema version this node speaks
pub const ENVELOPE_VERSION: &str = "1.0.0";

/// Outbound envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope<'a> {
    pub version: &'a str,
    pub text: &'a str,
}

impl<'a> Envelope<'a> {
    /// Envelope at the current schema version
    pub fn new(text: &'a str) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            text,
        }
    }

    /// Serialize for the broadcast channel
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Why an inbound envelope was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeRejection {
    /// Payload is not a JSON object
    Malformed(String),
    /// `version` missing or not the supported one
    UnsupportedVersion(Option<String>),
    /// `text` missing, not a string, or empty
    InvalidText,
    /// Sent by this node; recorded at broadcast time instead
    SelfOriginated,
}

impl fmt::Display for EnvelopeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeRejection::Malformed(e) => write!(f, "malformed payload: {}", e),
            EnvelopeRejection::UnsupportedVersion(Some(v)) => {
                write!(f, "unsupported version {:?}", v)
            }
            EnvelopeRejection::UnsupportedVersion(None) => write!(f, "missing version"),
            EnvelopeRejection::InvalidText => write!(f, "invalid message text"),
            EnvelopeRejection::SelfOriginated => write!(f, "own message echoed back"),
        }
    }
}

impl std::error::Error for EnvelopeRejection {}

/// An inbound message that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub peer_id: String,
    pub text: String,
}

/// Validate a raw payload from `from`, as seen by the node `own_peer_id`
pub fn validate(
    data: &[u8],
    from: &str,
    own_peer_id: &str,
) -> Result<InboundMessage, EnvelopeRejection> {
    let value: Value = serde_json::from_slice(data)
        .map_err(|e| EnvelopeRejection::Malformed(e.to_string()))?;
    let fields = value
        .as_object()
        .ok_or_else(|| EnvelopeRejection::Malformed("expected a JSON object".to_string()))?;

    match fields.get("version") {
        Some(Value::String(v)) if v == ENVELOPE_VERSION => {}
        Some(Value::String(v)) => {
            return Err(EnvelopeRejection::UnsupportedVersion(Some(v.clone())));
        }
        Some(Value::Null) | None => return Err(EnvelopeRejection::UnsupportedVersion(None)),
        Some(other) => {
            return Err(EnvelopeRejection::UnsupportedVersion(Some(other.to_string())));
        }
    }

    let text = match fields.get("text") {
        Some(Value::String(text)) if !text.is_empty() => text.clone(),
        _ => return Err(EnvelopeRejection::InvalidText),
    };

    if from == own_peer_id {
        return Err(EnvelopeRejection::SelfOriginated);
    }

    Ok(InboundMessage {
        peer_id: from.to_string(),
        text,
    })
}

/// Validate a transport record
pub fn validate_record(
    record: &TransportRecord,
    own_peer_id: &str,
) -> Result<InboundMessage, EnvelopeRejection> {
    validate(&record.data, &record.from, own_peer_id)
}
