//! The versioned event envelope streamed during a turn.
//!
//! Wire shape: `{v, id, seq, ts, conversation_id, message_id?, type, payload}`.
//! Unknown `type` strings decode into [`EventKind::Unknown`] instead of
//! failing, so a newer backend never breaks an older client mid-stream.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::EventType;

/// Current event protocol version.
pub const EVENT_PROTOCOL_VERSION: u32 = 1;

/// Discriminant of a [`ChatEvent`]: a known type or an opaque fallback.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A type this client understands.
    Known(EventType),
    /// A type added by the backend after this client was built.
    Unknown(String),
}

impl EventKind {
    /// Parse a wire type string.
    pub fn parse(s: &str) -> Self {
        s.parse::<EventType>()
            .map_or_else(|_| Self::Unknown(s.to_owned()), Self::Known)
    }

    /// The wire string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(t) => t.as_str(),
            Self::Unknown(s) => s,
        }
    }

    /// The known type, if any.
    pub fn known(&self) -> Option<EventType> {
        match self {
            Self::Known(t) => Some(*t),
            Self::Unknown(_) => None,
        }
    }
}

impl From<EventType> for EventKind {
    fn from(t: EventType) -> Self {
        Self::Known(t)
    }
}

/// One decoded stream event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireEvent", into = "WireEvent")]
pub struct ChatEvent {
    /// Protocol version.
    pub version: u32,
    /// Event id.
    pub id: String,
    /// Per-conversation sequence number (non-decreasing).
    pub seq: u64,
    /// Server timestamp in milliseconds.
    pub ts: i64,
    /// Conversation the event belongs to.
    pub conversation_id: String,
    /// Assistant message id, when the backend attaches one.
    pub message_id: Option<String>,
    /// Event discriminant.
    pub kind: EventKind,
    /// Raw payload; see [`ChatEvent::payload_as`].
    pub payload: Value,
}

impl ChatEvent {
    /// Build an event with defaults for the envelope fields.
    pub fn new(kind: impl Into<EventKind>, seq: u64, payload: Value) -> Self {
        Self {
            version: EVENT_PROTOCOL_VERSION,
            id: String::new(),
            seq,
            ts: 0,
            conversation_id: String::new(),
            message_id: None,
            kind: kind.into(),
            payload,
        }
    }

    /// Set the conversation id.
    #[must_use]
    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = conversation_id.into();
        self
    }

    /// The known event type, if any.
    pub fn event_type(&self) -> Option<EventType> {
        self.kind.known()
    }

    /// The wire type string.
    pub fn type_str(&self) -> &str {
        self.kind.as_str()
    }

    /// Parse the payload into a typed struct.
    ///
    /// A `null` payload is treated as an empty object so lenient payload
    /// structs still produce their defaults.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.payload {
            Value::Null => serde_json::from_value(Value::Object(serde_json::Map::new())),
            other => T::deserialize(other),
        }
    }
}

// ── Wire representation ─────────────────────────────────────────────────────

fn default_version() -> u32 {
    EVENT_PROTOCOL_VERSION
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct WireEvent {
    #[serde(default = "default_version")]
    v: u32,
    #[serde(default)]
    id: String,
    #[serde(default)]
    seq: u64,
    #[serde(default)]
    ts: i64,
    #[serde(default)]
    conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    payload: Value,
}

impl From<WireEvent> for ChatEvent {
    fn from(w: WireEvent) -> Self {
        Self {
            version: w.v,
            id: w.id,
            seq: w.seq,
            ts: w.ts,
            conversation_id: w.conversation_id,
            message_id: w.message_id,
            kind: EventKind::parse(&w.event_type),
            payload: w.payload,
        }
    }
}

impl From<ChatEvent> for WireEvent {
    fn from(e: ChatEvent) -> Self {
        Self {
            v: e.version,
            id: e.id,
            seq: e.seq,
            ts: e.ts,
            conversation_id: e.conversation_id,
            message_id: e.message_id,
            event_type: e.kind.as_str().to_owned(),
            payload: e.payload,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
