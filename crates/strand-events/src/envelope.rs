//! Side-channel socket envelope.
//!
//! Every frame on the long-lived socket is a [`WsMessage`]:
//! `{v, id, ts, action, payload, conversation_id?, reply_to?, error?}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strand_core::FrameId;

use crate::errors::DecodeError;

/// Side-channel protocol version.
pub const WS_PROTOCOL_VERSION: u32 = 1;

// ── Reserved actions ────────────────────────────────────────────────────────

/// Sent by the peer after join; payload carries `connection_id`.
pub const ACTION_CONNECTED: &str = "system.connected";
/// Heartbeat ping sent by the client.
pub const ACTION_PING: &str = "system.ping";
/// Heartbeat reply sent by the peer.
pub const ACTION_PONG: &str = "system.pong";

/// Error attached to a reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WsError {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Extra detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

/// One side-channel frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WsMessage {
    /// Protocol version.
    pub v: u32,
    /// Envelope id.
    pub id: String,
    /// Send time in milliseconds.
    pub ts: i64,
    /// Action name.
    pub action: String,
    /// Action payload.
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// Conversation the frame belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Id of the envelope this replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Error, for failed replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WsError>,
}

impl WsMessage {
    /// Build an outbound envelope with a fresh id and the current time.
    pub fn new(
        action: impl Into<String>,
        payload: Map<String, Value>,
        conversation_id: Option<String>,
    ) -> Self {
        Self {
            v: WS_PROTOCOL_VERSION,
            id: FrameId::new().into_inner(),
            ts: strand_core::time::now_ms(),
            action: action.into(),
            payload,
            conversation_id,
            reply_to: None,
            error: None,
        }
    }

    /// A heartbeat ping.
    pub fn ping() -> Self {
        Self::new(ACTION_PING, Map::new(), None)
    }

    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(text).map_err(|e| DecodeError::Json {
            message: e.to_string(),
            preview: text.chars().take(80).collect(),
        })
    }

    /// Encode as a text frame.
    pub fn encode(&self) -> String {
        // Serializing string-keyed maps and plain structs cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Whether this is the peer's join acknowledgement.
    pub fn is_connected(&self) -> bool {
        self.action == ACTION_CONNECTED
    }

    /// Whether this is a heartbeat reply.
    pub fn is_pong(&self) -> bool {
        self.action == ACTION_PONG
    }

    /// `connection_id` from a `system.connected` payload.
    pub fn connection_id(&self) -> Option<&str> {
        self.payload.get("connection_id").and_then(Value::as_str)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
