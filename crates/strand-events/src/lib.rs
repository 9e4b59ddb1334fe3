//! # strand-events
//!
//! Typed event model and wire formats for the Strand timeline engine.
//!
//! - **Event types**: 36-variant [`EventType`] with category helpers, plus an
//!   opaque [`EventKind::Unknown`] fallback for forward compatibility
//! - **Envelope**: [`ChatEvent`] matching `{v, id, seq, ts, conversation_id, message_id?, type, payload}`
//! - **Payloads**: lenient typed payload structs parsed on demand
//! - **Decoding**: `data: ` frame extraction; malformed frames are dropped, never fatal
//! - **Requests**: [`ChatRequest`] body for the turn endpoint
//! - **History**: [`HistoryMessage`] input for cold starts
//! - **Side channel**: [`WsMessage`] envelope with reserved `system.*` actions

#![deny(unsafe_code)]

pub mod decode;
pub mod envelope;
pub mod errors;
pub mod event;
pub mod history;
pub mod request;
pub mod types;

pub use decode::{decode_frame, decode_line, extract_data};
pub use envelope::{WsError, WsMessage};
pub use errors::DecodeError;
pub use event::{ChatEvent, EventKind};
pub use history::{HistoryMessage, HistoryRole};
pub use request::{ChatRequest, ImageAttachment};
pub use types::{ALL_EVENT_TYPES, EventCategory, EventType};
