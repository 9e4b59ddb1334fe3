//! Event type discriminators and payload shapes.

pub mod event_type;
mod lenient;
pub mod payloads;

pub use event_type::{ALL_EVENT_TYPES, EventCategory, EventType};
pub use payloads::*;
