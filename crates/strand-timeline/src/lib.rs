//! # strand-timeline
//!
//! Timeline state and the pure event reducer for the Strand streaming
//! timeline engine.
//!
//! - **Model**: [`TimelineItem`] variants; model and tool calls are containers
//!   with their own child index
//! - **State**: [`TimelineState`] with an exact id index and copy-on-write items
//! - **Reducer**: [`reduce`] folds one [`strand_events::ChatEvent`] into the next state
//! - **Actions**: optimistic user messages, greetings, turn open/close/clear
//! - **Composition**: [`ComposedReducer`] layers application reducers over the built-in one
//! - **History**: [`history_to_timeline`] for cold starts

#![deny(unsafe_code)]

pub mod actions;
pub mod compose;
pub mod helpers;
pub mod history;
pub mod reducer;
pub mod state;
pub mod types;

pub use actions::{
    Greeting, add_greeting, add_greeting_at, add_user_message, add_user_message_at, clear_turn,
    end_turn, start_turn, start_turn_at,
};
pub use compose::{ComposedReducer, CustomReducer};
pub use helpers::{tool_label, waiting_id};
pub use history::{history_to_timeline, history_to_timeline_at};
pub use reducer::{reduce, reduce_at};
pub use state::{ActiveTurn, TimelineState};
pub use types::{ItemStatus, TimelineItem};
