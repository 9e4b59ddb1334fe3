//! Lifecycle actions applied around the event stream.
//!
//! Like the reducer, every action takes a snapshot and returns the next
//! state. The `_at` forms take the item timestamp explicitly.

use strand_events::ImageAttachment;
use strand_events::history::CallToAction;

use crate::helpers::waiting_id;
use crate::state::{ActiveTurn, TimelineState};
use crate::types::{GreetingItem, ItemBase, UserMessageItem, WaitingItem};

/// Channel recorded on greetings that name none.
pub const DEFAULT_GREETING_CHANNEL: &str = "web";

/// Input for [`add_greeting`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Greeting {
    /// Item id; also the greeting's turn id.
    pub id: String,
    /// Heading.
    pub title: Option<String>,
    /// Sub-heading.
    pub subtitle: Option<String>,
    /// Body text.
    pub body: String,
    /// Call to action.
    pub cta: Option<CallToAction>,
    /// Display delay, defaults to 0.
    pub delay_ms: Option<u64>,
    /// Channel, defaults to `"web"`.
    pub channel: Option<String>,
}

/// Append the user's message. Its turn id is its own id.
pub fn add_user_message(
    state: &TimelineState,
    id: &str,
    content: &str,
    images: Vec<ImageAttachment>,
) -> TimelineState {
    add_user_message_at(state, id, content, images, strand_core::time::now_ms())
}

/// [`add_user_message`] with an explicit timestamp.
pub fn add_user_message_at(
    state: &TimelineState,
    id: &str,
    content: &str,
    images: Vec<ImageAttachment>,
    now_ms: i64,
) -> TimelineState {
    let mut next = state.clone();
    next.insert(UserMessageItem {
        base: ItemBase::new(id, id, now_ms),
        content: content.to_owned(),
        images,
        withdrawn: None,
        edited: None,
    });
    next
}

/// Append a greeting card.
pub fn add_greeting(state: &TimelineState, greeting: Greeting) -> TimelineState {
    add_greeting_at(state, greeting, strand_core::time::now_ms())
}

/// [`add_greeting`] with an explicit timestamp.
pub fn add_greeting_at(state: &TimelineState, greeting: Greeting, now_ms: i64) -> TimelineState {
    let mut next = state.clone();
    next.insert(GreetingItem {
        base: ItemBase::new(greeting.id.clone(), greeting.id, now_ms),
        title: greeting.title,
        subtitle: greeting.subtitle,
        body: greeting.body,
        cta: greeting.cta,
        delay_ms: greeting.delay_ms.unwrap_or(0),
        channel: greeting
            .channel
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_GREETING_CHANNEL.to_owned()),
    });
    next
}

/// Open a streaming turn and show its waiting placeholder.
pub fn start_turn(state: &TimelineState, turn_id: &str) -> TimelineState {
    start_turn_at(state, turn_id, strand_core::time::now_ms())
}

/// [`start_turn`] with an explicit timestamp.
pub fn start_turn_at(state: &TimelineState, turn_id: &str, now_ms: i64) -> TimelineState {
    let mut next = state.clone();
    next.insert(WaitingItem {
        base: ItemBase::new(waiting_id(turn_id), turn_id, now_ms),
    });
    next.active_turn = ActiveTurn::started(turn_id);
    next
}

/// Stop streaming. The turn id and items are kept.
pub fn end_turn(state: &TimelineState) -> TimelineState {
    let mut next = state.clone();
    next.active_turn.is_streaming = false;
    next
}

/// Drop every item of a turn and reset the active turn.
pub fn clear_turn(state: &TimelineState, turn_id: &str) -> TimelineState {
    let mut next = state.clone();
    let _ = next.retain(|item| item.turn_id() != turn_id);
    next.active_turn = ActiveTurn::default();
    next
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
