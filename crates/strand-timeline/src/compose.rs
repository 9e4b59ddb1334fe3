//! Reducer composition.
//!
//! Applications with their own event types register [`CustomReducer`]s.
//! Each event is offered to them in registration order; the first one that
//! returns a state wins, and events nobody claims fall through to the
//! built-in [`reduce_at`](crate::reducer::reduce_at).

use std::fmt;
use std::sync::Arc;

use strand_events::ChatEvent;

use crate::reducer::reduce_at;
use crate::state::TimelineState;

/// An application reducer. Returns `None` for events it does not handle.
pub trait CustomReducer: Send + Sync {
    /// Fold `event` into `state`, or decline it.
    fn reduce(&self, state: &TimelineState, event: &ChatEvent) -> Option<TimelineState>;
}

impl<F> CustomReducer for F
where
    F: Fn(&TimelineState, &ChatEvent) -> Option<TimelineState> + Send + Sync,
{
    fn reduce(&self, state: &TimelineState, event: &ChatEvent) -> Option<TimelineState> {
        self(state, event)
    }
}

/// Custom reducers in priority order, backed by the built-in reducer.
#[derive(Clone, Default)]
pub struct ComposedReducer {
    custom: Vec<Arc<dyn CustomReducer>>,
}

impl ComposedReducer {
    /// The built-in reducer alone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reducer after the existing ones.
    #[must_use]
    pub fn with(mut self, reducer: impl CustomReducer + 'static) -> Self {
        self.push(reducer);
        self
    }

    /// Register a reducer after the existing ones.
    pub fn push(&mut self, reducer: impl CustomReducer + 'static) {
        self.custom.push(Arc::new(reducer));
    }

    /// Number of custom reducers.
    pub fn len(&self) -> usize {
        self.custom.len()
    }

    /// Whether only the built-in reducer is active.
    pub fn is_empty(&self) -> bool {
        self.custom.is_empty()
    }

    /// Fold one event using the wall clock.
    pub fn reduce(&self, state: &TimelineState, event: &ChatEvent) -> TimelineState {
        self.reduce_at(state, event, strand_core::time::now_ms())
    }

    /// Fold one event at a fixed time. The clock only reaches the built-in
    /// reducer.
    pub fn reduce_at(&self, state: &TimelineState, event: &ChatEvent, now_ms: i64) -> TimelineState {
        self.custom
            .iter()
            .find_map(|r| r.reduce(state, event))
            .unwrap_or_else(|| reduce_at(state, event, now_ms))
    }
}

impl fmt::Debug for ComposedReducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedReducer")
            .field("custom", &self.custom.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::start_turn_at;
    use crate::types::{CustomItem, ItemBase, TimelineItem};
    use serde_json::json;
    use strand_events::EventType;

    fn intent_reducer(state: &TimelineState, event: &ChatEvent) -> Option<TimelineState> {
        if event.type_str() != "intent.extracted" {
            return None;
        }
        let turn_id = state.active_turn.turn_id.clone().unwrap_or_default();
        let mut next = state.clone();
        next.insert(CustomItem {
            base: ItemBase::new(format!("intent:{}", event.seq), turn_id, 0),
            kind: "intent.extracted".into(),
            data: event.payload.clone(),
        });
        Some(next)
    }

    fn unknown(kind: &str, seq: u64) -> ChatEvent {
        serde_json::from_value(json!({"type": kind, "seq": seq, "payload": {"intent": "buy"}}))
            .unwrap()
    }

    #[test]
    fn custom_reducer_claims_its_events() {
        let reducer = ComposedReducer::new().with(intent_reducer);
        let state = start_turn_at(&TimelineState::new(), "t1", 0);
        let state = reducer.reduce_at(&state, &unknown("intent.extracted", 3), 1);
        match state.get("intent:3") {
            Some(TimelineItem::Custom(c)) => {
                assert_eq!(c.base.turn_id, "t1");
                assert_eq!(c.data["intent"], "buy");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unclaimed_events_fall_through() {
        let reducer = ComposedReducer::new().with(intent_reducer);
        let state = start_turn_at(&TimelineState::new(), "t1", 0);
        let event = ChatEvent::new(EventType::Error, 4, json!({"message": "boom"}));
        let state = reducer.reduce_at(&state, &event, 1);
        assert!(state.get("error:4").is_some());
    }

    #[test]
    fn first_registered_wins() {
        let reducer = ComposedReducer::new()
            .with(|s: &TimelineState, _: &ChatEvent| {
                let mut next = s.clone();
                next.active_turn.is_streaming = true;
                Some(next)
            })
            .with(|_: &TimelineState, _: &ChatEvent| -> Option<TimelineState> {
                panic!("second reducer must not run")
            });
        let state = reducer.reduce_at(&TimelineState::new(), &unknown("anything", 1), 0);
        assert!(state.active_turn.is_streaming);
        assert_eq!(reducer.len(), 2);
    }

    #[test]
    fn empty_composition_is_builtin() {
        let reducer = ComposedReducer::new();
        assert!(reducer.is_empty());
        let before = TimelineState::new();
        let event = ChatEvent::new(EventType::SupportHumanMode, 2, json!({}));
        assert_eq!(
            reducer.reduce_at(&before, &event, 9),
            crate::reducer::reduce_at(&before, &event, 9)
        );
    }
}
