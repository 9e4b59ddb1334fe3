//! The pure event reducer.
//!
//! [`reduce`] folds one [`ChatEvent`] into a [`TimelineState`] and returns the
//! next state, leaving the input snapshot untouched. It never performs I/O;
//! the only ambient input is the clock, which [`reduce_at`] takes explicitly.
//!
//! Dispatch order:
//! 1. `support.*` events apply with or without an active turn
//! 2. `tool.media_attached` applies to any tool call, open or closed
//! 3. everything else is ignored while no turn is active

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use strand_events::types::{
    ContextSummarizedPayload, ErrorPayload, EventType, FinalPayload, LlmCallEndPayload,
    LlmCallStartPayload, MetaStartPayload, ProductsPayload, SkillActivatedPayload,
    SupportEventPayload, TextDeltaPayload, TodosPayload, ToolEndPayload, ToolMediaPayload,
    ToolStartPayload,
};
use strand_events::ChatEvent;
use tracing::debug;

use crate::helpers::{generate_id, tool_label, waiting_id};
use crate::state::TimelineState;
use crate::types::{
    CallClusterItem, Children, ContextSummarizedSubItem, DataSubItem, ErrorItem, FinalItem,
    ItemBase, ItemStatus, MemoryEventItem, MemoryKind, Moderation, ProductsSubItem,
    SkillActivatedItem, SupportEventItem, SupportKind, TimelineItem, TodosSubItem, ToolCallItem,
};

/// Message used for `error` events that carry none.
pub const DEFAULT_ERROR_MESSAGE: &str = "unknown error";

/// Fold one event into the state using the wall clock.
pub fn reduce(state: &TimelineState, event: &ChatEvent) -> TimelineState {
    reduce_at(state, event, strand_core::time::now_ms())
}

/// Fold one event into the state at a fixed time.
pub fn reduce_at(state: &TimelineState, event: &ChatEvent, now_ms: i64) -> TimelineState {
    let mut next = state.clone();
    apply(&mut next, event, now_ms);
    next
}

/// Per-event context for the handlers.
struct Step<'a> {
    event: &'a ChatEvent,
    turn_id: &'a str,
    now: i64,
}

impl Step<'_> {
    fn base(&self, id: impl Into<String>) -> ItemBase {
        ItemBase::new(id, self.turn_id, self.now)
    }

    fn seq(&self) -> u64 {
        self.event.seq
    }
}

fn apply(state: &mut TimelineState, event: &ChatEvent, now: i64) {
    let Some(kind) = event.event_type() else {
        debug!(event_type = event.type_str(), "ignoring unknown event type");
        return;
    };

    if !kind.is_turn_scoped() {
        if kind.is_support() {
            let turn_id = state
                .active_turn
                .turn_id
                .clone()
                .unwrap_or_else(|| format!("ws-{now}"));
            let step = Step {
                event,
                turn_id: &turn_id,
                now,
            };
            on_support(state, &step, kind);
        } else {
            on_media_attached(state, event);
        }
        return;
    }

    let Some(turn_id) = state.active_turn.turn_id.clone() else {
        debug!(event_type = kind.as_str(), seq = event.seq, "no active turn, ignoring");
        return;
    };
    let step = Step {
        event,
        turn_id: &turn_id,
        now,
    };

    match kind {
        EventType::MetaStart => on_meta_start(state, &step),
        EventType::LlmCallStart => on_call_start(state, &step),
        EventType::LlmCallEnd => on_call_end(state, &step),
        EventType::AssistantReasoningDelta => on_reasoning_delta(state, &step),
        EventType::AssistantDelta => on_content_delta(state, &step),
        EventType::AssistantFinal => on_final(state, &step),
        EventType::ToolStart => on_tool_start(state, &step),
        EventType::ToolEnd => on_tool_end(state, &step),
        EventType::AssistantProducts => on_products(state, &step),
        EventType::AssistantTodos => on_todos(state, &step),
        EventType::ContextSummarized => on_context_summarized(state, &step),
        EventType::MemoryExtractionStart => on_memory(state, &step, MemoryKind::ExtractionStart),
        EventType::MemoryExtractionComplete => {
            on_memory(state, &step, MemoryKind::ExtractionComplete);
        }
        EventType::MemoryProfileUpdated => on_memory(state, &step, MemoryKind::ProfileUpdated),
        EventType::Error => on_error(state, &step),
        EventType::SkillActivated => on_skill_activated(state, &step),
        // Supervisor, middleware, skill.loaded and context.trimmed carry no
        // timeline representation.
        _ => {}
    }
}

/// Parse a payload, logging and skipping events whose payload has the
/// wrong shape.
fn payload<T: DeserializeOwned>(event: &ChatEvent) -> Option<T> {
    match event.payload_as::<T>() {
        Ok(p) => Some(p),
        Err(e) => {
            debug!(event_type = event.type_str(), seq = event.seq, error = %e, "bad payload, ignoring");
            None
        }
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

// ── Stream level ────────────────────────────────────────────────────────────

fn on_meta_start(state: &mut TimelineState, step: &Step<'_>) {
    let Some(p) = payload::<MetaStartPayload>(step.event) else {
        return;
    };
    let Some(new_turn) = non_empty(p.assistant_message_id) else {
        return;
    };
    let old_turn = step.turn_id;
    if new_turn == old_turn {
        return;
    }

    let old_waiting = waiting_id(old_turn);
    let new_waiting = waiting_id(&new_turn);
    let renamed = state.update_where(
        |item| item.turn_id() == old_turn,
        |item| {
            if matches!(item, TimelineItem::Waiting(_)) && item.id() == old_waiting {
                item.base_mut().id.clone_from(&new_waiting);
            }
            item.base_mut().turn_id.clone_from(&new_turn);
        },
    );
    state.rebuild_index();
    debug!(old_turn, new_turn = %new_turn, renamed, "turn id assigned by server");
    state.active_turn.turn_id = Some(new_turn);
}

fn on_final(state: &mut TimelineState, step: &Step<'_>) {
    let Some(p) = payload::<FinalPayload>(step.event) else {
        return;
    };
    let turn_id = step.turn_id;

    let _ = state.update_where(
        |item| {
            item.as_cluster()
                .is_some_and(|c| c.base.turn_id == turn_id && c.has_open_reasoning())
        },
        |item| {
            if let Some(c) = item.as_cluster_mut() {
                c.close_reasoning();
            }
        },
    );

    let last_cluster = state
        .iter()
        .rev()
        .filter_map(TimelineItem::as_cluster)
        .find(|c| c.base.turn_id == turn_id)
        .map(|c| c.base.id.clone());
    if let Some(id) = last_cluster {
        let now = step.now;
        let _ = state.update(&id, |item| {
            if let Some(c) = item.as_cluster_mut() {
                let _ = c.promote_reasoning(now);
            }
        });
    }

    state.insert(FinalItem {
        base: step.base(format!("final:{}", step.seq())),
        content: p.content,
    });
    state.active_turn.is_streaming = false;
}

fn on_error(state: &mut TimelineState, step: &Step<'_>) {
    let Some(p) = payload::<ErrorPayload>(step.event) else {
        return;
    };
    state.insert(ErrorItem {
        base: step.base(format!("error:{}", step.seq())),
        message: non_empty(p.message).unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
    });
}

// ── Model calls ─────────────────────────────────────────────────────────────

fn on_call_start(state: &mut TimelineState, step: &Step<'_>) {
    let Some(p) = payload::<LlmCallStartPayload>(step.event) else {
        return;
    };
    let _ = state.remove_waiting(step.turn_id);

    let call_id = non_empty(p.llm_call_id).unwrap_or_else(generate_id);
    state.insert(CallClusterItem {
        base: step.base(call_id.clone()),
        status: ItemStatus::Running,
        message_count: p.message_count,
        elapsed_ms: None,
        error: None,
        children: Children::default(),
    });
    state.active_turn.current_call_id = Some(call_id);
    state.active_turn.current_tool_call_id = None;
}

fn on_call_end(state: &mut TimelineState, step: &Step<'_>) {
    let Some(p) = payload::<LlmCallEndPayload>(step.event) else {
        return;
    };
    let Some(target) =
        non_empty(p.llm_call_id).or_else(|| state.active_turn.current_call_id.clone())
    else {
        return;
    };
    let error = non_empty(p.error);
    let _ = state.update(&target, |item| {
        if let Some(c) = item.as_cluster_mut() {
            c.status = if error.is_some() {
                ItemStatus::Error
            } else {
                ItemStatus::Success
            };
            c.elapsed_ms = p.elapsed_ms;
            c.error = error;
        }
    });
    state.active_turn.current_call_id = None;
}

fn on_reasoning_delta(state: &mut TimelineState, step: &Step<'_>) {
    let Some(p) = payload::<TextDeltaPayload>(step.event) else {
        return;
    };
    if p.delta.is_empty() {
        return;
    }
    let now = step.now;
    let _ = state.update_current_cluster(|c| c.push_reasoning(&p.delta, now));
}

fn on_content_delta(state: &mut TimelineState, step: &Step<'_>) {
    let Some(p) = payload::<TextDeltaPayload>(step.event) else {
        return;
    };
    if p.delta.is_empty() {
        return;
    }
    let now = step.now;
    let _ = state.update_current_cluster(|c| c.push_content(&p.delta, now));
}

// ── Tools ───────────────────────────────────────────────────────────────────

fn on_tool_start(state: &mut TimelineState, step: &Step<'_>) {
    let Some(p) = payload::<ToolStartPayload>(step.event) else {
        return;
    };
    let tool_call_id = non_empty(p.tool_call_id).unwrap_or_else(generate_id);
    state.insert(ToolCallItem {
        base: step.base(tool_call_id.clone()),
        label: tool_label(&p.name),
        name: p.name,
        status: ItemStatus::Running,
        input: p.input,
        count: None,
        elapsed_ms: None,
        error: None,
        output_preview: None,
        media_ref: None,
        started_at_ms: step.now,
        children: Children::default(),
    });
    state.active_turn.current_tool_call_id = Some(tool_call_id);
}

fn on_tool_end(state: &mut TimelineState, step: &Step<'_>) {
    let Some(p) = payload::<ToolEndPayload>(step.event) else {
        return;
    };
    let media = p.media().map(str::to_owned);
    let Some(target) = non_empty(p.tool_call_id)
        .or_else(|| state.active_turn.current_tool_call_id.clone())
    else {
        return;
    };
    let error = non_empty(p.error);
    let status = p
        .status
        .as_deref()
        .and_then(ItemStatus::parse)
        .unwrap_or(if error.is_some() {
            ItemStatus::Error
        } else {
            ItemStatus::Success
        });
    let now = step.now;
    let _ = state.update(&target, |item| {
        if let Some(t) = item.as_tool_call_mut() {
            t.status = status;
            t.count = p.count;
            t.elapsed_ms = Some(u64::try_from(now - t.started_at_ms).unwrap_or(0));
            t.error = error;
            t.output_preview = p.output_preview;
            if media.is_some() {
                t.media_ref = media;
            }
        }
    });
    state.active_turn.current_tool_call_id = None;
}

fn on_media_attached(state: &mut TimelineState, event: &ChatEvent) {
    let Some(p) = payload::<ToolMediaPayload>(event) else {
        return;
    };
    if p.tool_call_id.is_empty() || p.media_ref.is_empty() {
        return;
    }
    let attached = state.update(&p.tool_call_id, |item| {
        if let Some(t) = item.as_tool_call_mut() {
            t.media_ref = Some(p.media_ref);
        }
    });
    if !attached {
        debug!(tool_call_id = %p.tool_call_id, "media for unknown tool call, ignoring");
    }
}

// ── Data ────────────────────────────────────────────────────────────────────

fn on_products(state: &mut TimelineState, step: &Step<'_>) {
    let Some(p) = payload::<ProductsPayload>(step.event) else {
        return;
    };
    if p.items.is_empty() {
        return;
    }
    let _ = state.attach_data(DataSubItem::Products(ProductsSubItem {
        id: format!("products:{}", step.seq()),
        products: p.items,
        ts: step.now,
    }));
}

fn on_todos(state: &mut TimelineState, step: &Step<'_>) {
    let Some(p) = payload::<TodosPayload>(step.event) else {
        return;
    };
    if p.todos.is_empty() {
        return;
    }
    let _ = state.attach_data(DataSubItem::Todos(TodosSubItem {
        id: format!("todos:{}", step.seq()),
        todos: p.todos,
        ts: step.now,
    }));
}

fn on_context_summarized(state: &mut TimelineState, step: &Step<'_>) {
    let Some(p) = payload::<ContextSummarizedPayload>(step.event) else {
        return;
    };
    let _ = state.attach_data(DataSubItem::ContextSummarized(ContextSummarizedSubItem {
        id: format!("context-summarized:{}", step.seq()),
        messages_before: p.messages_before,
        messages_after: p.messages_after,
        tokens_before: p.tokens_before,
        tokens_after: p.tokens_after,
        ts: step.now,
    }));
}

// ── Post-processing / skills ────────────────────────────────────────────────

fn on_memory(state: &mut TimelineState, step: &Step<'_>, kind: MemoryKind) {
    state.insert(MemoryEventItem {
        base: step.base(format!("memory:{}", step.seq())),
        kind,
    });
}

fn on_skill_activated(state: &mut TimelineState, step: &Step<'_>) {
    let Some(p) = payload::<SkillActivatedPayload>(step.event) else {
        return;
    };
    state.insert(SkillActivatedItem {
        base: step.base(format!("skill:{}:{}", p.skill_id, step.seq())),
        skill_id: p.skill_id,
        skill_name: p.skill_name,
        trigger_type: p.trigger_type,
        trigger_keyword: p.trigger_keyword,
    });
}

// ── Support ─────────────────────────────────────────────────────────────────

fn support_kind(kind: EventType) -> Option<SupportKind> {
    match kind {
        EventType::SupportHandoffStarted => Some(SupportKind::HandoffStarted),
        EventType::SupportHandoffEnded => Some(SupportKind::HandoffEnded),
        EventType::SupportHumanMessage => Some(SupportKind::HumanMessage),
        EventType::SupportHumanMode => Some(SupportKind::HumanMode),
        EventType::SupportConnected => Some(SupportKind::Connected),
        _ => None,
    }
}

fn on_support(state: &mut TimelineState, step: &Step<'_>, kind: EventType) {
    if kind == EventType::SupportPing {
        return;
    }
    let Some(p) = payload::<SupportEventPayload>(step.event) else {
        return;
    };

    match kind {
        EventType::SupportMessageWithdrawn => {
            let Some(message_id) = non_empty(p.message_id) else {
                return;
            };
            let marked = state.update(&message_id, |item| {
                if let Some(m) = item.as_user_message_mut() {
                    m.withdrawn = Some(Moderation {
                        at: p.created_at,
                        by: p.operator,
                    });
                }
            });
            debug!(message_id = %message_id, marked, "message withdrawn");
        }
        EventType::SupportMessageEdited => {
            let Some(message_id) = non_empty(p.message_id) else {
                return;
            };
            let marked = state.update(&message_id, |item| {
                if let Some(m) = item.as_user_message_mut() {
                    if let Some(content) = p.content {
                        m.content = content;
                    }
                    m.edited = Some(Moderation {
                        at: p.created_at,
                        by: p.operator,
                    });
                }
            });
            debug!(message_id = %message_id, marked, "message edited");
        }
        EventType::SupportMessagesDeleted => {
            let ids: HashSet<&str> = p.message_ids.iter().map(String::as_str).collect();
            let removed = state.retain(|item| !ids.contains(item.id()));
            debug!(removed, "messages deleted");
        }
        other => {
            let Some(support) = support_kind(other) else {
                return;
            };
            let id = if step.seq() == 0 {
                format!("support:{}", generate_id())
            } else {
                format!("support:{}", step.seq())
            };
            state.insert(SupportEventItem {
                base: step.base(id),
                kind: support,
                message: p.message,
                content: p.content,
                operator: p.operator,
                message_id: p.message_id,
            });
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{add_user_message_at, start_turn_at};
    use crate::types::CallChild;
    use assert_matches::assert_matches;
    use serde_json::{Value, json};

    fn ev(kind: EventType, seq: u64, payload: Value) -> ChatEvent {
        ChatEvent::new(kind, seq, payload)
    }

    /// A state with user message `u1` and an open turn `t1`.
    fn open_turn() -> TimelineState {
        let state = add_user_message_at(&TimelineState::new(), "u1", "hi", Vec::new(), 0);
        start_turn_at(&state, "t1", 0)
    }

    fn fold(state: TimelineState, events: &[ChatEvent]) -> TimelineState {
        events.iter().enumerate().fold(state, |s, (i, e)| {
            let next = reduce_at(&s, e, 1000 + i64::try_from(i).unwrap());
            assert!(next.index_is_consistent(), "index broken after {}", e.type_str());
            next
        })
    }

    fn cluster<'a>(state: &'a TimelineState, id: &str) -> &'a CallClusterItem {
        state.get(id).and_then(TimelineItem::as_cluster).unwrap()
    }

    fn tool<'a>(state: &'a TimelineState, id: &str) -> &'a ToolCallItem {
        state.get(id).and_then(TimelineItem::as_tool_call).unwrap()
    }

    // ── meta.start ──────────────────────────────────────────────────

    #[test]
    fn meta_start_renames_turn_and_waiting() {
        let state = fold(
            open_turn(),
            &[ev(EventType::MetaStart, 1, json!({"assistant_message_id": "a1"}))],
        );
        assert_eq!(state.active_turn.turn_id.as_deref(), Some("a1"));
        assert!(state.get("waiting-t1").is_none());
        assert_eq!(state.get("waiting-a1").unwrap().turn_id(), "a1");
        assert_eq!(state.get("u1").unwrap().turn_id(), "u1");
        assert_eq!(state.position("waiting-a1"), Some(1));
    }

    #[test]
    fn meta_start_same_id_is_noop() {
        let before = open_turn();
        let after = reduce_at(
            &before,
            &ev(EventType::MetaStart, 1, json!({"assistant_message_id": "t1"})),
            5,
        );
        assert_eq!(before, after);
    }

    #[test]
    fn meta_start_without_id_is_noop() {
        let before = open_turn();
        let after = reduce_at(&before, &ev(EventType::MetaStart, 1, json!({})), 5);
        assert_eq!(before, after);
    }

    // ── model calls ─────────────────────────────────────────────────

    #[test]
    fn call_start_replaces_waiting_with_cluster() {
        let state = fold(
            open_turn(),
            &[ev(EventType::LlmCallStart, 1, json!({"llm_call_id": "c1", "message_count": 3}))],
        );
        assert!(state.get("waiting-t1").is_none());
        let c = cluster(&state, "c1");
        assert_eq!(c.status, ItemStatus::Running);
        assert_eq!(c.message_count, Some(3));
        assert_eq!(state.active_turn.current_call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn call_start_generates_id() {
        let state = fold(open_turn(), &[ev(EventType::LlmCallStart, 1, json!({}))]);
        let id = state.active_turn.current_call_id.clone().unwrap();
        assert!(!id.is_empty());
        assert!(state.get(&id).is_some());
    }

    #[test]
    fn call_start_clears_current_tool() {
        let state = fold(
            open_turn(),
            &[
                ev(EventType::ToolStart, 1, json!({"tool_call_id": "tc1", "name": "x"})),
                ev(EventType::LlmCallStart, 2, json!({"llm_call_id": "c1"})),
            ],
        );
        assert_eq!(state.active_turn.current_tool_call_id, None);
    }

    #[test]
    fn call_end_success_and_error() {
        let state = fold(
            open_turn(),
            &[
                ev(EventType::LlmCallStart, 1, json!({"llm_call_id": "c1"})),
                ev(EventType::LlmCallEnd, 2, json!({"elapsed_ms": 420})),
                ev(EventType::LlmCallStart, 3, json!({"llm_call_id": "c2"})),
                ev(EventType::LlmCallEnd, 4, json!({"llm_call_id": "c2", "error": "rate limited"})),
            ],
        );
        assert_eq!(cluster(&state, "c1").status, ItemStatus::Success);
        assert_eq!(cluster(&state, "c1").elapsed_ms, Some(420));
        assert_eq!(cluster(&state, "c2").status, ItemStatus::Error);
        assert_eq!(cluster(&state, "c2").error.as_deref(), Some("rate limited"));
        assert_eq!(state.active_turn.current_call_id, None);
    }

    #[test]
    fn call_end_without_target_is_noop() {
        let before = open_turn();
        let after = reduce_at(&before, &ev(EventType::LlmCallEnd, 1, json!({})), 5);
        assert_eq!(before, after);
    }

    // ── deltas ──────────────────────────────────────────────────────

    #[test]
    fn content_delta_closes_open_reasoning() {
        let state = fold(
            open_turn(),
            &[
                ev(EventType::LlmCallStart, 1, json!({"llm_call_id": "c1"})),
                ev(EventType::AssistantReasoningDelta, 2, json!({"delta": "thinking"})),
                ev(EventType::AssistantDelta, 3, json!({"delta": "answer"})),
            ],
        );
        let c = cluster(&state, "c1");
        assert_eq!(c.children.len(), 2);
        assert_matches!(&c.children.as_slice()[0], CallChild::Reasoning(r) if !r.is_open && r.text == "thinking");
        assert_matches!(&c.children.as_slice()[1], CallChild::Content(t) if t.text == "answer");
    }

    #[test]
    fn empty_delta_is_ignored() {
        let before = fold(
            open_turn(),
            &[ev(EventType::LlmCallStart, 1, json!({"llm_call_id": "c1"}))],
        );
        let after = reduce_at(&before, &ev(EventType::AssistantDelta, 2, json!({"delta": ""})), 5);
        assert_eq!(before, after);
    }

    #[test]
    fn delta_outside_call_is_ignored() {
        let before = fold(
            open_turn(),
            &[
                ev(EventType::LlmCallStart, 1, json!({"llm_call_id": "c1"})),
                ev(EventType::LlmCallEnd, 2, json!({})),
            ],
        );
        let after = reduce_at(
            &before,
            &ev(EventType::AssistantReasoningDelta, 3, json!({"delta": "late"})),
            5,
        );
        assert_eq!(before, after);
    }

    // ── final ───────────────────────────────────────────────────────

    #[test]
    fn final_promotes_reasoning_only_cluster() {
        let state = fold(
            open_turn(),
            &[
                ev(EventType::LlmCallStart, 1, json!({"llm_call_id": "c1"})),
                ev(EventType::AssistantReasoningDelta, 2, json!({"delta": "Hello "})),
                ev(EventType::AssistantReasoningDelta, 3, json!({"delta": "there"})),
                ev(EventType::LlmCallEnd, 4, json!({})),
                ev(EventType::AssistantFinal, 5, json!({"content": "Hello there"})),
            ],
        );
        let c = cluster(&state, "c1");
        assert_eq!(c.children.len(), 1);
        assert_matches!(&c.children.as_slice()[0], CallChild::Content(t) if t.text == "Hello there");
        assert_matches!(state.get("final:5"), Some(TimelineItem::Final(f)) if f.content.as_deref() == Some("Hello there"));
        assert!(!state.active_turn.is_streaming);
    }

    #[test]
    fn final_closes_reasoning_in_every_cluster() {
        let state = fold(
            open_turn(),
            &[
                ev(EventType::LlmCallStart, 1, json!({"llm_call_id": "c1"})),
                ev(EventType::AssistantReasoningDelta, 2, json!({"delta": "a"})),
                ev(EventType::LlmCallStart, 3, json!({"llm_call_id": "c2"})),
                ev(EventType::AssistantReasoningDelta, 4, json!({"delta": "b"})),
                ev(EventType::AssistantDelta, 5, json!({"delta": "c"})),
                ev(EventType::AssistantFinal, 6, json!({})),
            ],
        );
        assert!(!cluster(&state, "c1").has_open_reasoning());
        // Only the last cluster is considered for promotion.
        assert_matches!(&cluster(&state, "c1").children.as_slice()[0], CallChild::Reasoning(_));
        assert_eq!(cluster(&state, "c2").children.len(), 2);
    }

    // ── tools ───────────────────────────────────────────────────────

    #[test]
    fn tool_lifecycle() {
        let state = TimelineState::new();
        let state = start_turn_at(&state, "t1", 0);
        let state = reduce_at(
            &state,
            &ev(
                EventType::ToolStart,
                1,
                json!({"tool_call_id": "tc1", "name": "search_products", "input": {"q": "shoes"}}),
            ),
            1_000,
        );
        assert_eq!(state.active_turn.current_tool_call_id.as_deref(), Some("tc1"));
        let state = reduce_at(
            &state,
            &ev(EventType::ToolEnd, 2, json!({"count": 4, "screenshot_id": "shot-1"})),
            1_250,
        );
        let t = tool(&state, "tc1");
        assert_eq!(t.label, "Product search");
        assert_eq!(t.status, ItemStatus::Success);
        assert_eq!(t.count, Some(4));
        assert_eq!(t.elapsed_ms, Some(250));
        assert_eq!(t.media_ref.as_deref(), Some("shot-1"));
        assert_eq!(t.input, Some(json!({"q": "shoes"})));
        assert_eq!(state.active_turn.current_tool_call_id, None);
    }

    #[test]
    fn tool_end_status_precedence() {
        let state = fold(
            open_turn(),
            &[
                ev(EventType::ToolStart, 1, json!({"tool_call_id": "a", "name": "x"})),
                ev(EventType::ToolEnd, 2, json!({"tool_call_id": "a", "status": "empty", "error": "none found"})),
                ev(EventType::ToolStart, 3, json!({"tool_call_id": "b", "name": "x"})),
                ev(EventType::ToolEnd, 4, json!({"tool_call_id": "b", "error": "timeout"})),
            ],
        );
        assert_eq!(tool(&state, "a").status, ItemStatus::Empty);
        assert_eq!(tool(&state, "b").status, ItemStatus::Error);
        assert_eq!(tool(&state, "b").error.as_deref(), Some("timeout"));
    }

    #[test]
    fn media_attached_after_close() {
        let state = fold(
            open_turn(),
            &[
                ev(EventType::ToolStart, 1, json!({"tool_call_id": "tc1", "name": "browse"})),
                ev(EventType::ToolEnd, 2, json!({})),
            ],
        );
        let state = crate::actions::end_turn(&state);
        let state = reduce_at(
            &state,
            &ev(EventType::ToolMediaAttached, 3, json!({"tool_call_id": "tc1", "media_ref": "m-9"})),
            5,
        );
        assert_eq!(tool(&state, "tc1").media_ref.as_deref(), Some("m-9"));
    }

    // ── data ────────────────────────────────────────────────────────

    #[test]
    fn products_attach_to_tool_then_cluster() {
        let products = json!({"items": [{"id": "p1", "name": "Boot", "price": 59.0}]});
        let state = fold(
            open_turn(),
            &[
                ev(EventType::LlmCallStart, 1, json!({"llm_call_id": "c1"})),
                ev(EventType::ToolStart, 2, json!({"tool_call_id": "tc1", "name": "search_products"})),
                ev(EventType::AssistantProducts, 3, products.clone()),
                ev(EventType::ToolEnd, 4, json!({})),
                ev(EventType::AssistantProducts, 5, products),
            ],
        );
        assert!(tool(&state, "tc1").children.get("products:3").is_some());
        assert!(cluster(&state, "c1").children.get("products:5").is_some());
    }

    #[test]
    fn empty_products_ignored() {
        let before = fold(
            open_turn(),
            &[ev(EventType::LlmCallStart, 1, json!({"llm_call_id": "c1"}))],
        );
        let after = reduce_at(&before, &ev(EventType::AssistantProducts, 2, json!({"items": []})), 5);
        assert_eq!(before, after);
        let after = reduce_at(&before, &ev(EventType::AssistantTodos, 3, json!({"todos": []})), 5);
        assert_eq!(before, after);
    }

    #[test]
    fn todos_and_summary_attach_to_cluster() {
        let state = fold(
            open_turn(),
            &[
                ev(EventType::LlmCallStart, 1, json!({"llm_call_id": "c1"})),
                ev(EventType::AssistantTodos, 2, json!({"todos": [{"content": "compare", "status": "in_progress"}]})),
                ev(EventType::ContextSummarized, 3, json!({"messages_before": 40, "messages_after": 8})),
            ],
        );
        let c = cluster(&state, "c1");
        assert!(c.children.get("todos:2").is_some());
        assert_matches!(
            c.children.get("context-summarized:3"),
            Some(CallChild::ContextSummarized(s)) if s.messages_before == 40 && s.tokens_after.is_none()
        );
    }

    #[test]
    fn loosely_typed_data_still_attaches() {
        let state = fold(
            open_turn(),
            &[
                ev(EventType::LlmCallStart, 1, json!({"llm_call_id": "c1"})),
                ev(
                    EventType::AssistantProducts,
                    2,
                    json!({"items": [{"id": 42, "name": "Boot", "price": "59.00"}]}),
                ),
                ev(
                    EventType::AssistantTodos,
                    3,
                    json!({"todos": [{"content": "compare", "status": "cancelled"}]}),
                ),
            ],
        );
        let c = cluster(&state, "c1");
        assert_eq!(c.children.len(), 2);
        assert_matches!(
            c.children.get("products:2"),
            Some(CallChild::Products(p)) if p.products[0].id == "42" && p.products[0].price == Some(59.0)
        );
        assert_matches!(
            c.children.get("todos:3"),
            Some(CallChild::Todos(t)) if t.todos[0].status.as_str() == "cancelled"
        );
    }

    #[test]
    fn tool_with_null_name_still_opens() {
        let state = fold(
            open_turn(),
            &[
                ev(EventType::LlmCallStart, 1, json!({"llm_call_id": "c1"})),
                ev(EventType::ToolStart, 2, json!({"tool_call_id": "tc1", "name": null})),
                ev(EventType::AssistantProducts, 3, json!({"items": [{"id": "p1"}]})),
                ev(EventType::ToolEnd, 4, json!({"tool_call_id": "tc1"})),
            ],
        );
        let t = tool(&state, "tc1");
        assert_eq!(t.name, "");
        assert_eq!(t.status, ItemStatus::Success);
        assert!(t.children.get("products:3").is_some());
        assert!(cluster(&state, "c1").children.get("products:3").is_none());
    }

    // ── flat items ──────────────────────────────────────────────────

    #[test]
    fn error_memory_skill_items() {
        let state = fold(
            open_turn(),
            &[
                ev(EventType::Error, 1, json!({})),
                ev(EventType::Error, 2, json!({"message": "quota"})),
                ev(EventType::MemoryProfileUpdated, 3, json!({})),
                ev(
                    EventType::SkillActivated,
                    4,
                    json!({"skill_id": "sizing", "skill_name": "Sizing", "trigger_type": "keyword"}),
                ),
            ],
        );
        assert_matches!(state.get("error:1"), Some(TimelineItem::Error(e)) if e.message == DEFAULT_ERROR_MESSAGE);
        assert_matches!(state.get("error:2"), Some(TimelineItem::Error(e)) if e.message == "quota");
        assert_matches!(state.get("memory:3"), Some(TimelineItem::MemoryEvent(m)) if m.kind == MemoryKind::ProfileUpdated);
        assert_matches!(state.get("skill:sizing:4"), Some(TimelineItem::SkillActivated(s)) if s.skill_name == "Sizing");
    }

    #[test]
    fn turn_scoped_events_need_active_turn() {
        let before = TimelineState::new();
        for kind in [EventType::LlmCallStart, EventType::Error, EventType::ToolStart] {
            let after = reduce_at(&before, &ev(kind, 1, json!({"name": "x"})), 5);
            assert_eq!(before, after, "{kind} applied without a turn");
        }
    }

    #[test]
    fn unknown_and_unrendered_events_are_noops() {
        let before = open_turn();
        let unknown: ChatEvent =
            serde_json::from_value(json!({"type": "agent.teleported", "seq": 1})).unwrap();
        assert_eq!(reduce_at(&before, &unknown, 5), before);
        for kind in [EventType::AgentRouted, EventType::ModelFallback, EventType::SkillLoaded] {
            assert_eq!(reduce_at(&before, &ev(kind, 2, json!({})), 5), before);
        }
    }

    // ── support ─────────────────────────────────────────────────────

    #[test]
    fn support_without_turn_uses_synthetic_turn() {
        let state = reduce_at(
            &TimelineState::new(),
            &ev(EventType::SupportHandoffStarted, 7, json!({"operator": "ana"})),
            42,
        );
        assert_matches!(
            state.get("support:7"),
            Some(TimelineItem::SupportEvent(s))
                if s.base.turn_id == "ws-42" && s.kind == SupportKind::HandoffStarted && s.operator.as_deref() == Some("ana")
        );
    }

    #[test]
    fn support_seq_zero_gets_generated_id() {
        let state = reduce_at(
            &TimelineState::new(),
            &ev(EventType::SupportHumanMessage, 0, json!({"content": "hi"})),
            1,
        );
        assert_eq!(state.len(), 1);
        assert!(state.items()[0].id().starts_with("support:"));
        assert_ne!(state.items()[0].id(), "support:0");
    }

    #[test]
    fn support_ping_is_noop() {
        let before = open_turn();
        assert_eq!(reduce_at(&before, &ev(EventType::SupportPing, 1, json!({})), 5), before);
    }

    #[test]
    fn support_moderation() {
        let state = add_user_message_at(&TimelineState::new(), "m1", "old", Vec::new(), 0);
        let state = add_user_message_at(&state, "m2", "gone", Vec::new(), 0);
        let state = fold(
            state,
            &[
                ev(
                    EventType::SupportMessageEdited,
                    1,
                    json!({"message_id": "m1", "content": "new", "operator": "ana", "created_at": "2026-01-01T00:00:00Z"}),
                ),
                ev(EventType::SupportMessageWithdrawn, 2, json!({"message_id": "m1", "operator": "ana"})),
                ev(EventType::SupportMessagesDeleted, 3, json!({"message_ids": ["m2"]})),
            ],
        );
        assert_eq!(state.len(), 1);
        match state.get("m1") {
            Some(TimelineItem::UserMessage(m)) => {
                assert_eq!(m.content, "new");
                assert_eq!(m.edited.as_ref().unwrap().by.as_deref(), Some("ana"));
                assert!(m.withdrawn.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    // ── purity ──────────────────────────────────────────────────────

    #[test]
    fn reduce_leaves_input_untouched() {
        let before = fold(
            open_turn(),
            &[
                ev(EventType::LlmCallStart, 1, json!({"llm_call_id": "c1"})),
                ev(EventType::AssistantDelta, 2, json!({"delta": "a"})),
            ],
        );
        let snapshot = before.clone();
        let _ = reduce_at(&before, &ev(EventType::AssistantDelta, 3, json!({"delta": "b"})), 9);
        assert_eq!(before, snapshot);
    }
}
