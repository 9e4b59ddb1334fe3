//! Cold start: rebuild a timeline from persisted history.

use strand_events::history::ExtraMetadata;
use strand_events::{HistoryMessage, HistoryRole};
use tracing::trace;

use crate::actions::{Greeting, add_greeting_at, add_user_message_at};
use crate::state::TimelineState;
use crate::types::{
    CallChild, CallClusterItem, Children, ContentSubItem, ItemBase, ItemStatus, ProductsSubItem,
};

/// Convert history into a state with no active turn.
pub fn history_to_timeline(messages: &[HistoryMessage]) -> TimelineState {
    history_to_timeline_at(messages, strand_core::time::now_ms())
}

/// [`history_to_timeline`] stamping every item with `now_ms`.
pub fn history_to_timeline_at(messages: &[HistoryMessage], now_ms: i64) -> TimelineState {
    messages
        .iter()
        .fold(TimelineState::new(), |state, msg| match msg.role {
            HistoryRole::User => add_user_message_at(&state, &msg.id, &msg.content, Vec::new(), now_ms),
            HistoryRole::System if msg.is_greeting() => {
                add_greeting_at(&state, greeting(msg), now_ms)
            }
            HistoryRole::Assistant => {
                let mut next = state;
                next.insert(answer_cluster(msg, now_ms));
                next
            }
            HistoryRole::System => {
                trace!(id = %msg.id, "skipping system message");
                state
            }
        })
}

fn greeting(msg: &HistoryMessage) -> Greeting {
    let meta = msg.extra_metadata.clone().unwrap_or_default();
    let ExtraMetadata {
        greeting_config,
        cta,
        delay_ms,
        channel,
    } = meta;
    let config = greeting_config.unwrap_or_default();
    Greeting {
        id: msg.id.clone(),
        title: config.title,
        subtitle: config.subtitle,
        body: config
            .body
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| msg.content.clone()),
        cta,
        delay_ms,
        channel,
    }
}

fn answer_cluster(msg: &HistoryMessage, now_ms: i64) -> CallClusterItem {
    let mut children = vec![CallChild::Content(ContentSubItem {
        id: format!("{}-content", msg.id),
        text: msg.content.clone(),
        ts: now_ms,
    })];
    if let Some(products) = msg.products.as_ref().filter(|p| !p.is_empty()) {
        children.push(CallChild::Products(ProductsSubItem {
            id: format!("{}-products", msg.id),
            products: products.clone(),
            ts: now_ms,
        }));
    }
    CallClusterItem {
        base: ItemBase::new(msg.id.clone(), msg.id.clone(), now_ms),
        status: ItemStatus::Success,
        message_count: None,
        elapsed_ms: None,
        error: None,
        children: Children::from_vec(children),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ActiveTurn;
    use crate::types::TimelineItem;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn messages(value: serde_json::Value) -> Vec<HistoryMessage> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn converts_each_role() {
        let history = messages(json!([
            {"id": "g1", "role": "system", "message_type": "greeting", "content": "Hello!",
             "extra_metadata": {"greeting_config": {"title": "Hi"}, "delay_ms": 300}},
            {"id": "u1", "role": "user", "content": "boots?"},
            {"id": "a1", "role": "assistant", "content": "Here you go",
             "products": [{"id": "p1", "name": "Boot"}]},
            {"id": "s1", "role": "system", "content": "internal note"},
        ]));
        let state = history_to_timeline_at(&history, 5);

        let ids: Vec<&str> = state.iter().map(TimelineItem::id).collect();
        assert_eq!(ids, ["g1", "u1", "a1"]);
        assert_eq!(state.active_turn, ActiveTurn::default());
        assert!(state.index_is_consistent());

        match state.get("g1") {
            Some(TimelineItem::Greeting(g)) => {
                assert_eq!(g.body, "Hello!");
                assert_eq!(g.title.as_deref(), Some("Hi"));
                assert_eq!(g.delay_ms, 300);
                assert_eq!(g.channel, "web");
            }
            other => panic!("unexpected {other:?}"),
        }

        let cluster = state.get("a1").and_then(TimelineItem::as_cluster).unwrap();
        assert_eq!(cluster.status, ItemStatus::Success);
        assert_matches!(cluster.children.get("a1-content"), Some(CallChild::Content(c)) if c.text == "Here you go");
        assert_matches!(cluster.children.get("a1-products"), Some(CallChild::Products(p)) if p.products.len() == 1);
    }

    #[test]
    fn answer_without_products_has_only_content() {
        let history = messages(json!([
            {"id": "a1", "role": "assistant", "content": "ok", "products": []},
        ]));
        let state = history_to_timeline_at(&history, 0);
        let cluster = state.get("a1").and_then(TimelineItem::as_cluster).unwrap();
        assert_eq!(cluster.children.len(), 1);
    }

    #[test]
    fn greeting_config_body_wins() {
        let history = messages(json!([
            {"id": "g1", "role": "system", "message_type": "greeting", "content": "fallback",
             "extra_metadata": {"greeting_config": {"body": "configured"}, "channel": "app"}},
        ]));
        let state = history_to_timeline_at(&history, 0);
        assert_matches!(
            state.get("g1"),
            Some(TimelineItem::Greeting(g)) if g.body == "configured" && g.channel == "app"
        );
    }

    #[test]
    fn conversion_is_deterministic() {
        let history = messages(json!([
            {"id": "u1", "role": "user", "content": "a"},
            {"id": "a1", "role": "assistant", "content": "b"},
        ]));
        assert_eq!(history_to_timeline_at(&history, 1), history_to_timeline_at(&history, 1));
    }
}
