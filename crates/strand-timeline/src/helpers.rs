//! Reducer building blocks: id conventions, tool labels, and the
//! container operations the reducer applies to model and tool calls.

use crate::state::TimelineState;
use crate::types::{
    CallChild, CallClusterItem, ContentSubItem, DataSubItem, ReasoningSubItem, TimelineItem,
    ToolCallItem,
};

/// Display labels for well-known tools.
const TOOL_LABELS: &[(&str, &str)] = &[
    ("search_products", "Product search"),
    ("get_product_details", "Product details"),
    ("filter_by_price", "Price filter"),
    ("compare_products", "Compare products"),
    ("guide_user", "User guidance"),
    ("load_skill", "Load skill"),
];

/// Characters of the raw tool name used when no label is registered.
const FALLBACK_LABEL_CHARS: usize = 10;

/// Display label for a tool name.
pub fn tool_label(name: &str) -> String {
    TOOL_LABELS
        .iter()
        .find(|(tool, _)| *tool == name)
        .map_or_else(
            || name.chars().take(FALLBACK_LABEL_CHARS).collect(),
            |(_, label)| (*label).to_string(),
        )
}

/// Id of a turn's waiting placeholder.
pub fn waiting_id(turn_id: &str) -> String {
    format!("waiting-{turn_id}")
}

/// Fresh id for items whose event carries none.
pub fn generate_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

// ── Model call operations ───────────────────────────────────────────────────

impl CallClusterItem {
    fn child_id(&self, kind: &str) -> String {
        format!("{}:{kind}:{}", self.base.id, self.children.len())
    }

    /// Whether any reasoning sub-item is still open.
    pub fn has_open_reasoning(&self) -> bool {
        self.children
            .iter()
            .any(|c| c.as_reasoning().is_some_and(|r| r.is_open))
    }

    /// Close every open reasoning sub-item.
    pub fn close_reasoning(&mut self) {
        let open: Vec<String> = self
            .children
            .iter()
            .filter_map(|c| c.as_reasoning().filter(|r| r.is_open).map(|r| r.id.clone()))
            .collect();
        for id in open {
            if let Some(CallChild::Reasoning(r)) = self.children.get_mut(&id) {
                r.is_open = false;
            }
        }
    }

    /// Append reasoning text to the last reasoning sub-item while it is
    /// open, otherwise start a new open one.
    pub fn push_reasoning(&mut self, delta: &str, now: i64) {
        let last = self
            .children
            .last_where_mut(|c| matches!(c, CallChild::Reasoning(_)));
        if let Some(CallChild::Reasoning(r)) = last {
            if r.is_open {
                r.text.push_str(delta);
                return;
            }
        }
        let id = self.child_id("reasoning");
        self.children.push(CallChild::Reasoning(ReasoningSubItem {
            id,
            text: delta.to_owned(),
            is_open: true,
            ts: now,
        }));
    }

    /// Close the last reasoning sub-item, then append answer text to the
    /// last content sub-item or start one.
    pub fn push_content(&mut self, delta: &str, now: i64) {
        if let Some(CallChild::Reasoning(r)) = self
            .children
            .last_where_mut(|c| matches!(c, CallChild::Reasoning(_)))
        {
            r.is_open = false;
        }
        if let Some(CallChild::Content(c)) = self
            .children
            .last_where_mut(|c| matches!(c, CallChild::Content(_)))
        {
            c.text.push_str(delta);
            return;
        }
        let id = self.child_id("content");
        self.children.push(CallChild::Content(ContentSubItem {
            id,
            text: delta.to_owned(),
            ts: now,
        }));
    }

    /// When the call produced reasoning but no content, turn the reasoning
    /// into the answer: one content sub-item holding the concatenated text
    /// replaces every reasoning sub-item. Returns whether it did so.
    pub fn promote_reasoning(&mut self, now: i64) -> bool {
        let has_content = self.children.iter().any(|c| c.as_content().is_some());
        if has_content {
            return false;
        }
        let text: String = self
            .children
            .iter()
            .filter_map(CallChild::as_reasoning)
            .map(|r| r.text.as_str())
            .collect();
        let had_reasoning = self.children.iter().any(|c| c.as_reasoning().is_some());
        if !had_reasoning {
            return false;
        }
        self.children
            .retain(|c| !matches!(c, CallChild::Reasoning(_)));
        let id = self.child_id("content");
        self.children
            .push(CallChild::Content(ContentSubItem { id, text, ts: now }));
        true
    }
}

// ── State-level helpers ─────────────────────────────────────────────────────

impl TimelineState {
    /// The model call currently receiving deltas.
    pub fn current_cluster(&self) -> Option<&CallClusterItem> {
        let id = self.active_turn.current_call_id.as_deref()?;
        self.get(id).and_then(TimelineItem::as_cluster)
    }

    /// The tool call currently receiving data.
    pub fn current_tool_call(&self) -> Option<&ToolCallItem> {
        let id = self.active_turn.current_tool_call_id.as_deref()?;
        self.get(id).and_then(TimelineItem::as_tool_call)
    }

    /// Mutate the current model call. Returns `false` when there is none.
    pub(crate) fn update_current_cluster(&mut self, f: impl FnOnce(&mut CallClusterItem)) -> bool {
        if self.current_cluster().is_none() {
            return false;
        }
        let Some(id) = self.active_turn.current_call_id.clone() else {
            return false;
        };
        self.update(&id, |item| {
            if let Some(cluster) = item.as_cluster_mut() {
                f(cluster);
            }
        })
    }

    /// Attach a data sub-item to the current tool call when one is open,
    /// otherwise to the current model call.
    pub(crate) fn attach_data(&mut self, data: DataSubItem) -> bool {
        if let Some(tool_id) = self.active_turn.current_tool_call_id.clone() {
            return self.update(&tool_id, |item| {
                if let Some(tool) = item.as_tool_call_mut() {
                    tool.children.push(data);
                }
            });
        }
        self.update_current_cluster(|cluster| cluster.children.push(data.into()))
    }

    /// Drop a turn's waiting placeholder.
    pub(crate) fn remove_waiting(&mut self, turn_id: &str) -> bool {
        self.remove(&waiting_id(turn_id))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Children, ItemBase, ItemStatus};

    fn cluster() -> CallClusterItem {
        CallClusterItem {
            base: ItemBase::new("c1", "t1", 0),
            status: ItemStatus::Running,
            message_count: None,
            elapsed_ms: None,
            error: None,
            children: Children::default(),
        }
    }

    fn texts(c: &CallClusterItem) -> Vec<(&'static str, String)> {
        c.children
            .iter()
            .map(|child| match child {
                CallChild::Reasoning(r) => ("reasoning", r.text.clone()),
                CallChild::Content(c) => ("content", c.text.clone()),
                _ => ("data", String::new()),
            })
            .collect()
    }

    // ── labels ──────────────────────────────────────────────────────

    #[test]
    fn known_tool_label() {
        assert_eq!(tool_label("search_products"), "Product search");
        assert_eq!(tool_label("load_skill"), "Load skill");
    }

    #[test]
    fn unknown_tool_label_truncates() {
        assert_eq!(tool_label("fetch_weather_forecast"), "fetch_weat");
        assert_eq!(tool_label("ping"), "ping");
    }

    #[test]
    fn unknown_tool_label_truncates_on_chars() {
        assert_eq!(tool_label("ééééééééééééé"), "éééééééééé");
    }

    // ── deltas ──────────────────────────────────────────────────────

    #[test]
    fn reasoning_appends_while_open() {
        let mut c = cluster();
        c.push_reasoning("a", 1);
        c.push_reasoning("b", 2);
        assert_eq!(texts(&c), vec![("reasoning", "ab".to_string())]);
        assert!(c.has_open_reasoning());
    }

    #[test]
    fn reasoning_after_close_starts_new_item() {
        let mut c = cluster();
        c.push_reasoning("a", 1);
        c.push_content("x", 2);
        c.push_reasoning("b", 3);
        assert_eq!(
            texts(&c),
            vec![
                ("reasoning", "a".to_string()),
                ("content", "x".to_string()),
                ("reasoning", "b".to_string()),
            ]
        );
        assert!(c.children.index_is_consistent());
    }

    #[test]
    fn content_closes_reasoning() {
        let mut c = cluster();
        c.push_reasoning("think", 1);
        c.push_content("say", 2);
        assert!(!c.has_open_reasoning());
    }

    #[test]
    fn content_appends_to_last_content() {
        let mut c = cluster();
        c.push_content("Hel", 1);
        c.push_content("lo", 2);
        assert_eq!(texts(&c), vec![("content", "Hello".to_string())]);
    }

    // ── promotion ───────────────────────────────────────────────────

    #[test]
    fn promote_reasoning_only() {
        let mut c = cluster();
        c.push_reasoning("a", 1);
        c.close_reasoning();
        c.push_reasoning("b", 3);
        assert_eq!(c.children.len(), 2);
        assert!(c.promote_reasoning(4));
        assert_eq!(texts(&c), vec![("content", "ab".to_string())]);
        assert!(c.children.index_is_consistent());
    }

    #[test]
    fn promote_skips_when_content_exists() {
        let mut c = cluster();
        c.push_reasoning("a", 1);
        c.push_content("b", 2);
        assert!(!c.promote_reasoning(3));
        assert_eq!(c.children.len(), 2);
    }

    #[test]
    fn promote_skips_empty_cluster() {
        let mut c = cluster();
        assert!(!c.promote_reasoning(1));
        assert!(c.children.is_empty());
    }

    #[test]
    fn close_reasoning_closes_all() {
        let mut c = cluster();
        c.push_reasoning("a", 1);
        c.close_reasoning();
        assert!(!c.has_open_reasoning());
    }
}
