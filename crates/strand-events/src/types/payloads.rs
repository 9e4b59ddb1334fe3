//! Typed payloads for each known event type.
//!
//! Payloads travel as raw `serde_json::Value` on [`crate::ChatEvent`] and are
//! parsed on demand with [`crate::ChatEvent::payload_as`]. Every struct is
//! lenient: missing fields fall back to their defaults, and the fields the
//! timeline keys on tolerate `null` and loosely typed values, so a partially
//! filled payload still reduces.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;

// ── Shared data shapes ──────────────────────────────────────────────────────

/// A product card.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    /// Product id. Numeric ids are kept as their decimal text.
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    /// Display name.
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    /// Price, if known. Quoted prices are parsed.
    #[serde(
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<f64>,
    /// Image URL.
    #[serde(
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<String>,
    /// Detail page URL.
    #[serde(
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub url: Option<String>,
    /// Free-form description.
    #[serde(
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    /// Any additional vendor fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Todo item status. Statuses this crate does not know are carried
/// through as [`TodoStatus::Other`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TodoStatus {
    /// Not started.
    #[default]
    Pending,
    /// Being worked on.
    InProgress,
    /// Done.
    Completed,
    /// Any other status string.
    Other(String),
}

impl TodoStatus {
    /// Wire text.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for TodoStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => Self::Pending,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            _ => Self::Other(s),
        }
    }
}

impl From<TodoStatus> for String {
    fn from(status: TodoStatus) -> Self {
        match status {
            TodoStatus::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

/// A single todo entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoItem {
    /// Task text.
    #[serde(deserialize_with = "lenient::string")]
    pub content: String,
    /// Current status.
    #[serde(deserialize_with = "lenient::null_default")]
    pub status: TodoStatus,
}

// ── Stream level ────────────────────────────────────────────────────────────

/// `meta.start`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaStartPayload {
    /// Server id of the user message.
    pub user_message_id: Option<String>,
    /// Server id of the assistant message; becomes the canonical turn id.
    #[serde(deserialize_with = "lenient::opt_string")]
    pub assistant_message_id: Option<String>,
    /// Backend mode label.
    pub mode: Option<String>,
}

/// `assistant.final`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalPayload {
    /// Final answer text.
    pub content: Option<String>,
    /// Full reasoning text, if the backend sends it.
    pub reasoning: Option<String>,
    /// Products referenced by the answer.
    pub products: Option<Vec<Product>>,
}

/// `error`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorPayload {
    /// Human-readable message.
    pub message: Option<String>,
    /// Machine-readable code.
    pub code: Option<String>,
    /// Extra detail.
    pub detail: Option<Value>,
}

// ── Calls ───────────────────────────────────────────────────────────────────

/// `llm.call.start`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmCallStartPayload {
    /// Messages sent to the model.
    pub message_count: Option<u64>,
    /// Call id; generated client side when absent.
    #[serde(deserialize_with = "lenient::opt_string")]
    pub llm_call_id: Option<String>,
}

/// `llm.call.end`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmCallEndPayload {
    /// Call duration.
    pub elapsed_ms: Option<u64>,
    /// Messages sent to the model.
    pub message_count: Option<u64>,
    /// Error text when the call failed.
    pub error: Option<String>,
    /// Call id; the current call is used when absent.
    #[serde(deserialize_with = "lenient::opt_string")]
    pub llm_call_id: Option<String>,
}

/// `assistant.delta` and `assistant.reasoning.delta`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextDeltaPayload {
    /// Text fragment.
    #[serde(deserialize_with = "lenient::string")]
    pub delta: String,
}

// ── Tools ───────────────────────────────────────────────────────────────────

/// `tool.start`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolStartPayload {
    /// Tool call id; generated client side when absent.
    #[serde(deserialize_with = "lenient::opt_string")]
    pub tool_call_id: Option<String>,
    /// Tool name.
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    /// Tool arguments.
    pub input: Option<Value>,
}

/// `tool.end`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolEndPayload {
    /// Tool call id; the current tool call is used when absent.
    #[serde(deserialize_with = "lenient::opt_string")]
    pub tool_call_id: Option<String>,
    /// Tool name.
    pub name: Option<String>,
    /// `success`, `error` or `empty`.
    pub status: Option<String>,
    /// Result count.
    pub count: Option<u64>,
    /// Truncated output.
    pub output_preview: Option<Value>,
    /// Error text.
    pub error: Option<String>,
    /// Stored screenshot id.
    pub screenshot_id: Option<String>,
    /// Generic media reference.
    pub media_ref: Option<String>,
}

impl ToolEndPayload {
    /// Media reference carried by the payload, preferring `media_ref`.
    #[must_use]
    pub fn media(&self) -> Option<&str> {
        self.media_ref.as_deref().or(self.screenshot_id.as_deref())
    }
}

/// `tool.media_attached`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolMediaPayload {
    /// Target tool call.
    #[serde(deserialize_with = "lenient::string")]
    pub tool_call_id: String,
    /// Opaque media reference (e.g., a screenshot id).
    #[serde(deserialize_with = "lenient::string")]
    pub media_ref: String,
}

// ── Data ────────────────────────────────────────────────────────────────────

/// `assistant.products`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductsPayload {
    /// Product cards.
    #[serde(deserialize_with = "lenient::null_default")]
    pub items: Vec<Product>,
}

/// `assistant.todos`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TodosPayload {
    /// Todo list snapshot.
    #[serde(deserialize_with = "lenient::null_default")]
    pub todos: Vec<TodoItem>,
}

/// `context.summarized`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSummarizedPayload {
    /// Messages before summarization.
    pub messages_before: u64,
    /// Messages after summarization.
    pub messages_after: u64,
    /// Tokens before summarization.
    pub tokens_before: Option<u64>,
    /// Tokens after summarization.
    pub tokens_after: Option<u64>,
}

// ── Support ─────────────────────────────────────────────────────────────────

/// Shared payload of the `support.*` events.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportEventPayload {
    /// Support session id.
    pub session_id: Option<String>,
    /// Human agent id.
    pub agent_id: Option<String>,
    /// System notice text.
    pub message: Option<String>,
    /// Message body.
    pub content: Option<String>,
    /// Operator display name.
    pub operator: Option<String>,
    /// Referenced message id.
    #[serde(deserialize_with = "lenient::opt_string")]
    pub message_id: Option<String>,
    /// Referenced message ids (`support.messages_deleted`).
    #[serde(deserialize_with = "lenient::null_default")]
    pub message_ids: Vec<String>,
    /// When the action happened.
    pub created_at: Option<String>,
}

// ── Skills ──────────────────────────────────────────────────────────────────

/// How a skill was triggered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillTrigger {
    /// Keyword match.
    Keyword,
    /// Intent classification.
    Intent,
    /// Explicitly requested.
    #[default]
    Manual,
    /// A trigger kind this crate does not know.
    #[serde(other)]
    Other,
}

/// `skill.activated`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillActivatedPayload {
    /// Skill id.
    #[serde(deserialize_with = "lenient::string")]
    pub skill_id: String,
    /// Display name.
    #[serde(deserialize_with = "lenient::string")]
    pub skill_name: String,
    /// Trigger kind.
    #[serde(deserialize_with = "lenient::null_default")]
    pub trigger_type: SkillTrigger,
    /// Matched keyword.
    pub trigger_keyword: Option<String>,
}

/// `skill.loaded`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillLoadedPayload {
    /// Skill id.
    pub skill_id: String,
    /// Display name.
    pub skill_name: String,
    /// Skill category.
    pub skill_category: String,
}

// ── Supervisor ──────────────────────────────────────────────────────────────

/// `agent.routed`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentRoutedPayload {
    /// Routing agent.
    pub source_agent: String,
    /// Destination agent id.
    pub target_agent: String,
    /// Destination agent display name.
    pub target_agent_name: String,
    /// Routing reason.
    pub reason: Option<String>,
}

/// `agent.handoff`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentHandoffPayload {
    /// Handing-off agent.
    pub from_agent: String,
    /// Receiving agent id.
    pub to_agent: String,
    /// Receiving agent display name.
    pub to_agent_name: String,
    /// Delegated task.
    pub task: Option<String>,
}

/// `agent.complete`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentCompletePayload {
    /// Agent id.
    pub agent_id: String,
    /// Agent display name.
    pub agent_name: String,
    /// Run duration.
    pub elapsed_ms: Option<u64>,
    /// Outcome.
    pub status: Option<String>,
}

// ── Middleware ──────────────────────────────────────────────────────────────

/// `model.retry.start`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelRetryStartPayload {
    /// Attempt number.
    pub attempt: u32,
    /// Retry budget.
    pub max_retries: u32,
    /// Wait before the retry.
    pub delay_ms: u64,
    /// Error class.
    pub error_type: String,
    /// Error text.
    pub error_message: Option<String>,
}

/// `model.fallback`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelFallbackPayload {
    /// Failing model.
    pub from_model: String,
    /// Replacement model.
    pub to_model: String,
    /// Position in the fallback chain.
    pub fallback_index: u32,
    /// Length of the fallback chain.
    pub total_fallbacks: u32,
    /// Error class.
    pub error_type: String,
    /// Error text.
    pub error_message: Option<String>,
}

/// `context.edited`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextEditedPayload {
    /// Editing strategy.
    pub strategy: String,
    /// Tokens before.
    pub tokens_before: Option<u64>,
    /// Tokens after.
    pub tokens_after: Option<u64>,
    /// Tool results cleared.
    pub tools_cleared: u64,
    /// Tool results kept.
    pub kept: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_keeps_extra_fields() {
        let p: Product = serde_json::from_value(json!({
            "id": "p1", "name": "Lamp", "price": 12.5, "sku": "L-01"
        }))
        .unwrap();
        assert_eq!(p.price, Some(12.5));
        assert_eq!(p.extra.get("sku"), Some(&json!("L-01")));
    }

    #[test]
    fn product_tolerates_numeric_id_and_quoted_price() {
        let p: Product = serde_json::from_value(json!({
            "id": 42, "name": "Boot", "price": "59.00", "image_url": null
        }))
        .unwrap();
        assert_eq!(p.id, "42");
        assert_eq!(p.price, Some(59.0));
        assert_eq!(p.image_url, None);

        let p: Product = serde_json::from_value(json!({"id": "p2", "price": "call us"})).unwrap();
        assert_eq!(p.price, None);
    }

    #[test]
    fn todo_status_snake_case() {
        let t: TodoItem =
            serde_json::from_value(json!({"content": "ship", "status": "in_progress"})).unwrap();
        assert_eq!(t.status, TodoStatus::InProgress);
    }

    #[test]
    fn unknown_todo_status_is_kept() {
        let t: TodoItem =
            serde_json::from_value(json!({"content": "ship", "status": "cancelled"})).unwrap();
        assert_eq!(t.status, TodoStatus::Other("cancelled".into()));
        assert_eq!(serde_json::to_value(&t.status).unwrap(), json!("cancelled"));

        let t: TodoItem = serde_json::from_value(json!({"content": null, "status": null})).unwrap();
        assert_eq!(t, TodoItem::default());
    }

    #[test]
    fn null_strings_become_defaults() {
        let p: ToolStartPayload =
            serde_json::from_value(json!({"tool_call_id": "tc1", "name": null})).unwrap();
        assert_eq!(p.tool_call_id.as_deref(), Some("tc1"));
        assert_eq!(p.name, "");

        let p: ProductsPayload = serde_json::from_value(json!({"items": null})).unwrap();
        assert!(p.items.is_empty());
    }

    #[test]
    fn tool_end_media_prefers_media_ref() {
        let p = ToolEndPayload {
            screenshot_id: Some("shot".into()),
            media_ref: Some("ref".into()),
            ..Default::default()
        };
        assert_eq!(p.media(), Some("ref"));
        let p = ToolEndPayload {
            screenshot_id: Some("shot".into()),
            ..Default::default()
        };
        assert_eq!(p.media(), Some("shot"));
    }

    #[test]
    fn lenient_on_missing_fields() {
        let p: ContextSummarizedPayload = serde_json::from_value(json!({})).unwrap();
        assert_eq!(p.messages_before, 0);
        let p: SkillActivatedPayload =
            serde_json::from_value(json!({"skill_id": "s", "trigger_type": "intent"})).unwrap();
        assert_eq!(p.trigger_type, SkillTrigger::Intent);
        let p: SkillActivatedPayload =
            serde_json::from_value(json!({"skill_id": 7, "trigger_type": "schedule"})).unwrap();
        assert_eq!(p.skill_id, "7");
        assert_eq!(p.trigger_type, SkillTrigger::Other);
    }
}
