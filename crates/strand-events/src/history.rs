//! Persisted conversation history, as supplied by the history collaborator.

use serde::{Deserialize, Serialize};

use crate::types::Product;

/// Author of a history message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    /// End user.
    User,
    /// Assistant answer.
    Assistant,
    /// System-generated message (e.g., greeting).
    System,
}

/// Call-to-action button.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallToAction {
    /// Button text.
    pub text: String,
    /// Message sent when pressed.
    pub payload: String,
}

/// Greeting layout.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreetingConfig {
    /// Heading.
    pub title: Option<String>,
    /// Sub-heading.
    pub subtitle: Option<String>,
    /// Body text.
    pub body: Option<String>,
}

/// Extra metadata stored with a history message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtraMetadata {
    /// Greeting layout.
    pub greeting_config: Option<GreetingConfig>,
    /// Call-to-action button.
    pub cta: Option<CallToAction>,
    /// Delay before showing the greeting.
    pub delay_ms: Option<u64>,
    /// Delivery channel.
    pub channel: Option<String>,
}

/// One persisted message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Message id.
    pub id: String,
    /// Author.
    pub role: HistoryRole,
    /// Text content.
    #[serde(default)]
    pub content: String,
    /// Products shown with an assistant answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<Product>>,
    /// Message subtype (`"greeting"` for system greetings).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// Extra metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_metadata: Option<ExtraMetadata>,
}

impl HistoryMessage {
    /// Whether this is a system greeting.
    pub fn is_greeting(&self) -> bool {
        self.role == HistoryRole::System && self.message_type.as_deref() == Some("greeting")
    }
}
