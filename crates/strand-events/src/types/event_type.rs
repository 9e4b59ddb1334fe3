//! The [`EventType`] enum: every known stream event discriminator.
//!
//! Every variant has an exact `#[serde(rename)]` matching the dot-separated
//! string the agent backend emits (e.g., `"llm.call.start"`). Types the
//! backend adds later are not rejected; see [`crate::EventKind::Unknown`].
//!
//! [`EventType::category()`] groups the variants the way the reducer
//! dispatches on them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// All known stream event types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    // -- Stream level --
    /// Turn started; carries the server-assigned message ids.
    #[serde(rename = "meta.start")]
    MetaStart,
    /// Turn finished with the final assistant answer.
    #[serde(rename = "assistant.final")]
    AssistantFinal,
    /// Application error reported by the server.
    #[serde(rename = "error")]
    Error,

    // -- Call boundary --
    /// A model invocation began.
    #[serde(rename = "llm.call.start")]
    LlmCallStart,
    /// A model invocation finished.
    #[serde(rename = "llm.call.end")]
    LlmCallEnd,

    // -- Call internal --
    /// Reasoning text delta.
    #[serde(rename = "assistant.reasoning.delta")]
    AssistantReasoningDelta,
    /// Answer content delta.
    #[serde(rename = "assistant.delta")]
    AssistantDelta,

    // -- Tool calls --
    /// Tool execution began.
    #[serde(rename = "tool.start")]
    ToolStart,
    /// Tool execution finished.
    #[serde(rename = "tool.end")]
    ToolEnd,
    /// Media reference attached to a tool call after the fact.
    #[serde(rename = "tool.media_attached")]
    ToolMediaAttached,

    // -- Data --
    /// Product cards.
    #[serde(rename = "assistant.products")]
    AssistantProducts,
    /// Todo list snapshot.
    #[serde(rename = "assistant.todos")]
    AssistantTodos,
    /// Conversation context was summarized.
    #[serde(rename = "context.summarized")]
    ContextSummarized,
    /// Conversation context was trimmed.
    #[serde(rename = "context.trimmed")]
    ContextTrimmed,

    // -- Post-processing --
    /// Memory extraction started.
    #[serde(rename = "memory.extraction.start")]
    MemoryExtractionStart,
    /// Memory extraction completed.
    #[serde(rename = "memory.extraction.complete")]
    MemoryExtractionComplete,
    /// User profile updated from memory.
    #[serde(rename = "memory.profile.updated")]
    MemoryProfileUpdated,

    // -- Support (not tied to a turn) --
    /// Human agent takeover started.
    #[serde(rename = "support.handoff_started")]
    SupportHandoffStarted,
    /// Human agent takeover ended.
    #[serde(rename = "support.handoff_ended")]
    SupportHandoffEnded,
    /// Message written by a human agent.
    #[serde(rename = "support.human_message")]
    SupportHumanMessage,
    /// Conversation switched to human mode.
    #[serde(rename = "support.human_mode")]
    SupportHumanMode,
    /// A human agent connected.
    #[serde(rename = "support.connected")]
    SupportConnected,
    /// Support keep-alive.
    #[serde(rename = "support.ping")]
    SupportPing,
    /// A user message was withdrawn.
    #[serde(rename = "support.message_withdrawn")]
    SupportMessageWithdrawn,
    /// A user message was edited.
    #[serde(rename = "support.message_edited")]
    SupportMessageEdited,
    /// Messages were deleted.
    #[serde(rename = "support.messages_deleted")]
    SupportMessagesDeleted,

    // -- Supervisor --
    /// Request routed to a sub-agent.
    #[serde(rename = "agent.routed")]
    AgentRouted,
    /// Work handed off between agents.
    #[serde(rename = "agent.handoff")]
    AgentHandoff,
    /// Sub-agent finished.
    #[serde(rename = "agent.complete")]
    AgentComplete,

    // -- Skills --
    /// Skill activated for this turn.
    #[serde(rename = "skill.activated")]
    SkillActivated,
    /// Skill definition loaded.
    #[serde(rename = "skill.loaded")]
    SkillLoaded,

    // -- Middleware --
    /// Model call retry scheduled.
    #[serde(rename = "model.retry.start")]
    ModelRetryStart,
    /// Model call retries exhausted.
    #[serde(rename = "model.retry.failed")]
    ModelRetryFailed,
    /// Fell back to another model.
    #[serde(rename = "model.fallback")]
    ModelFallback,
    /// Model call limit exceeded.
    #[serde(rename = "model.call_limit.exceeded")]
    ModelCallLimitExceeded,
    /// Context edited by middleware.
    #[serde(rename = "context.edited")]
    ContextEdited,
}

/// Every [`EventType`] variant, in declaration order.
pub const ALL_EVENT_TYPES: [EventType; 36] = [
    EventType::MetaStart,
    EventType::AssistantFinal,
    EventType::Error,
    EventType::LlmCallStart,
    EventType::LlmCallEnd,
    EventType::AssistantReasoningDelta,
    EventType::AssistantDelta,
    EventType::ToolStart,
    EventType::ToolEnd,
    EventType::ToolMediaAttached,
    EventType::AssistantProducts,
    EventType::AssistantTodos,
    EventType::ContextSummarized,
    EventType::ContextTrimmed,
    EventType::MemoryExtractionStart,
    EventType::MemoryExtractionComplete,
    EventType::MemoryProfileUpdated,
    EventType::SupportHandoffStarted,
    EventType::SupportHandoffEnded,
    EventType::SupportHumanMessage,
    EventType::SupportHumanMode,
    EventType::SupportConnected,
    EventType::SupportPing,
    EventType::SupportMessageWithdrawn,
    EventType::SupportMessageEdited,
    EventType::SupportMessagesDeleted,
    EventType::AgentRouted,
    EventType::AgentHandoff,
    EventType::AgentComplete,
    EventType::SkillActivated,
    EventType::SkillLoaded,
    EventType::ModelRetryStart,
    EventType::ModelRetryFailed,
    EventType::ModelFallback,
    EventType::ModelCallLimitExceeded,
    EventType::ContextEdited,
];

/// Coarse grouping of event types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// Turn start, final answer, application error.
    Stream,
    /// Model invocation start/end.
    CallBoundary,
    /// Deltas valid only inside an open call.
    CallInternal,
    /// Tool call lifecycle.
    Tool,
    /// Products, todos, context summaries.
    Data,
    /// Memory extraction after the answer.
    PostProcess,
    /// Human hand-off and presence.
    Support,
    /// Multi-agent routing.
    Supervisor,
    /// Skill activation.
    Skill,
    /// Retry, fallback, and limit notices.
    Middleware,
}

impl EventType {
    /// Return the canonical string representation (e.g., `"meta.start"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MetaStart => "meta.start",
            Self::AssistantFinal => "assistant.final",
            Self::Error => "error",
            Self::LlmCallStart => "llm.call.start",
            Self::LlmCallEnd => "llm.call.end",
            Self::AssistantReasoningDelta => "assistant.reasoning.delta",
            Self::AssistantDelta => "assistant.delta",
            Self::ToolStart => "tool.start",
            Self::ToolEnd => "tool.end",
            Self::ToolMediaAttached => "tool.media_attached",
            Self::AssistantProducts => "assistant.products",
            Self::AssistantTodos => "assistant.todos",
            Self::ContextSummarized => "context.summarized",
            Self::ContextTrimmed => "context.trimmed",
            Self::MemoryExtractionStart => "memory.extraction.start",
            Self::MemoryExtractionComplete => "memory.extraction.complete",
            Self::MemoryProfileUpdated => "memory.profile.updated",
            Self::SupportHandoffStarted => "support.handoff_started",
            Self::SupportHandoffEnded => "support.handoff_ended",
            Self::SupportHumanMessage => "support.human_message",
            Self::SupportHumanMode => "support.human_mode",
            Self::SupportConnected => "support.connected",
            Self::SupportPing => "support.ping",
            Self::SupportMessageWithdrawn => "support.message_withdrawn",
            Self::SupportMessageEdited => "support.message_edited",
            Self::SupportMessagesDeleted => "support.messages_deleted",
            Self::AgentRouted => "agent.routed",
            Self::AgentHandoff => "agent.handoff",
            Self::AgentComplete => "agent.complete",
            Self::SkillActivated => "skill.activated",
            Self::SkillLoaded => "skill.loaded",
            Self::ModelRetryStart => "model.retry.start",
            Self::ModelRetryFailed => "model.retry.failed",
            Self::ModelFallback => "model.fallback",
            Self::ModelCallLimitExceeded => "model.call_limit.exceeded",
            Self::ContextEdited => "context.edited",
        }
    }

    /// The category this type belongs to.
    #[must_use]
    pub fn category(self) -> EventCategory {
        match self {
            Self::MetaStart | Self::AssistantFinal | Self::Error => EventCategory::Stream,
            Self::LlmCallStart | Self::LlmCallEnd => EventCategory::CallBoundary,
            Self::AssistantReasoningDelta | Self::AssistantDelta => EventCategory::CallInternal,
            Self::ToolStart | Self::ToolEnd | Self::ToolMediaAttached => EventCategory::Tool,
            Self::AssistantProducts
            | Self::AssistantTodos
            | Self::ContextSummarized
            | Self::ContextTrimmed => EventCategory::Data,
            Self::MemoryExtractionStart
            | Self::MemoryExtractionComplete
            | Self::MemoryProfileUpdated => EventCategory::PostProcess,
            Self::SupportHandoffStarted
            | Self::SupportHandoffEnded
            | Self::SupportHumanMessage
            | Self::SupportHumanMode
            | Self::SupportConnected
            | Self::SupportPing
            | Self::SupportMessageWithdrawn
            | Self::SupportMessageEdited
            | Self::SupportMessagesDeleted => EventCategory::Support,
            Self::AgentRouted | Self::AgentHandoff | Self::AgentComplete => {
                EventCategory::Supervisor
            }
            Self::SkillActivated | Self::SkillLoaded => EventCategory::Skill,
            Self::ModelRetryStart
            | Self::ModelRetryFailed
            | Self::ModelFallback
            | Self::ModelCallLimitExceeded
            | Self::ContextEdited => EventCategory::Middleware,
        }
    }

    /// Whether this is a delta that only makes sense inside an open call.
    #[must_use]
    pub fn is_call_internal(self) -> bool {
        self.category() == EventCategory::CallInternal
    }

    /// Whether this is a `support.*` event.
    #[must_use]
    pub fn is_support(self) -> bool {
        self.category() == EventCategory::Support
    }

    /// Whether the reducer requires an active turn to apply this type.
    ///
    /// Support events and late media attachments apply between turns.
    #[must_use]
    pub fn is_turn_scoped(self) -> bool {
        !self.is_support() && self != Self::ToolMediaAttached
    }

    /// The domain prefix (e.g., `"llm"`, `"support"`, `"error"`).
    #[must_use]
    pub fn domain(self) -> &'static str {
        let s = self.as_str();
        s.split('.').next().unwrap_or(s)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // The `#[serde(rename)]` attributes are the source of truth.
        serde_json::from_value(serde_json::Value::String(s.to_owned()))
            .map_err(|_| format!("unknown event type: {s}"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
