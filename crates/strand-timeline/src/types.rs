//! Timeline item model.
//!
//! A timeline is a flat list of top-level [`TimelineItem`]s. Model calls and
//! tool calls are containers: their sub-items live in a [`Children`] list
//! that keeps its own id index, mirroring the top-level one.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use strand_events::ImageAttachment;
use strand_events::history::CallToAction;
use strand_events::types::{Product, SkillTrigger, TodoItem};

/// Lifecycle status of a model call or tool call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Still executing.
    #[default]
    Running,
    /// Finished normally.
    Success,
    /// Finished with an error.
    Error,
    /// Finished with nothing to show (tool calls only).
    Empty,
}

impl ItemStatus {
    /// Parse a wire status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            "empty" => Some(Self::Empty),
            _ => None,
        }
    }
}

/// Fields shared by every top-level item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemBase {
    /// Unique id within the timeline.
    pub id: String,
    /// Turn the item belongs to.
    pub turn_id: String,
    /// Creation time in milliseconds.
    pub ts: i64,
}

impl ItemBase {
    /// Build a base.
    pub fn new(id: impl Into<String>, turn_id: impl Into<String>, ts: i64) -> Self {
        Self {
            id: id.into(),
            turn_id: turn_id.into(),
            ts,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sub-items
// ─────────────────────────────────────────────────────────────────────────────

/// Anything that can live in a [`Children`] list.
pub trait Keyed {
    /// Id used for lookup.
    fn key(&self) -> &str;
}

/// Streamed reasoning text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReasoningSubItem {
    /// Sub-item id.
    pub id: String,
    /// Accumulated text.
    pub text: String,
    /// Whether deltas may still be appended.
    pub is_open: bool,
    /// Creation time.
    pub ts: i64,
}

/// Streamed answer text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContentSubItem {
    /// Sub-item id.
    pub id: String,
    /// Accumulated text.
    pub text: String,
    /// Creation time.
    pub ts: i64,
}

/// Product cards.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductsSubItem {
    /// Sub-item id.
    pub id: String,
    /// Products, in display order.
    pub products: Vec<Product>,
    /// Creation time.
    pub ts: i64,
}

/// Todo list snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TodosSubItem {
    /// Sub-item id.
    pub id: String,
    /// Todos.
    pub todos: Vec<TodoItem>,
    /// Creation time.
    pub ts: i64,
}

/// Context summarization notice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContextSummarizedSubItem {
    /// Sub-item id.
    pub id: String,
    /// Messages before summarizing.
    pub messages_before: u64,
    /// Messages after summarizing.
    pub messages_after: u64,
    /// Tokens before summarizing.
    pub tokens_before: Option<u64>,
    /// Tokens after summarizing.
    pub tokens_after: Option<u64>,
    /// Creation time.
    pub ts: i64,
}

/// Sub-item of a model call.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallChild {
    /// Reasoning text.
    Reasoning(ReasoningSubItem),
    /// Answer text.
    Content(ContentSubItem),
    /// Product cards.
    Products(ProductsSubItem),
    /// Todo list.
    Todos(TodosSubItem),
    /// Summarization notice.
    ContextSummarized(ContextSummarizedSubItem),
}

impl CallChild {
    /// The reasoning sub-item, if this is one.
    pub fn as_reasoning(&self) -> Option<&ReasoningSubItem> {
        match self {
            Self::Reasoning(r) => Some(r),
            _ => None,
        }
    }

    /// The content sub-item, if this is one.
    pub fn as_content(&self) -> Option<&ContentSubItem> {
        match self {
            Self::Content(c) => Some(c),
            _ => None,
        }
    }
}

impl Keyed for CallChild {
    fn key(&self) -> &str {
        match self {
            Self::Reasoning(s) => &s.id,
            Self::Content(s) => &s.id,
            Self::Products(s) => &s.id,
            Self::Todos(s) => &s.id,
            Self::ContextSummarized(s) => &s.id,
        }
    }
}

/// Data sub-item, attachable to a tool call or a model call.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataSubItem {
    /// Product cards.
    Products(ProductsSubItem),
    /// Todo list.
    Todos(TodosSubItem),
    /// Summarization notice.
    ContextSummarized(ContextSummarizedSubItem),
}

impl Keyed for DataSubItem {
    fn key(&self) -> &str {
        match self {
            Self::Products(s) => &s.id,
            Self::Todos(s) => &s.id,
            Self::ContextSummarized(s) => &s.id,
        }
    }
}

impl From<DataSubItem> for CallChild {
    fn from(data: DataSubItem) -> Self {
        match data {
            DataSubItem::Products(s) => Self::Products(s),
            DataSubItem::Todos(s) => Self::Todos(s),
            DataSubItem::ContextSummarized(s) => Self::ContextSummarized(s),
        }
    }
}

/// Ordered sub-items with an id index kept in step with positions.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Children<C> {
    #[serde(rename = "children")]
    items: Vec<C>,
    #[serde(rename = "child_index_by_id")]
    index_by_id: BTreeMap<String, usize>,
}

impl<C> Default for Children<C> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index_by_id: BTreeMap::new(),
        }
    }
}

impl<C: Keyed> Children<C> {
    /// Build from a list, indexing every entry. Later duplicates replace
    /// earlier ones in place.
    pub fn from_vec(items: Vec<C>) -> Self {
        let mut children = Self::default();
        for item in items {
            children.push(item);
        }
        children
    }

    /// Append a sub-item, or replace the one already holding its id.
    pub fn push(&mut self, child: C) {
        if let Some(&idx) = self.index_by_id.get(child.key()) {
            self.items[idx] = child;
            return;
        }
        let _ = self
            .index_by_id
            .insert(child.key().to_owned(), self.items.len());
        self.items.push(child);
    }

    /// Look up a sub-item by id.
    pub fn get(&self, id: &str) -> Option<&C> {
        self.index_by_id.get(id).map(|&idx| &self.items[idx])
    }

    /// Mutable lookup by id. The id itself must not be changed.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut C> {
        let idx = *self.index_by_id.get(id)?;
        self.items.get_mut(idx)
    }

    /// Last sub-item satisfying `pred`, scanning from the tail.
    pub fn last_where_mut(&mut self, pred: impl Fn(&C) -> bool) -> Option<&mut C> {
        self.items.iter_mut().rev().find(|c| pred(c))
    }

    /// Keep only sub-items satisfying `pred`, then reindex.
    pub fn retain(&mut self, pred: impl FnMut(&C) -> bool) {
        self.items.retain(pred);
        self.index_by_id = self
            .items
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.key().to_owned(), idx))
            .collect();
    }

    /// Whether the index exactly mirrors positions.
    pub fn index_is_consistent(&self) -> bool {
        self.index_by_id.len() == self.items.len()
            && self
                .items
                .iter()
                .enumerate()
                .all(|(idx, c)| self.index_by_id.get(c.key()) == Some(&idx))
    }
}

impl<C> Children<C> {
    /// Sub-items in order.
    pub fn as_slice(&self) -> &[C] {
        &self.items
    }

    /// Iterate in order.
    pub fn iter(&self) -> std::slice::Iter<'_, C> {
        self.items.iter()
    }

    /// Number of sub-items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no sub-items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Top-level items
// ─────────────────────────────────────────────────────────────────────────────

/// Who moderated a message and when.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Moderation {
    /// Server timestamp of the action.
    pub at: Option<String>,
    /// Operator who performed it.
    pub by: Option<String>,
}

/// A message sent by the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserMessageItem {
    /// Common fields.
    #[serde(flatten)]
    pub base: ItemBase,
    /// Message text.
    pub content: String,
    /// Attached images.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageAttachment>,
    /// Set when an operator withdrew the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawn: Option<Moderation>,
    /// Set when an operator edited the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited: Option<Moderation>,
}

/// A greeting shown before the first user message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GreetingItem {
    /// Common fields.
    #[serde(flatten)]
    pub base: ItemBase,
    /// Heading.
    pub title: Option<String>,
    /// Sub-heading.
    pub subtitle: Option<String>,
    /// Body text.
    pub body: String,
    /// Call-to-action button.
    pub cta: Option<CallToAction>,
    /// Delay before showing.
    pub delay_ms: u64,
    /// Delivery channel.
    pub channel: String,
}

/// Placeholder shown until the first model call starts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WaitingItem {
    /// Common fields.
    #[serde(flatten)]
    pub base: ItemBase,
}

/// One model invocation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CallClusterItem {
    /// Common fields.
    #[serde(flatten)]
    pub base: ItemBase,
    /// Lifecycle status.
    pub status: ItemStatus,
    /// Messages sent to the model.
    pub message_count: Option<u64>,
    /// Call duration reported by the server.
    pub elapsed_ms: Option<u64>,
    /// Error reported at call end.
    pub error: Option<String>,
    /// Reasoning, content and data sub-items.
    #[serde(flatten)]
    pub children: Children<CallChild>,
}

/// One tool execution.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolCallItem {
    /// Common fields.
    #[serde(flatten)]
    pub base: ItemBase,
    /// Tool name.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Lifecycle status.
    pub status: ItemStatus,
    /// Tool input.
    pub input: Option<Value>,
    /// Result count.
    pub count: Option<u64>,
    /// Duration measured from `started_at_ms`.
    pub elapsed_ms: Option<u64>,
    /// Error reported at tool end.
    pub error: Option<String>,
    /// Output excerpt.
    pub output_preview: Option<Value>,
    /// Screenshot or other media attached to the call.
    pub media_ref: Option<String>,
    /// Local time the call started.
    pub started_at_ms: i64,
    /// Data sub-items produced while the tool ran.
    #[serde(flatten)]
    pub children: Children<DataSubItem>,
}

/// An application error reported by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorItem {
    /// Common fields.
    #[serde(flatten)]
    pub base: ItemBase,
    /// Error text.
    pub message: String,
}

/// End of a turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FinalItem {
    /// Common fields.
    #[serde(flatten)]
    pub base: ItemBase,
    /// Final answer as sent by the server.
    pub content: Option<String>,
}

/// Memory post-processing stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MemoryKind {
    /// Extraction started.
    #[serde(rename = "extraction.start")]
    ExtractionStart,
    /// Extraction completed.
    #[serde(rename = "extraction.complete")]
    ExtractionComplete,
    /// Profile updated.
    #[serde(rename = "profile.updated")]
    ProfileUpdated,
}

/// Memory post-processing notice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemoryEventItem {
    /// Common fields.
    #[serde(flatten)]
    pub base: ItemBase,
    /// Stage.
    pub kind: MemoryKind,
}

/// Human support notice kinds that appear on the timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportKind {
    /// A human agent took over.
    HandoffStarted,
    /// The human agent handed back.
    HandoffEnded,
    /// A human agent sent a message.
    HumanMessage,
    /// The conversation switched to human mode.
    HumanMode,
    /// A human agent joined.
    Connected,
}

/// Human support notice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SupportEventItem {
    /// Common fields.
    #[serde(flatten)]
    pub base: ItemBase,
    /// Notice kind.
    pub kind: SupportKind,
    /// Notice text.
    pub message: Option<String>,
    /// Message body, for human messages.
    pub content: Option<String>,
    /// Operator name.
    pub operator: Option<String>,
    /// Related message id.
    pub message_id: Option<String>,
}

/// A skill was activated during the turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkillActivatedItem {
    /// Common fields.
    #[serde(flatten)]
    pub base: ItemBase,
    /// Skill id.
    pub skill_id: String,
    /// Skill display name.
    pub skill_name: String,
    /// What triggered it.
    pub trigger_type: SkillTrigger,
    /// Matched keyword.
    pub trigger_keyword: Option<String>,
}

/// Item inserted by a custom reducer for an application-specific event.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CustomItem {
    /// Common fields.
    #[serde(flatten)]
    pub base: ItemBase,
    /// Application-defined kind.
    pub kind: String,
    /// Application-defined data.
    pub data: Value,
}

/// A top-level timeline entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum TimelineItem {
    /// User message.
    #[serde(rename = "user.message")]
    UserMessage(UserMessageItem),
    /// Greeting.
    #[serde(rename = "greeting")]
    Greeting(GreetingItem),
    /// Waiting placeholder.
    #[serde(rename = "waiting")]
    Waiting(WaitingItem),
    /// Model call.
    #[serde(rename = "llm.call.cluster")]
    CallCluster(CallClusterItem),
    /// Tool call.
    #[serde(rename = "tool.call")]
    ToolCall(ToolCallItem),
    /// Error.
    #[serde(rename = "error")]
    Error(ErrorItem),
    /// Final answer marker.
    #[serde(rename = "final")]
    Final(FinalItem),
    /// Memory notice.
    #[serde(rename = "memory.event")]
    MemoryEvent(MemoryEventItem),
    /// Support notice.
    #[serde(rename = "support.event")]
    SupportEvent(SupportEventItem),
    /// Skill activation.
    #[serde(rename = "skill.activated")]
    SkillActivated(SkillActivatedItem),
    /// Application-specific item.
    #[serde(rename = "custom")]
    Custom(CustomItem),
}

macro_rules! each_variant {
    ($value:expr, $item:ident => $body:expr) => {
        match $value {
            TimelineItem::UserMessage($item) => $body,
            TimelineItem::Greeting($item) => $body,
            TimelineItem::Waiting($item) => $body,
            TimelineItem::CallCluster($item) => $body,
            TimelineItem::ToolCall($item) => $body,
            TimelineItem::Error($item) => $body,
            TimelineItem::Final($item) => $body,
            TimelineItem::MemoryEvent($item) => $body,
            TimelineItem::SupportEvent($item) => $body,
            TimelineItem::SkillActivated($item) => $body,
            TimelineItem::Custom($item) => $body,
        }
    };
}

macro_rules! impl_into_item {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for TimelineItem {
                fn from(item: $ty) -> Self {
                    Self::$variant(item)
                }
            }
        )*
    };
}

impl_into_item! {
    UserMessageItem => UserMessage,
    GreetingItem => Greeting,
    WaitingItem => Waiting,
    CallClusterItem => CallCluster,
    ToolCallItem => ToolCall,
    ErrorItem => Error,
    FinalItem => Final,
    MemoryEventItem => MemoryEvent,
    SupportEventItem => SupportEvent,
    SkillActivatedItem => SkillActivated,
    CustomItem => Custom,
}

impl TimelineItem {
    /// Common fields.
    pub fn base(&self) -> &ItemBase {
        each_variant!(self, item => &item.base)
    }

    /// Mutable common fields.
    pub fn base_mut(&mut self) -> &mut ItemBase {
        each_variant!(self, item => &mut item.base)
    }

    /// Item id.
    pub fn id(&self) -> &str {
        &self.base().id
    }

    /// Owning turn.
    pub fn turn_id(&self) -> &str {
        &self.base().turn_id
    }

    /// Wire tag of the variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::UserMessage(_) => "user.message",
            Self::Greeting(_) => "greeting",
            Self::Waiting(_) => "waiting",
            Self::CallCluster(_) => "llm.call.cluster",
            Self::ToolCall(_) => "tool.call",
            Self::Error(_) => "error",
            Self::Final(_) => "final",
            Self::MemoryEvent(_) => "memory.event",
            Self::SupportEvent(_) => "support.event",
            Self::SkillActivated(_) => "skill.activated",
            Self::Custom(_) => "custom",
        }
    }

    /// The model call, if this is one.
    pub fn as_cluster(&self) -> Option<&CallClusterItem> {
        match self {
            Self::CallCluster(c) => Some(c),
            _ => None,
        }
    }

    /// Mutable model call.
    pub fn as_cluster_mut(&mut self) -> Option<&mut CallClusterItem> {
        match self {
            Self::CallCluster(c) => Some(c),
            _ => None,
        }
    }

    /// The tool call, if this is one.
    pub fn as_tool_call(&self) -> Option<&ToolCallItem> {
        match self {
            Self::ToolCall(t) => Some(t),
            _ => None,
        }
    }

    /// Mutable tool call.
    pub fn as_tool_call_mut(&mut self) -> Option<&mut ToolCallItem> {
        match self {
            Self::ToolCall(t) => Some(t),
            _ => None,
        }
    }

    /// Mutable user message.
    pub fn as_user_message_mut(&mut self) -> Option<&mut UserMessageItem> {
        match self {
            Self::UserMessage(m) => Some(m),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
