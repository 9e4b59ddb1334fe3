//! Timeline state: ordered items, id index, and the active turn.
//!
//! Items sit behind [`Arc`], so cloning a state is cheap and a mutation
//! copies only the item it touches (`Arc::make_mut`). The id index is shared
//! the same way and is only copied when positions change.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::types::TimelineItem;

/// Bookkeeping for the turn currently being streamed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ActiveTurn {
    /// Turn id, `None` when no turn is open.
    pub turn_id: Option<String>,
    /// Model call receiving deltas.
    pub current_call_id: Option<String>,
    /// Tool call receiving data sub-items.
    pub current_tool_call_id: Option<String>,
    /// True while the turn's stream is open.
    pub is_streaming: bool,
}

impl ActiveTurn {
    /// A freshly opened, streaming turn.
    pub fn started(turn_id: impl Into<String>) -> Self {
        Self {
            turn_id: Some(turn_id.into()),
            current_call_id: None,
            current_tool_call_id: None,
            is_streaming: true,
        }
    }
}

/// The reconstructed timeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TimelineState {
    items: Vec<Arc<TimelineItem>>,
    #[serde(skip)]
    index_by_id: Arc<HashMap<String, usize>>,
    /// The open turn, if any.
    pub active_turn: ActiveTurn,
}

impl TimelineState {
    /// Empty state with no active turn.
    pub fn new() -> Self {
        Self::default()
    }

    /// Items in display order.
    pub fn items(&self) -> &[Arc<TimelineItem>] {
        &self.items
    }

    /// Iterate items in display order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TimelineItem> {
        self.items.iter().map(|item| &**item)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the timeline is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Position of an item.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    /// Look up an item by id.
    pub fn get(&self, id: &str) -> Option<&TimelineItem> {
        self.position(id).map(|idx| &*self.items[idx])
    }

    /// Whether the index exactly mirrors item positions, including the
    /// child indexes of every container.
    pub fn index_is_consistent(&self) -> bool {
        let top = self.index_by_id.len() == self.items.len()
            && self
                .iter()
                .enumerate()
                .all(|(idx, item)| self.index_by_id.get(item.id()) == Some(&idx));
        top && self.iter().all(|item| match item {
            TimelineItem::CallCluster(c) => c.children.index_is_consistent(),
            TimelineItem::ToolCall(t) => t.children.index_is_consistent(),
            _ => true,
        })
    }

    // ── Mutation ────────────────────────────────────────────────────

    /// Append an item, or replace the item already holding its id.
    pub fn insert(&mut self, item: impl Into<TimelineItem>) {
        let item = item.into();
        if let Some(idx) = self.position(item.id()) {
            self.items[idx] = Arc::new(item);
            return;
        }
        let position = self.items.len();
        let _ = Arc::make_mut(&mut self.index_by_id).insert(item.id().to_owned(), position);
        self.items.push(Arc::new(item));
    }

    /// Mutate one item in place. Returns `false` when the id is unknown.
    ///
    /// `f` must not change the item's id; use [`TimelineState::update_where`]
    /// followed by [`TimelineState::rebuild_index`] for renames.
    pub fn update(&mut self, id: &str, f: impl FnOnce(&mut TimelineItem)) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        f(Arc::make_mut(&mut self.items[idx]));
        true
    }

    /// Mutate every item matching `pred`. Returns how many were touched.
    ///
    /// Untouched items keep sharing their allocation with earlier snapshots.
    pub fn update_where(
        &mut self,
        pred: impl Fn(&TimelineItem) -> bool,
        mut f: impl FnMut(&mut TimelineItem),
    ) -> usize {
        let mut touched = 0;
        for item in &mut self.items {
            if pred(&**item) {
                f(Arc::make_mut(item));
                touched += 1;
            }
        }
        touched
    }

    /// Keep only items satisfying `pred`. Returns how many were removed.
    pub fn retain(&mut self, mut pred: impl FnMut(&TimelineItem) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|item| pred(&**item));
        let removed = before - self.items.len();
        if removed > 0 {
            self.rebuild_index();
        }
        removed
    }

    /// Remove one item by id.
    pub fn remove(&mut self, id: &str) -> bool {
        if self.position(id).is_none() {
            return false;
        }
        self.retain(|item| item.id() != id) > 0
    }

    /// Recompute the id index from positions.
    ///
    /// If two items share an id after a rename, the later one wins the index
    /// and the earlier one is dropped so the index stays exact.
    pub fn rebuild_index(&mut self) {
        let mut index = HashMap::with_capacity(self.items.len());
        let mut duplicate = false;
        for (idx, item) in self.items.iter().enumerate() {
            duplicate |= index.insert(item.id().to_owned(), idx).is_some();
        }
        if duplicate {
            let mut winners: Vec<usize> = index.values().copied().collect();
            winners.sort_unstable();
            self.items = winners
                .into_iter()
                .map(|idx| Arc::clone(&self.items[idx]))
                .collect();
            index = self
                .items
                .iter()
                .enumerate()
                .map(|(idx, item)| (item.id().to_owned(), idx))
                .collect();
        }
        self.index_by_id = Arc::new(index);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
