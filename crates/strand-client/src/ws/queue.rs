//! Bounded FIFO of envelopes sent while the socket is down.

use std::collections::VecDeque;

use strand_events::WsMessage;
use tracing::debug;

/// Default capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Outbound envelopes waiting for the next `connected` transition.
///
/// Every envelope takes a ticket from [`ticket`](Self::ticket) when it is
/// sent, and the queue stays sorted by ticket. An envelope that was handed to
/// a live socket and comes back after the socket dropped therefore lands
/// ahead of anything sent later. When full, the lowest ticket is dropped.
#[derive(Clone, Debug)]
pub struct OfflineQueue {
    items: VecDeque<(u64, WsMessage)>,
    capacity: usize,
    next_ticket: u64,
}

impl Default for OfflineQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl OfflineQueue {
    /// Queue holding at most `capacity` envelopes (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(DEFAULT_QUEUE_CAPACITY)),
            capacity,
            next_ticket: 0,
        }
    }

    /// Next send-order ticket.
    pub fn ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Append with a fresh ticket, returning the entry evicted to make room.
    pub fn push(&mut self, message: WsMessage) -> Option<WsMessage> {
        let ticket = self.ticket();
        self.insert(ticket, message)
    }

    /// Insert at the position of `ticket`, returning the entry evicted to
    /// make room.
    pub fn insert(&mut self, ticket: u64, message: WsMessage) -> Option<WsMessage> {
        let at = self.items.partition_point(|(t, _)| *t < ticket);
        self.items.insert(at, (ticket, message));
        if self.items.len() <= self.capacity {
            return None;
        }
        let (_, old) = self.items.pop_front()?;
        debug!(id = %old.id, action = %old.action, "offline queue full, dropping oldest");
        Some(old)
    }

    /// Remove everything in send order.
    pub fn drain(&mut self) -> Vec<WsMessage> {
        self.items.drain(..).map(|(_, m)| m).collect()
    }

    /// Remove everything in send order, keeping the tickets.
    pub(crate) fn drain_ticketed(&mut self) -> Vec<(u64, WsMessage)> {
        self.items.drain(..).collect()
    }

    /// Queued count.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum length.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
