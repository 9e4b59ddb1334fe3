//! Listener registry for inbound messages, state changes, and errors.
//!
//! Handlers are cloned out of the lock before they run, so a handler may
//! register or remove listeners without deadlocking.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use strand_events::WsMessage;

use super::state::ConnectionState;
use crate::errors::ClientError;

/// Inbound message handler.
pub type MessageHandler = Arc<dyn Fn(&WsMessage) + Send + Sync>;
/// State-change handler, called with `(new, previous)`.
pub type StateHandler = Arc<dyn Fn(ConnectionState, ConnectionState) + Send + Sync>;
/// Error handler.
pub type ErrorHandler = Arc<dyn Fn(&ClientError) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    messages: Vec<(u64, MessageHandler)>,
    states: Vec<(u64, StateHandler)>,
    errors: Vec<(u64, ErrorHandler)>,
}

impl Registry {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared listener registry of one connection manager.
#[derive(Default)]
pub struct Listeners {
    inner: Mutex<Registry>,
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Listeners")
            .field("messages", &inner.messages.len())
            .field("states", &inner.states.len())
            .field("errors", &inner.errors.len())
            .finish()
    }
}

impl Listeners {
    /// Register a message handler.
    pub fn on_message(
        self: &Arc<Self>,
        handler: impl Fn(&WsMessage) + Send + Sync + 'static,
    ) -> Subscription {
        let mut inner = self.inner.lock();
        let id = inner.allocate();
        inner.messages.push((id, Arc::new(handler)));
        Subscription::new(self, id)
    }

    /// Register a state-change handler.
    pub fn on_state_change(
        self: &Arc<Self>,
        handler: impl Fn(ConnectionState, ConnectionState) + Send + Sync + 'static,
    ) -> Subscription {
        let mut inner = self.inner.lock();
        let id = inner.allocate();
        inner.states.push((id, Arc::new(handler)));
        Subscription::new(self, id)
    }

    /// Register an error handler.
    pub fn on_error(
        self: &Arc<Self>,
        handler: impl Fn(&ClientError) + Send + Sync + 'static,
    ) -> Subscription {
        let mut inner = self.inner.lock();
        let id = inner.allocate();
        inner.errors.push((id, Arc::new(handler)));
        Subscription::new(self, id)
    }

    pub(crate) fn emit_message(&self, message: &WsMessage) {
        let handlers = snapshot(&self.inner.lock().messages);
        for handler in handlers {
            handler(message);
        }
    }

    pub(crate) fn emit_state(&self, next: ConnectionState, prev: ConnectionState) {
        let handlers = snapshot(&self.inner.lock().states);
        for handler in handlers {
            handler(next, prev);
        }
    }

    pub(crate) fn emit_error(&self, error: &ClientError) {
        let handlers = snapshot(&self.inner.lock().errors);
        for handler in handlers {
            handler(error);
        }
    }

    /// Total registered handlers.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner.messages.len() + inner.states.len() + inner.errors.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every handler.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.messages.clear();
        inner.states.clear();
        inner.errors.clear();
    }

    fn remove(&self, id: u64) {
        let mut inner = self.inner.lock();
        inner.messages.retain(|(i, _)| *i != id);
        inner.states.retain(|(i, _)| *i != id);
        inner.errors.retain(|(i, _)| *i != id);
    }
}

fn snapshot<H: Clone>(entries: &[(u64, H)]) -> Vec<H> {
    entries.iter().map(|(_, h)| h.clone()).collect()
}

/// Handle for one registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription removes its listener"]
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<Listeners>,
    id: u64,
}

impl Subscription {
    fn new(registry: &Arc<Listeners>, id: u64) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            id,
        }
    }

    /// Remove the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
