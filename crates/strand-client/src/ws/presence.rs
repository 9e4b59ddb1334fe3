//! Network presence hooks.
//!
//! A host that can observe connectivity (an OS reachability callback, a
//! browser shell, a test) owns a [`PresenceHub`] and reports transitions to
//! it. Connection managers attach to the hub and react: online reconnects
//! immediately with a fresh attempt budget, offline tears the socket down.

use std::sync::Weak;

use parking_lot::Mutex;
use tracing::debug;

/// Receiver of connectivity transitions.
pub trait NetworkPresence: Send + Sync {
    /// The network became reachable.
    fn online(&self);
    /// The network became unreachable.
    fn offline(&self);
}

#[derive(Default)]
struct Observers {
    next_id: u64,
    entries: Vec<(u64, Weak<dyn NetworkPresence>)>,
}

/// Fan-out point for connectivity transitions.
///
/// Observers are held weakly; dead ones are pruned on every broadcast.
#[derive(Default)]
pub struct PresenceHub {
    observers: Mutex<Observers>,
}

impl std::fmt::Debug for PresenceHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceHub")
            .field("observers", &self.observers.lock().entries.len())
            .finish()
    }
}

impl PresenceHub {
    /// Empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an observer, returning its registration id.
    pub fn register(&self, observer: Weak<dyn NetworkPresence>) -> u64 {
        let mut observers = self.observers.lock();
        observers.next_id += 1;
        let id = observers.next_id;
        observers.entries.push((id, observer));
        id
    }

    /// Detach an observer.
    pub fn unregister(&self, id: u64) {
        self.observers.lock().entries.retain(|(i, _)| *i != id);
    }

    /// Live observer count.
    pub fn len(&self) -> usize {
        self.observers
            .lock()
            .entries
            .iter()
            .filter(|(_, o)| o.strong_count() > 0)
            .count()
    }

    /// Whether no live observer is attached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Report that the network is reachable.
    pub fn set_online(&self) {
        debug!("network online");
        for observer in self.live() {
            observer.online();
        }
    }

    /// Report that the network is unreachable.
    pub fn set_offline(&self) {
        debug!("network offline");
        for observer in self.live() {
            observer.offline();
        }
    }

    fn live(&self) -> Vec<std::sync::Arc<dyn NetworkPresence>> {
        let mut observers = self.observers.lock();
        observers.entries.retain(|(_, o)| o.strong_count() > 0);
        observers
            .entries
            .iter()
            .filter_map(|(_, o)| o.upgrade())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[derive(Default)]
    struct Counter(AtomicI32);

    impl NetworkPresence for Counter {
        fn online(&self) {
            let _ = self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn offline(&self) {
            let _ = self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn weak(observer: &Arc<Counter>) -> Weak<dyn NetworkPresence> {
        let observer: Arc<dyn NetworkPresence> = observer.clone();
        Arc::downgrade(&observer)
    }

    #[test]
    fn broadcasts_to_registered_observers() {
        let hub = PresenceHub::new();
        let observer = Arc::new(Counter::default());
        let _ = hub.register(weak(&observer));

        hub.set_online();
        hub.set_online();
        hub.set_offline();
        assert_eq!(observer.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregister_detaches() {
        let hub = PresenceHub::new();
        let observer = Arc::new(Counter::default());
        let id = hub.register(weak(&observer));
        hub.unregister(id);
        hub.set_online();
        assert_eq!(observer.0.load(Ordering::SeqCst), 0);
        assert!(hub.is_empty());
    }

    #[test]
    fn dropped_observers_are_pruned() {
        let hub = PresenceHub::new();
        let observer = Arc::new(Counter::default());
        let _ = hub.register(weak(&observer));
        assert_eq!(hub.len(), 1);
        drop(observer);
        hub.set_offline();
        assert!(hub.is_empty());
    }
}
