//! Long-lived side channel: connection lifecycle, heartbeat, reconnect
//! backoff, offline queue, and listeners.

pub mod endpoint;
pub mod listeners;
pub mod manager;
pub mod presence;
pub mod queue;
pub mod state;

pub use endpoint::{Endpoint, Role, conversation_id_from_path};
pub use listeners::{Listeners, Subscription};
pub use manager::{ConnectionConfig, ConnectionManager, PONG_TIMEOUT_CLOSE_CODE};
pub use presence::{NetworkPresence, PresenceHub};
pub use queue::{DEFAULT_QUEUE_CAPACITY, OfflineQueue};
pub use state::ConnectionState;
