//! Connection lifecycle states.

use serde::{Deserialize, Serialize};

/// Where the side-channel connection is in its lifecycle.
///
/// ```text
/// disconnected ──connect──▶ connecting ──open──▶ connected
///       ▲                       ▲                   │
///       │                       └──── backoff ──────┤ close / error
///       │                                           ▼
///       └────────── attempts exhausted ────── reconnecting
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No socket and no pending reconnect.
    #[default]
    Disconnected,
    /// Opening a socket.
    Connecting,
    /// Socket open; heartbeat running.
    Connected,
    /// Waiting out a backoff delay before the next attempt.
    Reconnecting,
}

impl ConnectionState {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }

    /// Whether an explicit `connect` starts an attempt from here. Only a
    /// settled connection does; the others already have one running or
    /// scheduled.
    pub fn accepts_connect(self) -> bool {
        self == Self::Disconnected
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
