//! Client error types.

use strand_core::StrandError;

/// Errors surfaced by the stream client, orchestrator, and connection
/// manager.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The turn endpoint answered with a non-success status.
    #[error("{}", http_message(*.status, .body))]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Request or body read failed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Side-channel socket failure.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// A turn is already streaming.
    #[error("a turn is already in flight")]
    TurnInFlight,

    /// The caller aborted.
    #[error("cancelled")]
    Cancelled,

    /// Engine-level failure.
    #[error(transparent)]
    Core(#[from] StrandError),
}

fn http_message(status: u16, body: &str) -> String {
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        body.to_owned()
    }
}

impl ClientError {
    /// Whether this is a graceful stop rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Core(StrandError::Cancelled))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::Transport(_) => "transport",
            Self::WebSocket(_) => "websocket",
            Self::TurnInFlight => "turn_in_flight",
            Self::Cancelled => "cancelled",
            Self::Core(e) => e.error_kind(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(e.to_string())
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
