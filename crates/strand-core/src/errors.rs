//! Error taxonomy shared across Strand crates.
//!
//! [`StrandError`] classifies every failure the engine can observe:
//!
//! - **Transport**: the request or socket connect failed
//! - **Protocol**: a frame or envelope could not be decoded
//! - **Cancelled**: the caller aborted the operation
//! - **`ConnectionLost`**: the side channel gave up after exhausting reconnects
//!
//! Application errors (server `error` events) are not failures at this layer;
//! they become timeline items.

use thiserror::Error;

/// Top-level error type for the Strand engine.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StrandError {
    /// Request or connect failure. Terminates the current turn or attempt.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed frame or message. Logged and skipped by callers.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Caller-initiated abort.
    #[error("cancelled")]
    Cancelled,

    /// The side channel closed abnormally and every reconnect attempt failed.
    #[error("connection lost after {attempts} reconnect attempts")]
    ConnectionLost {
        /// Number of reconnect attempts made before giving up.
        attempts: u32,
    },
}

impl StrandError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Protocol(_) => "protocol",
            Self::Cancelled => "cancelled",
            Self::ConnectionLost { .. } => "connection_lost",
        }
    }

    /// Whether this error is a graceful stop rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the reconnect policy may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, StrandError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            StrandError::Transport("refused".into()).to_string(),
            "transport error: refused"
        );
        assert_eq!(StrandError::Cancelled.to_string(), "cancelled");
        assert_eq!(
            StrandError::ConnectionLost { attempts: 10 }.to_string(),
            "connection lost after 10 reconnect attempts"
        );
    }

    #[test]
    fn error_kind_classification() {
        assert_eq!(StrandError::Protocol("x".into()).error_kind(), "protocol");
        assert_eq!(
            StrandError::ConnectionLost { attempts: 1 }.error_kind(),
            "connection_lost"
        );
    }

    #[test]
    fn only_transport_is_retryable() {
        assert!(StrandError::Transport("reset".into()).is_retryable());
        assert!(!StrandError::Protocol("bad".into()).is_retryable());
        assert!(!StrandError::Cancelled.is_retryable());
        assert!(!StrandError::ConnectionLost { attempts: 3 }.is_retryable());
    }

    #[test]
    fn cancelled_is_graceful() {
        assert!(StrandError::Cancelled.is_cancelled());
        assert!(!StrandError::Transport("x".into()).is_cancelled());
    }
}
