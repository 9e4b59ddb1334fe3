//! Decoding error types.

use strand_core::StrandError;
use thiserror::Error;

/// Errors raised while decoding frames or envelopes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame payload was not valid JSON for the expected shape.
    #[error("malformed frame ({message}): {preview}")]
    Json {
        /// Parser message.
        message: String,
        /// Truncated frame text.
        preview: String,
    },
}

impl From<DecodeError> for StrandError {
    fn from(e: DecodeError) -> Self {
        Self::Protocol(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_protocol_error() {
        let err = DecodeError::Json {
            message: "expected value".into(),
            preview: "{oops".into(),
        };
        let core: StrandError = err.into();
        assert_eq!(core.error_kind(), "protocol");
        assert!(core.to_string().contains("{oops"));
    }
}
