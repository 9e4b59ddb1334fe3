//! Frame decoding for the turn response stream.
//!
//! The response body is a sequence of lines; a line starting with the
//! `data: ` marker carries one JSON-encoded [`ChatEvent`]. Malformed frames
//! are reported as [`DecodeError`] by [`decode_frame`] and silently dropped
//! (with a debug log) by [`decode_line`].

use tracing::debug;

use crate::errors::DecodeError;
use crate::event::ChatEvent;

/// Prefix that marks a data frame line.
pub const DATA_PREFIX: &str = "data: ";

/// Extract the payload of a data frame line.
///
/// Returns `None` for blank lines, comments, other SSE fields, and empty
/// data. A trailing `\r` is ignored.
pub fn extract_data(line: &str) -> Option<&str> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let data = line.strip_prefix(DATA_PREFIX)?;
    (!data.trim().is_empty()).then_some(data)
}

/// Decode the JSON payload of one frame.
pub fn decode_frame(data: &str) -> Result<ChatEvent, DecodeError> {
    serde_json::from_str(data).map_err(|e| DecodeError::Json {
        message: e.to_string(),
        preview: preview(data),
    })
}

/// Decode one response line into an event, dropping anything malformed.
pub fn decode_line(line: &str) -> Option<ChatEvent> {
    let data = extract_data(line)?;
    match decode_frame(data) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!(error = %e, "dropping malformed frame");
            None
        }
    }
}

fn preview(data: &str) -> String {
    const MAX: usize = 80;
    match data.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &data[..idx]),
        None => data.to_owned(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
