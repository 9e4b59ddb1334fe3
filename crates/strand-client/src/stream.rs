//! # Stream ingestion
//!
//! Issues a turn request and turns the chunked response body into an
//! ordered sequence of [`ChatEvent`]s.
//!
//! - Bytes are buffered and split on `\n`; only terminated lines are
//!   processed and the unterminated tail waits for the next read
//! - Lines are decoded as lossy UTF-8, so a bad byte never ends the turn
//! - `data: ` lines decode into events; malformed frames are dropped
//! - A final unterminated `data:` line is decoded when the body ends
//! - The [`CancellationToken`] is checked before every read

use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use strand_events::{ChatEvent, ChatRequest, decode_line};
use strand_settings::ApiSettings;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::errors::{ClientError, Result};

/// Decoded events of one turn.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ChatEvent>> + Send>>;

/// Initial capacity of the line buffer.
const BUFFER_CAPACITY: usize = 8192;

/// HTTP client for the turn endpoint.
#[derive(Clone, Debug)]
pub struct StreamClient {
    http: reqwest::Client,
    api: ApiSettings,
}

impl StreamClient {
    /// Client with a fresh connection pool.
    pub fn new(api: ApiSettings) -> Self {
        Self::with_client(reqwest::Client::new(), api)
    }

    /// Client sharing an existing connection pool.
    pub fn with_client(http: reqwest::Client, api: ApiSettings) -> Self {
        Self { http, api }
    }

    /// Endpoint settings in use.
    pub fn api(&self) -> &ApiSettings {
        &self.api
    }

    /// POST the request and return its event stream.
    ///
    /// Fails immediately on a non-success status with the response body as
    /// the message. Cancellation before the response arrives yields
    /// [`ClientError::Cancelled`]; cancellation afterwards ends the stream.
    #[instrument(skip_all, fields(conversation_id = %request.conversation_id))]
    pub async fn stream_chat(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream> {
        let mut builder = self.http.post(self.api.chat_url()).json(request);
        for (name, value) in &self.api.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = self.api.request_timeout() {
            builder = builder.timeout(timeout);
        }

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            response = builder.send() => Some(response),
        };
        let Some(response) = response else {
            return Err(ClientError::Cancelled);
        };
        let response = response?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "turn request rejected");
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), "turn stream opened");
        Ok(Box::pin(decode_events(response.bytes_stream(), cancel)))
    }
}

/// Decode a raw byte stream into events.
///
/// A read error is yielded once and ends the sequence; cancellation ends it
/// quietly.
pub fn decode_events<S, E>(
    byte_stream: S,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<ChatEvent>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: Into<ClientError> + Send + 'static,
{
    futures::stream::unfold(FrameReader::new(byte_stream, cancel), |mut reader| async move {
        let item = reader.next_event().await?;
        Some((item, reader))
    })
}

struct FrameReader<S> {
    stream: S,
    buffer: BytesMut,
    cancel: CancellationToken,
    done: bool,
}

impl<S, E> FrameReader<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Into<ClientError>,
{
    fn new(stream: S, cancel: CancellationToken) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(BUFFER_CAPACITY),
            cancel,
            done: false,
        }
    }

    async fn next_event(&mut self) -> Option<Result<ChatEvent>> {
        loop {
            if self.done {
                return None;
            }
            if self.cancel.is_cancelled() {
                debug!("turn stream cancelled");
                self.done = true;
                return None;
            }

            if let Some(line) = self.take_line() {
                if let Some(event) = decode_line(&line) {
                    return Some(Ok(event));
                }
                continue;
            }

            let chunk = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                chunk = self.stream.next() => Some(chunk),
            };
            let Some(chunk) = chunk else {
                continue;
            };

            match chunk {
                Some(Ok(bytes)) => self.buffer.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    self.done = true;
                    let err: ClientError = e.into();
                    warn!(error = %err, "turn stream read failed");
                    return Some(Err(err));
                }
                None => {
                    self.done = true;
                    let tail = String::from_utf8_lossy(&self.buffer).into_owned();
                    self.buffer.clear();
                    return decode_line(tail.trim_end()).map(Ok);
                }
            }
        }
    }

    /// Split off the next terminated line, without its `\n`.
    fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line = self.buffer.split_to(pos + 1);
        Some(String::from_utf8_lossy(&line[..pos]).into_owned())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use strand_events::EventType;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = std::result::Result<Bytes, ClientError>> + Unpin + use<> {
        futures::stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(parts: &[&'static str]) -> Vec<Result<ChatEvent>> {
        decode_events(chunks(parts), CancellationToken::new())
            .collect()
            .await
    }

    fn types(items: &[Result<ChatEvent>]) -> Vec<String> {
        items
            .iter()
            .map(|r| r.as_ref().map_or_else(|e| format!("err:{e}"), |e| e.type_str().to_owned()))
            .collect()
    }

    // ── framing ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn frame_split_across_reads_decodes_once() {
        let items = collect(&[
            "data: {\"type\":\"tool.start\",\"seq\":1,\"payload\":{\"na",
            "me\":\"search_products\"}}\n\n",
        ])
        .await;
        assert_eq!(items.len(), 1);
        let event = items[0].as_ref().unwrap();
        assert_eq!(event.event_type(), Some(EventType::ToolStart));
        assert_eq!(event.payload["name"], "search_products");
    }

    #[tokio::test]
    async fn several_frames_in_one_read() {
        let items = collect(&[
            "data: {\"type\":\"meta.start\",\"seq\":1}\n\ndata: {\"type\":\"assistant.delta\",\"seq\":2}\n\n",
        ])
        .await;
        assert_eq!(types(&items), ["meta.start", "assistant.delta"]);
    }

    #[tokio::test]
    async fn trailing_unterminated_frame_is_decoded() {
        let items = collect(&["data: {\"type\":\"assistant.final\",\"seq\":3}"]).await;
        assert_eq!(types(&items), ["assistant.final"]);
    }

    #[tokio::test]
    async fn malformed_and_foreign_lines_are_skipped() {
        let items = collect(&[
            ": keepalive\n",
            "event: message\n",
            "data: {not json}\n\n",
            "data: {\"type\":\"error\",\"seq\":4}\r\n\r\n",
        ])
        .await;
        assert_eq!(types(&items), ["error"]);
    }

    #[tokio::test]
    async fn unknown_types_pass_through() {
        let items = collect(&["data: {\"type\":\"agent.teleported\",\"seq\":1}\n"]).await;
        assert_eq!(types(&items), ["agent.teleported"]);
    }

    #[tokio::test]
    async fn multibyte_text_split_across_reads() {
        let frame = "data: {\"type\":\"assistant.delta\",\"payload\":{\"delta\":\"caf\u{e9}\"}}\n";
        let bytes = frame.as_bytes();
        let split = frame.find('\u{e9}').unwrap() + 1;
        let stream = futures::stream::iter(vec![
            Ok::<_, ClientError>(Bytes::copy_from_slice(&bytes[..split])),
            Ok(Bytes::copy_from_slice(&bytes[split..])),
        ]);
        let items: Vec<_> = decode_events(stream, CancellationToken::new()).collect().await;
        assert_eq!(items[0].as_ref().unwrap().payload["delta"], "caf\u{e9}");
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced_not_fatal() {
        let stream = futures::stream::iter(vec![
            Ok::<_, ClientError>(Bytes::from_static(b"\xff\xfe garbage\n")),
            Ok(Bytes::from_static(b"data: {\"type\":\"error\"}\n")),
        ]);
        let items: Vec<_> = decode_events(stream, CancellationToken::new()).collect().await;
        assert_eq!(types(&items), ["error"]);
    }

    // ── termination ─────────────────────────────────────────────────

    #[tokio::test]
    async fn read_error_is_yielded_once_then_ends() {
        let stream = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"type\":\"meta.start\"}\n")),
            Err(ClientError::WebSocket("reset".into())),
            Ok(Bytes::from_static(b"data: {\"type\":\"error\"}\n")),
        ]);
        let items: Vec<_> = decode_events(stream, CancellationToken::new()).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert_matches!(items[1], Err(ClientError::WebSocket(_)));
    }

    #[tokio::test]
    async fn cancellation_ends_quietly() {
        let cancel = CancellationToken::new();
        let (tx, rx) = futures::channel::mpsc::unbounded::<std::result::Result<Bytes, ClientError>>();
        tx.unbounded_send(Ok(Bytes::from_static(b"data: {\"type\":\"meta.start\"}\n")))
            .unwrap();
        let mut events = Box::pin(decode_events(rx, cancel.clone()));

        assert!(events.next().await.unwrap().is_ok());
        cancel.cancel();
        assert!(events.next().await.is_none());
        drop(tx);
    }
}
