//! Turn orchestration.
//!
//! [`TurnOrchestrator`] owns the live [`TimelineState`]. A send applies the
//! optimistic user message and waiting placeholder before any I/O, then
//! folds each decoded event through the reducer and publishes a snapshot
//! after every step.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use strand_core::{MessageId, TurnId};
use strand_events::{ChatEvent, ChatRequest, HistoryMessage, ImageAttachment};
use strand_settings::StrandSettings;
use strand_timeline::{
    ComposedReducer, TimelineState, add_user_message, end_turn, history_to_timeline, start_turn,
};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::errors::{ClientError, Result};
use crate::stream::StreamClient;

/// Capacity of the decoded-event broadcast.
const EVENT_BROADCAST_CAPACITY: usize = 256;

/// Turns a user message into the outbound request body.
#[cfg_attr(test, mockall::automock)]
pub trait RequestBuilder: Send + Sync {
    /// Build the request for one turn.
    fn build(&self, content: &str, images: Vec<ImageAttachment>) -> ChatRequest;
}

/// Builds [`ChatRequest`]s for a fixed user and conversation.
#[derive(Clone, Debug)]
pub struct DefaultRequestBuilder {
    /// Sending user.
    pub user_id: String,
    /// Target conversation.
    pub conversation_id: String,
}

impl DefaultRequestBuilder {
    /// Builder for `user_id` in `conversation_id`.
    pub fn new(user_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
        }
    }
}

impl RequestBuilder for DefaultRequestBuilder {
    fn build(&self, content: &str, images: Vec<ImageAttachment>) -> ChatRequest {
        ChatRequest::new(&self.user_id, &self.conversation_id, content, images)
    }
}

/// Drives turns against the chat endpoint and owns the resulting timeline.
pub struct TurnOrchestrator {
    client: StreamClient,
    reducer: ComposedReducer,
    builder: Arc<dyn RequestBuilder>,
    state_tx: watch::Sender<TimelineState>,
    events_tx: broadcast::Sender<ChatEvent>,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for TurnOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOrchestrator")
            .field("client", &self.client)
            .field("reducer", &self.reducer)
            .field("streaming", &self.is_streaming())
            .finish_non_exhaustive()
    }
}

impl TurnOrchestrator {
    /// Orchestrator with the built-in reducer and an empty timeline.
    pub fn new(client: StreamClient, builder: impl RequestBuilder + 'static) -> Self {
        let (state_tx, _) = watch::channel(TimelineState::new());
        let (events_tx, _) = broadcast::channel(EVENT_BROADCAST_CAPACITY);
        Self {
            client,
            reducer: ComposedReducer::new(),
            builder: Arc::new(builder),
            state_tx,
            events_tx,
            in_flight: Mutex::new(None),
        }
    }

    /// Orchestrator for `conversation_id` using the configured endpoint and
    /// identity.
    pub fn from_settings(settings: &StrandSettings, conversation_id: impl Into<String>) -> Self {
        Self::new(
            StreamClient::new(settings.api.clone()),
            DefaultRequestBuilder::new(&settings.identity.user_id, conversation_id),
        )
    }

    /// Replace the reducer with a composed one.
    #[must_use]
    pub fn with_reducer(mut self, reducer: ComposedReducer) -> Self {
        self.reducer = reducer;
        self
    }

    /// Send one user message and stream the turn to completion.
    ///
    /// Cancellation through [`abort`](Self::abort) is not an error. Any
    /// other failure is returned with the turn's items left in place.
    #[instrument(skip_all, fields(images = images.len()))]
    pub async fn send_message(&self, content: &str, images: Vec<ImageAttachment>) -> Result<()> {
        let cancel = {
            let mut slot = self.in_flight.lock();
            if slot.is_some() {
                return Err(ClientError::TurnInFlight);
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };
        let _guard = TurnGuard { owner: self };

        let request = self.builder.build(content, images.clone());
        let message_id = MessageId::new();
        let turn_id = TurnId::new();
        info!(turn_id = turn_id.as_str(), "turn started");

        self.apply(|state| {
            let state = add_user_message(state, message_id.as_str(), content, images);
            start_turn(&state, turn_id.as_str())
        });

        match self.run_turn(&request, cancel).await {
            Ok(()) => {
                debug!(turn_id = turn_id.as_str(), "turn complete");
                Ok(())
            }
            Err(e) if e.is_cancelled() => {
                debug!(turn_id = turn_id.as_str(), "turn cancelled");
                Ok(())
            }
            Err(e) => {
                warn!(turn_id = turn_id.as_str(), kind = e.error_kind(), error = %e, "turn failed");
                Err(e)
            }
        }
    }

    async fn run_turn(&self, request: &ChatRequest, cancel: CancellationToken) -> Result<()> {
        let mut events = self.client.stream_chat(request, cancel).await?;
        while let Some(item) = events.next().await {
            let event = item?;
            self.apply(|state| self.reducer.reduce(state, &event));
            let _ = self.events_tx.send(event);
        }
        Ok(())
    }

    /// Cancel the in-flight turn. Returns whether one was running.
    pub fn abort(&self) -> bool {
        match self.in_flight.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Replace the timeline with one rebuilt from history.
    pub fn hydrate(&self, history: &[HistoryMessage]) {
        let _ = self.state_tx.send_replace(history_to_timeline(history));
    }

    /// Replace the timeline with an empty one.
    pub fn reset(&self) {
        let _ = self.state_tx.send_replace(TimelineState::new());
    }

    /// Drop every item of `turn_id`.
    pub fn clear_turn(&self, turn_id: &str) {
        self.apply(|state| strand_timeline::clear_turn(state, turn_id));
    }

    /// Current timeline.
    pub fn snapshot(&self) -> TimelineState {
        self.state_tx.borrow().clone()
    }

    /// Receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<TimelineState> {
        self.state_tx.subscribe()
    }

    /// Receiver for every decoded event, in order.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ChatEvent> {
        self.events_tx.subscribe()
    }

    /// Whether a turn is streaming.
    pub fn is_streaming(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    fn apply(&self, f: impl FnOnce(&TimelineState) -> TimelineState) {
        self.state_tx.send_modify(|state| *state = f(state));
    }
}

/// Closes the turn however `send_message` exits, including when its future
/// is dropped.
struct TurnGuard<'a> {
    owner: &'a TurnOrchestrator,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        *self.owner.in_flight.lock() = None;
        self.owner.apply(end_turn);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use strand_settings::ApiSettings;
    use strand_timeline::TimelineItem;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer) -> ApiSettings {
        ApiSettings {
            base_url: format!("{}/api/v1", server.uri()),
            ..ApiSettings::default()
        }
    }

    fn sse(frames: &[&str]) -> String {
        frames.iter().map(|f| format!("data: {f}\n\n")).collect()
    }

    async fn mount(server: &MockServer, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/api/v1/chat"))
            .respond_with(template)
            .mount(server)
            .await;
    }

    fn user_messages(state: &TimelineState) -> Vec<String> {
        state
            .iter()
            .filter_map(|item| match item {
                TimelineItem::UserMessage(m) => Some(m.content.clone()),
                _ => None,
            })
            .collect()
    }

    // ── request building ────────────────────────────────────────────

    #[tokio::test]
    async fn uses_pluggable_request_builder() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat"))
            .and(body_json(serde_json::json!({
                "user_id": "mock-user",
                "conversation_id": "conv-9",
                "message": "hello"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(sse(&[])))
            .expect(1)
            .mount(&server)
            .await;

        let mut builder = MockRequestBuilder::new();
        let _ = builder
            .expect_build()
            .withf(|content, images| content.to_string() == "hello" && images.is_empty())
            .times(1)
            .returning(|content, images| {
                ChatRequest::new("mock-user", "conv-9", content.to_string(), images)
            });

        let orch = TurnOrchestrator::new(StreamClient::new(api(&server)), builder);
        orch.send_message("hello", Vec::new()).await.unwrap();
    }

    // ── turn lifecycle ──────────────────────────────────────────────

    #[tokio::test]
    async fn folds_events_and_closes_turn() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(200).set_body_string(sse(&[
                r#"{"type":"meta.start","seq":1,"payload":{"assistant_message_id":"a1"}}"#,
                r#"{"type":"llm.call.start","seq":2,"payload":{"llm_call_id":"c1"}}"#,
                r#"{"type":"assistant.delta","seq":3,"payload":{"delta":"Hi"}}"#,
                r#"{"type":"llm.call.end","seq":4}"#,
                r#"{"type":"assistant.final","seq":5,"payload":{"content":"Hi"}}"#,
            ])),
        )
        .await;

        let orch = TurnOrchestrator::new(
            StreamClient::new(api(&server)),
            DefaultRequestBuilder::new("u", "c"),
        );
        let mut events = orch.subscribe_events();
        orch.send_message("hey", Vec::new()).await.unwrap();

        let state = orch.snapshot();
        assert_eq!(user_messages(&state), ["hey"]);
        assert!(state.get("c1").is_some());
        assert!(state.get("waiting-a1").is_none());
        assert!(!state.active_turn.is_streaming);
        assert!(!orch.is_streaming());
        assert_eq!(events.recv().await.unwrap().type_str(), "meta.start");
    }

    #[tokio::test]
    async fn http_failure_surfaces_and_keeps_items() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(503).set_body_string("overloaded")).await;

        let orch = TurnOrchestrator::new(
            StreamClient::new(api(&server)),
            DefaultRequestBuilder::new("u", "c"),
        );
        let err = orch.send_message("hey", Vec::new()).await.unwrap_err();
        assert_matches!(&err, ClientError::Http { status: 503, body } if body == "overloaded");

        let state = orch.snapshot();
        assert_eq!(user_messages(&state), ["hey"]);
        assert!(!state.active_turn.is_streaming);
        assert!(!orch.is_streaming());
    }

    #[tokio::test]
    async fn concurrent_send_is_rejected() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(200)
                .set_body_string(sse(&[]))
                .set_delay(std::time::Duration::from_millis(300)),
        )
        .await;

        let orch = TurnOrchestrator::new(
            StreamClient::new(api(&server)),
            DefaultRequestBuilder::new("u", "c"),
        );
        let first = orch.send_message("one", Vec::new());
        let second = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            orch.send_message("two", Vec::new()).await
        };
        let (first, second) = tokio::join!(first, second);
        assert!(first.is_ok());
        assert_matches!(second, Err(ClientError::TurnInFlight));
    }

    #[tokio::test]
    async fn abort_is_not_an_error() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(200)
                .set_body_string(sse(&[]))
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .await;

        let orch = TurnOrchestrator::new(
            StreamClient::new(api(&server)),
            DefaultRequestBuilder::new("u", "c"),
        );
        let send = orch.send_message("slow", Vec::new());
        let abort = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            assert!(orch.abort());
        };
        let (result, ()) = tokio::join!(send, abort);
        assert!(result.is_ok());
        assert!(!orch.snapshot().active_turn.is_streaming);
        assert!(!orch.abort());
    }

    #[tokio::test]
    async fn watchers_see_optimistic_state() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(200).set_body_string(sse(&[]))).await;

        let orch = TurnOrchestrator::new(
            StreamClient::new(api(&server)),
            DefaultRequestBuilder::new("u", "c"),
        );
        let mut rx = orch.subscribe();
        let watcher = async {
            rx.changed().await.unwrap();
            let state = rx.borrow_and_update().clone();
            (user_messages(&state), state.active_turn.is_streaming)
        };
        let (seen, sent) = tokio::join!(watcher, orch.send_message("hi", Vec::new()));
        sent.unwrap();
        assert_eq!(seen, (vec!["hi".to_owned()], true));
    }

    // ── state management ────────────────────────────────────────────

    #[test]
    fn hydrate_reset_and_clear() {
        let orch = TurnOrchestrator::new(
            StreamClient::new(ApiSettings::default()),
            DefaultRequestBuilder::new("u", "c"),
        );
        let history: Vec<HistoryMessage> = serde_json::from_value(serde_json::json!([
            {"id": "m1", "role": "user", "content": "hi"},
            {"id": "m2", "role": "assistant", "content": "hello"}
        ]))
        .unwrap();

        orch.hydrate(&history);
        assert_eq!(orch.snapshot().len(), 2);

        orch.clear_turn("m1");
        assert!(orch.snapshot().get("m1").is_none());

        orch.reset();
        assert!(orch.snapshot().is_empty());
    }
}
