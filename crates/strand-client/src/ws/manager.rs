//! Resilient side-channel connection.
//!
//! A [`ConnectionManager`] is a handle over one driver task. The driver owns
//! the socket and every timer (heartbeat interval, pong deadline, backoff
//! sleep) and moves between three phases:
//!
//! - **idle**: `disconnected`, waiting for `connect` or `online`
//! - **connect**: `connecting`, opening the socket, then running the session
//!   loop while `connected`
//! - **backoff**: `reconnecting`, sleeping `min(initial * 2^attempt, max)`;
//!   only `online` cuts the sleep short
//!
//! Clean closes (1000, 1001) settle in `disconnected`. Everything else goes
//! through backoff until the attempt budget is spent.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use strand_core::StrandError;
use strand_core::retry::BackoffConfig;
use strand_events::WsMessage;
use strand_settings::WebSocketSettings;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::endpoint::{Endpoint, conversation_id_from_path};
use super::listeners::{Listeners, Subscription};
use super::presence::{NetworkPresence, PresenceHub};
use super::queue::OfflineQueue;
use super::state::ConnectionState;
use crate::errors::{ClientError, Result};

/// Close code sent when the pong deadline passes.
pub const PONG_TIMEOUT_CLOSE_CODE: u16 = 4000;

const CLIENT_DISCONNECT_REASON: &str = "Client disconnect";
const PONG_TIMEOUT_REASON: &str = "Pong timeout";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tuning for one connection.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Socket URL, including the token query.
    pub url: Url,
    /// Conversation stamped on outbound envelopes.
    pub conversation_id: Option<String>,
    /// Heartbeat period.
    pub ping_interval: Duration,
    /// How long to wait for `system.pong`.
    pub pong_timeout: Duration,
    /// Reconnect policy.
    pub backoff: BackoffConfig,
    /// Offline queue capacity.
    pub max_queue_size: usize,
}

impl ConnectionConfig {
    /// Config for `url` using the given tuning. The conversation id is
    /// parsed from the URL path.
    pub fn new(url: Url, settings: &WebSocketSettings) -> Self {
        let conversation_id = conversation_id_from_path(url.path()).map(str::to_owned);
        Self {
            url,
            conversation_id,
            ping_interval: settings.ping_interval(),
            pong_timeout: settings.pong_timeout(),
            backoff: settings.backoff(),
            max_queue_size: settings.max_queue_size,
        }
    }

    /// Config for an endpoint under `base_url`.
    pub fn for_endpoint(
        base_url: &str,
        endpoint: &Endpoint,
        settings: &WebSocketSettings,
    ) -> Result<Self> {
        Ok(Self::new(endpoint.url(base_url)?, settings))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared state
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Command {
    Connect,
    Disconnect,
    /// An envelope and its send-order ticket.
    Send(u64, WsMessage),
    Online,
    Offline,
}

/// State read by the handle and written by the driver.
#[derive(Debug)]
struct Shared {
    state: RwLock<ConnectionState>,
    connection_id: RwLock<Option<String>>,
    queue: Mutex<OfflineQueue>,
    listeners: Arc<Listeners>,
    closed: AtomicBool,
}

impl Shared {
    fn new(max_queue_size: usize) -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            connection_id: RwLock::new(None),
            queue: Mutex::new(OfflineQueue::new(max_queue_size)),
            listeners: Arc::new(Listeners::default()),
            closed: AtomicBool::new(false),
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Transition and notify. After destroy only `disconnected` is accepted.
    fn set_state(&self, next: ConnectionState) {
        if self.closed.load(Ordering::SeqCst) && next != ConnectionState::Disconnected {
            return;
        }
        let prev = std::mem::replace(&mut *self.state.write(), next);
        self.notify(next, prev);
    }

    fn notify(&self, next: ConnectionState, prev: ConnectionState) {
        if next != prev {
            info!(from = %prev, to = %next, "connection state changed");
            self.listeners.emit_state(next, prev);
        }
    }

    /// Enter `connected` and take the backlog in one step, so a concurrent
    /// `send` either lands in the backlog or sees `connected`.
    fn open_session(&self) -> Option<Vec<(u64, WsMessage)>> {
        let (prev, backlog) = {
            let mut queue = self.queue.lock();
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            let prev = std::mem::replace(&mut *self.state.write(), ConnectionState::Connected);
            (prev, queue.drain_ticketed())
        };
        self.notify(ConnectionState::Connected, prev);
        Some(backlog)
    }

    /// Queue an envelope that could not go out, in its original send order.
    fn enqueue(&self, ticket: u64, message: WsMessage) {
        debug!(id = %message.id, action = %message.action, ticket, "queueing while offline");
        let _ = self.queue.lock().insert(ticket, message);
    }

    fn set_connection_id(&self, id: Option<String>) {
        *self.connection_id.write() = id;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

struct PresenceHook {
    commands: mpsc::UnboundedSender<Command>,
}

impl NetworkPresence for PresenceHook {
    fn online(&self) {
        let _ = self.commands.send(Command::Online);
    }

    fn offline(&self) {
        let _ = self.commands.send(Command::Offline);
    }
}

struct PresenceLink {
    hub: std::sync::Weak<PresenceHub>,
    id: u64,
    _hook: Arc<dyn NetworkPresence>,
}

/// Long-lived side-channel connection with heartbeat, backoff, and an
/// offline queue.
///
/// Must be created inside a tokio runtime. Dropping the manager shuts the
/// driver down.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    conversation_id: Option<String>,
    commands: mpsc::UnboundedSender<Command>,
    cancel: tokio_util::sync::CancellationToken,
    _driver: JoinHandle<()>,
    presence: Mutex<Option<PresenceLink>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("conversation_id", &self.conversation_id)
            .field("connection_id", &self.connection_id())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Spawn the driver. The manager starts `disconnected`; call
    /// [`connect`](Self::connect) to open the socket.
    pub fn new(config: ConnectionConfig) -> Self {
        let shared = Arc::new(Shared::new(config.max_queue_size));
        let (commands, rx) = mpsc::unbounded_channel();
        let cancel = tokio_util::sync::CancellationToken::new();
        let conversation_id = config.conversation_id.clone();

        let driver = Driver {
            config,
            shared: Arc::clone(&shared),
            commands: rx,
            cancel: cancel.clone(),
            attempts: 0,
        };
        let driver = tokio::spawn(driver.run());

        Self {
            shared,
            conversation_id,
            commands,
            cancel,
            _driver: driver,
            presence: Mutex::new(None),
        }
    }

    /// Manager for an end user's socket on `conversation_id`.
    pub fn for_user(
        base_url: &str,
        conversation_id: &str,
        user_id: &str,
        settings: &WebSocketSettings,
    ) -> Result<Self> {
        let endpoint = Endpoint::user(conversation_id, user_id);
        Ok(Self::new(ConnectionConfig::for_endpoint(base_url, &endpoint, settings)?))
    }

    /// Manager for an operator's socket on `conversation_id`.
    pub fn for_agent(
        base_url: &str,
        conversation_id: &str,
        agent_id: &str,
        settings: &WebSocketSettings,
    ) -> Result<Self> {
        let endpoint = Endpoint::agent(conversation_id, agent_id);
        Ok(Self::new(ConnectionConfig::for_endpoint(base_url, &endpoint, settings)?))
    }

    /// Open the socket. A no-op unless `disconnected`; a pending reconnect
    /// keeps its backoff (use [`notify_online`](Self::notify_online) to skip
    /// it).
    pub fn connect(&self) {
        let state = self.state();
        if state.accepts_connect() {
            self.command(Command::Connect);
        } else {
            debug!(state = %state, "connect ignored");
        }
    }

    /// Close with 1000 and settle in `disconnected`.
    pub fn disconnect(&self) {
        self.command(Command::Disconnect);
    }

    /// Send an envelope, or queue it until the next `connected`. Returns the
    /// envelope id.
    pub fn send(&self, action: &str, payload: Map<String, Value>) -> String {
        let message = WsMessage::new(action, payload, self.conversation_id.clone());
        let id = message.id.clone();

        let mut queue = self.shared.queue.lock();
        let ticket = queue.ticket();
        if self.shared.state() == ConnectionState::Connected {
            drop(queue);
            trace!(id = %id, action, ticket, "sending");
            self.command(Command::Send(ticket, message));
        } else {
            debug!(id = %id, action, state = %self.shared.state(), "queueing while offline");
            let _ = queue.insert(ticket, message);
        }
        id
    }

    /// The network came back: reset the attempt budget and reconnect.
    pub fn notify_online(&self) {
        self.command(Command::Online);
    }

    /// The network went away: tear down and settle in `disconnected`.
    pub fn notify_offline(&self) {
        self.command(Command::Offline);
    }

    /// Follow connectivity reports from `hub` until [`destroy`](Self::destroy).
    pub fn attach_presence(&self, hub: &Arc<PresenceHub>) {
        let hook: Arc<dyn NetworkPresence> = Arc::new(PresenceHook {
            commands: self.commands.clone(),
        });
        let id = hub.register(Arc::downgrade(&hook));
        let previous = self.presence.lock().replace(PresenceLink {
            hub: Arc::downgrade(hub),
            id,
            _hook: hook,
        });
        if let Some(link) = previous {
            detach(link);
        }
    }

    /// Detach presence hooks, stop every timer and task, close the socket,
    /// and clear all listeners.
    pub fn destroy(&self) {
        if let Some(link) = self.presence.lock().take() {
            detach(link);
        }
        self.shared.closed.store(true, Ordering::SeqCst);
        self.cancel.cancel();
        self.shared.set_state(ConnectionState::Disconnected);
        self.shared.set_connection_id(None);
        self.shared.listeners.clear();
        debug!("connection manager destroyed");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Whether the socket is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Id assigned by the peer's `system.connected`.
    pub fn connection_id(&self) -> Option<String> {
        self.shared.connection_id.read().clone()
    }

    /// Conversation parsed from the endpoint.
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Envelopes waiting for the next connect.
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Register an inbound message handler. Pongs are never delivered.
    pub fn on_message(&self, handler: impl Fn(&WsMessage) + Send + Sync + 'static) -> Subscription {
        self.shared.listeners.on_message(handler)
    }

    /// Register a `(new, previous)` state handler.
    pub fn on_state_change(
        &self,
        handler: impl Fn(ConnectionState, ConnectionState) + Send + Sync + 'static,
    ) -> Subscription {
        self.shared.listeners.on_state_change(handler)
    }

    /// Register an error handler.
    pub fn on_error(&self, handler: impl Fn(&ClientError) + Send + Sync + 'static) -> Subscription {
        self.shared.listeners.on_error(handler)
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("driver stopped, command ignored");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(link) = self.presence.get_mut().take() {
            detach(link);
        }
        self.cancel.cancel();
    }
}

fn detach(link: PresenceLink) {
    if let Some(hub) = link.hub.upgrade() {
        hub.unregister(link.id);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

enum Phase {
    Idle,
    Connect,
    Backoff(Duration),
}

type Socket = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct Driver {
    config: ConnectionConfig,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<Command>,
    cancel: tokio_util::sync::CancellationToken,
    attempts: u32,
}

impl Driver {
    async fn run(mut self) {
        let mut phase = Phase::Idle;
        loop {
            let next = match phase {
                Phase::Idle => self.idle().await,
                Phase::Connect => self.connect().await,
                Phase::Backoff(delay) => self.backoff(delay).await,
            };
            match next {
                Some(next) => phase = next,
                None => break,
            }
        }
        self.shared.set_connection_id(None);
        debug!("connection driver stopped");
    }

    /// `disconnected`: wait to be told to connect.
    async fn idle(&mut self) -> Option<Phase> {
        loop {
            let command = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                command = self.commands.recv() => command,
            }?;
            match command {
                Command::Connect | Command::Online => {
                    self.attempts = 0;
                    return Some(Phase::Connect);
                }
                Command::Send(ticket, message) => self.shared.enqueue(ticket, message),
                Command::Disconnect | Command::Offline => {}
            }
        }
    }

    /// `connecting`: open the socket, then run the session.
    async fn connect(&mut self) -> Option<Phase> {
        self.shared.set_state(ConnectionState::Connecting);
        debug!(url = %self.config.url, attempt = self.attempts, "connecting");

        let opening = tokio_tungstenite::connect_async(self.config.url.to_string());
        tokio::pin!(opening);
        let opened = loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return None,
                command = self.commands.recv() => match command? {
                    Command::Disconnect | Command::Offline => return Some(self.settle()),
                    Command::Send(ticket, message) => self.shared.enqueue(ticket, message),
                    Command::Connect | Command::Online => {}
                },
                result = &mut opening => break result,
            }
        };

        match opened {
            Ok((socket, _)) => self.session(socket).await,
            Err(e) => {
                let error = ClientError::from(e);
                warn!(attempt = self.attempts, error = %error, "connect failed");
                self.shared.listeners.emit_error(&error);
                Some(self.schedule_reconnect())
            }
        }
    }

    /// `connected`: pump the socket, commands, and heartbeat.
    async fn session(&mut self, socket: Socket) -> Option<Phase> {
        let backlog = self.shared.open_session()?;
        self.attempts = 0;
        let (mut sink, mut stream) = socket.split();

        if !backlog.is_empty() {
            debug!(count = backlog.len(), "flushing offline queue");
        }
        let mut backlog = backlog.into_iter();
        while let Some((ticket, message)) = backlog.next() {
            if let Err(e) = sink.send(text(&message)).await {
                warn!(error = %e, "flush failed");
                self.shared.enqueue(ticket, message);
                backlog.for_each(|(t, m)| self.shared.enqueue(t, m));
                return Some(self.schedule_reconnect());
            }
        }

        let period = self.config.ping_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pong_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    let _ = sink.send(close(CloseCode::Normal, CLIENT_DISCONNECT_REASON)).await;
                    return None;
                }
                command = self.commands.recv() => match command {
                    None => {
                        let _ = sink.send(close(CloseCode::Normal, CLIENT_DISCONNECT_REASON)).await;
                        return None;
                    }
                    Some(Command::Disconnect | Command::Offline) => {
                        let _ = sink.send(close(CloseCode::Normal, CLIENT_DISCONNECT_REASON)).await;
                        return Some(self.settle());
                    }
                    Some(Command::Send(ticket, message)) => {
                        trace!(id = %message.id, action = %message.action, "send");
                        if let Err(e) = sink.send(text(&message)).await {
                            warn!(error = %e, "send failed");
                            self.shared.enqueue(ticket, message);
                            self.shared.listeners.emit_error(&ClientError::from(e));
                            return Some(self.schedule_reconnect());
                        }
                    }
                    Some(Command::Connect | Command::Online) => {}
                },
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(body))) => self.on_text(body.as_str(), &mut pong_deadline),
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.as_ref().map(|f| u16::from(f.code));
                        return Some(self.on_close(code));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let error = ClientError::from(e);
                        warn!(error = %error, "socket read failed");
                        self.shared.listeners.emit_error(&error);
                        return Some(self.schedule_reconnect());
                    }
                    None => {
                        debug!("socket ended without close frame");
                        return Some(self.schedule_reconnect());
                    }
                },
                _ = heartbeat.tick() => {
                    trace!("ping");
                    if let Err(e) = sink.send(text(&WsMessage::ping())).await {
                        warn!(error = %e, "ping failed");
                        return Some(self.schedule_reconnect());
                    }
                    if pong_deadline.is_none() {
                        pong_deadline = Some(Instant::now() + self.config.pong_timeout);
                    }
                }
                () = expiry(pong_deadline) => {
                    warn!(timeout_ms = self.config.pong_timeout.as_millis(), "pong timeout");
                    let code = CloseCode::from(PONG_TIMEOUT_CLOSE_CODE);
                    let _ = sink.send(close(code, PONG_TIMEOUT_REASON)).await;
                    return Some(self.schedule_reconnect());
                }
            }
        }
    }

    /// `reconnecting`: sleep out the delay unless told otherwise.
    async fn backoff(&mut self, delay: Duration) -> Option<Phase> {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return None,
                command = self.commands.recv() => match command? {
                    Command::Connect => {}
                    Command::Online => {
                        self.attempts = 0;
                        return Some(Phase::Connect);
                    }
                    Command::Disconnect | Command::Offline => return Some(self.settle()),
                    Command::Send(ticket, message) => self.shared.enqueue(ticket, message),
                },
                () = &mut sleep => {
                    self.attempts += 1;
                    return Some(Phase::Connect);
                }
            }
        }
    }

    fn on_text(&self, body: &str, pong_deadline: &mut Option<Instant>) {
        let message = match WsMessage::decode(body) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "dropping unparseable frame");
                return;
            }
        };
        if message.is_pong() {
            trace!("pong");
            *pong_deadline = None;
            return;
        }
        if message.is_connected() {
            let id = message.connection_id().map(str::to_owned);
            info!(connection_id = id.as_deref().unwrap_or_default(), "joined");
            self.shared.set_connection_id(id);
        }
        self.shared.listeners.emit_message(&message);
    }

    fn on_close(&mut self, code: Option<u16>) -> Phase {
        match code {
            Some(code @ (1000 | 1001)) => {
                info!(code, "socket closed cleanly");
                self.settle()
            }
            _ => {
                info!(code = code.unwrap_or_default(), "socket closed abnormally");
                self.schedule_reconnect()
            }
        }
    }

    fn settle(&mut self) -> Phase {
        self.shared.set_connection_id(None);
        self.shared.set_state(ConnectionState::Disconnected);
        Phase::Idle
    }

    fn schedule_reconnect(&mut self) -> Phase {
        self.shared.set_connection_id(None);
        match self.config.backoff.delay_for(self.attempts) {
            Some(delay) => {
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                warn!(attempt = self.attempts, delay_ms, "scheduling reconnect");
                self.shared.set_state(ConnectionState::Reconnecting);
                Phase::Backoff(delay)
            }
            None => {
                warn!(attempts = self.attempts, "reconnect attempts exhausted");
                let error = ClientError::Core(StrandError::ConnectionLost {
                    attempts: self.attempts,
                });
                self.shared.set_state(ConnectionState::Disconnected);
                self.shared.listeners.emit_error(&error);
                Phase::Idle
            }
        }
    }
}

fn text(message: &WsMessage) -> Message {
    Message::Text(message.encode().into())
}

fn close(code: CloseCode, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}

/// Resolves at `deadline`, or never when unarmed.
fn expiry(deadline: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
