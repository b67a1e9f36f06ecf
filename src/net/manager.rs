//! Connection manager: lifecycle of the single realtime connection.
//!
//! DESIGN
//! ======
//! [`ConnectionManager`] is a handle over one driver task. The driver owns
//! every piece of mutable connection state (the link, the timer arena,
//! heartbeat bookkeeping, the session snapshot) and mutates it only from its
//! own `select!` loop, one wake-up at a time. Handles talk to it through a
//! command channel and read state through a `watch` snapshot.
//!
//! ```text
//! Disconnected --connect()--> Connecting --CONNECT ack--> Connected
//!      ^                          |                          |
//!      |                    failed attempt            link lost / 3 missed pongs
//!      |                          v                          v
//!      +--- attempt cap ---- Reconnecting <------------------+
//!                                 |
//!                          backoff fires --> Connecting
//! ```
//!
//! Every transport attempt bumps the session epoch, and every dispatched
//! [`ClientEvent`] carries the epoch it belongs to, so readers can discard
//! anything that arrives late from a connection that no longer exists.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures never escape the driver; they become state
//! transitions plus `Session::last_error`. Malformed packets and unknown
//! events are logged and dropped. Gestures made while offline are rejected
//! at the call site with [`SendError`].

use std::sync::Arc;
use std::time::Duration;

use events::{
    InboundEvent, JoinTracking, LocationReport, MessageError, MessageReaction, OutboundEvent,
    Packet, PingPayload, PresenceUpdate, ReactionAction, Role, StatusUpdate, UserStatus,
    chat_message, decode_packet, encode_packet,
};
use futures_util::future::BoxFuture;
use serde_json::json;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::backoff::BackoffPolicy;
use super::heartbeat::{Heartbeat, HeartbeatConfig};
use super::session::{ConnectionStatus, Session};
use super::timers::{TimerKind, TimerSet};
use super::transport::{CloseReason, Connector, Link, LinkEvent, TransportError};

// =============================================================================
// PUBLIC TYPES
// =============================================================================

/// Who this client announces itself as after every connect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub role: Role,
    /// Stable for the lifetime of the process, across reconnects.
    pub session_id: String,
}

impl Identity {
    #[must_use]
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            session_id: Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionConfig {
    /// Engine.IO WebSocket endpoint.
    pub url: String,
    /// Sent as `{"token": ...}` in the Socket.IO connect packet.
    pub auth_token: Option<String>,
    pub backoff: BackoffPolicy,
    /// Budget for transport open plus Socket.IO handshake.
    pub connect_timeout: Duration,
    /// Delay between the connect ack and the join announcement.
    pub join_settle: Duration,
    pub heartbeat: HeartbeatConfig,
    /// Quiet period after the last keystroke before `typing-stop`.
    pub typing_idle: Duration,
    /// How long `disconnect()` waits for queued frames to flush.
    pub close_grace: Duration,
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            backoff: BackoffPolicy::default(),
            connect_timeout: Duration::from_secs(20),
            join_settle: Duration::from_millis(250),
            heartbeat: HeartbeatConfig::default(),
            typing_idle: Duration::from_secs(3),
            close_grace: Duration::from_secs(1),
        }
    }
}

/// What subscribers receive, in the order the driver produced it.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    Status { status: ConnectionStatus, epoch: u64 },
    /// `None` after a missed heartbeat; never a guessed value.
    Latency(Option<Duration>),
    Inbound { epoch: u64, event: InboundEvent },
}

impl ClientEvent {
    #[must_use]
    pub fn epoch(&self) -> Option<u64> {
        match self {
            Self::Status { epoch, .. } | Self::Inbound { epoch, .. } => Some(*epoch),
            Self::Latency(_) => None,
        }
    }
}

/// A gesture the manager refused to dispatch.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("not connected to the tracking server")]
    NotConnected,
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error("connection manager has shut down")]
    Closed,
}

// =============================================================================
// HANDLE
// =============================================================================

enum Command {
    Connect,
    Disconnect(oneshot::Sender<()>),
    Emit(OutboundEvent),
    Message(OutboundEvent),
    Typing,
    Location(LocationReport),
    Subscribe(mpsc::UnboundedSender<ClientEvent>),
    ArmedTimers(oneshot::Sender<Vec<TimerKind>>),
    Shutdown,
}

/// Owned handle to one connection. Dropping it aborts the driver.
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    session: watch::Receiver<Session>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Spawn the driver. Starts `Disconnected`; call [`connect`](Self::connect) to go online.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(config: ConnectionConfig, identity: Identity, connector: Arc<dyn Connector>) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (session_tx, session) = watch::channel(Session::default());
        let driver = Driver {
            config,
            identity,
            connector,
            commands: commands_rx,
            session_tx,
            session: Session::default(),
            subscribers: Vec::new(),
            timers: TimerSet::new(),
            heartbeat: Heartbeat::default(),
            link: None,
            pending_open: None,
            engine_open: false,
            joined: false,
            typing: false,
            last_location: None,
        };
        let task = tokio::spawn(driver.run());
        Self {
            commands,
            session,
            task: Some(task),
        }
    }

    /// Start connecting. Ignored unless currently disconnected; clears a terminal failure.
    ///
    /// # Errors
    ///
    /// [`SendError::Closed`] if the driver has stopped.
    pub fn connect(&self) -> Result<(), SendError> {
        self.command(Command::Connect)
    }

    /// Tear the connection down and wait until the driver has finished.
    ///
    /// On return every timer is cancelled, the link is gone, and no further
    /// events are dispatched until the next [`connect`](Self::connect).
    ///
    /// # Errors
    ///
    /// [`SendError::Closed`] if the driver has stopped.
    pub async fn disconnect(&self) -> Result<(), SendError> {
        let (ack, done) = oneshot::channel();
        self.command(Command::Disconnect(ack))?;
        done.await.map_err(|_| SendError::Closed)
    }

    /// Send any outbound event.
    ///
    /// # Errors
    ///
    /// [`SendError::NotConnected`] while offline.
    pub fn emit(&self, event: OutboundEvent) -> Result<(), SendError> {
        self.ensure_connected()?;
        self.command(Command::Emit(event))
    }

    /// Send a chat message. Ends the local typing indicator.
    ///
    /// # Errors
    ///
    /// [`SendError::Message`] for blank or oversized text, [`SendError::NotConnected`] while offline.
    pub fn send_message(&self, text: &str) -> Result<(), SendError> {
        let event = chat_message(text)?;
        self.ensure_connected()?;
        self.command(Command::Message(event))
    }

    /// # Errors
    ///
    /// [`SendError::NotConnected`] while offline.
    pub fn react(&self, message_id: &str, emoji: &str, action: ReactionAction) -> Result<(), SendError> {
        self.emit(OutboundEvent::MessageReaction(MessageReaction {
            message_id: message_id.to_owned(),
            emoji: emoji.to_owned(),
            action,
        }))
    }

    /// # Errors
    ///
    /// [`SendError::NotConnected`] while offline.
    pub fn set_status(&self, status: UserStatus) -> Result<(), SendError> {
        self.emit(OutboundEvent::StatusUpdate(StatusUpdate { status }))
    }

    /// Report whether the local user is active right now.
    ///
    /// # Errors
    ///
    /// [`SendError::NotConnected`] while offline.
    pub fn report_activity(&self, is_active: bool) -> Result<(), SendError> {
        self.emit(OutboundEvent::PresenceUpdate(PresenceUpdate {
            is_active,
            last_activity: crate::now_ms(),
        }))
    }

    /// Note a keystroke. Emits `typing-start` once, then `typing-stop` after the idle period.
    ///
    /// # Errors
    ///
    /// [`SendError::NotConnected`] while offline.
    pub fn notify_typing(&self) -> Result<(), SendError> {
        self.ensure_connected()?;
        self.command(Command::Typing)
    }

    /// Record the local position. Remembered for the next join even while
    /// offline; relayed as `location-update` when connected.
    ///
    /// # Errors
    ///
    /// [`SendError::Closed`] if the driver has stopped.
    pub fn send_location(&self, report: LocationReport) -> Result<(), SendError> {
        self.command(Command::Location(report))
    }

    /// Lossless, ordered feed of everything the driver dispatches from now on.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.commands.send(Command::Subscribe(tx));
        rx
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.session.borrow().status
    }

    #[must_use]
    pub fn watch_session(&self) -> watch::Receiver<Session> {
        self.session.clone()
    }

    /// Timers the driver currently has armed.
    ///
    /// # Errors
    ///
    /// [`SendError::Closed`] if the driver has stopped.
    pub async fn armed_timers(&self) -> Result<Vec<TimerKind>, SendError> {
        let (reply, armed) = oneshot::channel();
        self.command(Command::ArmedTimers(reply))?;
        armed.await.map_err(|_| SendError::Closed)
    }

    /// Disconnect and wait for the driver task to exit.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                warn!(%error, "connection driver ended abnormally");
            }
        }
    }

    fn command(&self, command: Command) -> Result<(), SendError> {
        self.commands.send(command).map_err(|_| SendError::Closed)
    }

    fn ensure_connected(&self) -> Result<(), SendError> {
        if self.session.borrow().is_connected() {
            Ok(())
        } else {
            Err(SendError::NotConnected)
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// =============================================================================
// DRIVER
// =============================================================================

/// Target state of a transition. The socket id travels with `Connected` only.
enum Phase {
    Disconnected,
    Connecting,
    Connected(String),
    Reconnecting,
}

enum Wake {
    Command(Option<Command>),
    Opened(Result<Link, TransportError>),
    Link(Option<LinkEvent>),
    Timer(TimerKind),
}

struct Driver {
    config: ConnectionConfig,
    identity: Identity,
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
    session_tx: watch::Sender<Session>,
    session: Session,
    subscribers: Vec<mpsc::UnboundedSender<ClientEvent>>,
    timers: TimerSet,
    heartbeat: Heartbeat,
    link: Option<Link>,
    pending_open: Option<BoxFuture<'static, Result<Link, TransportError>>>,
    engine_open: bool,
    joined: bool,
    typing: bool,
    last_location: Option<LocationReport>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            match self.next_wake().await {
                Wake::Command(None) => break,
                Wake::Command(Some(Command::Shutdown)) => {
                    self.disconnect().await;
                    break;
                }
                Wake::Command(Some(command)) => self.on_command(command).await,
                Wake::Opened(result) => self.on_opened(result),
                Wake::Link(event) => self.on_link_event(event),
                Wake::Timer(kind) => self.on_timer(kind),
            }
        }
        debug!("connection driver stopped");
    }

    async fn next_wake(&mut self) -> Wake {
        let Self {
            commands,
            pending_open,
            link,
            timers,
            ..
        } = self;
        tokio::select! {
            biased;
            command = commands.recv() => Wake::Command(command),
            opened = opening(pending_open) => Wake::Opened(opened),
            event = link_event(link) => Wake::Link(event),
            kind = timers.fired() => Wake::Timer(kind),
        }
    }

    // -------------------------------------------------------------------------
    // commands
    // -------------------------------------------------------------------------

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect => {
                if self.session.status != ConnectionStatus::Disconnected {
                    debug!(status = %self.session.status, "connect ignored");
                    return;
                }
                self.session.reconnect_attempts = 0;
                self.session.terminal = false;
                self.session.last_error = None;
                self.begin_attempt();
            }
            Command::Disconnect(ack) => {
                self.disconnect().await;
                let _ = ack.send(());
            }
            Command::Emit(event) => self.send_event(&event),
            Command::Message(event) => {
                self.stop_typing();
                self.send_event(&event);
            }
            Command::Typing => {
                if !self.session.is_connected() {
                    return;
                }
                if !self.typing {
                    self.typing = true;
                    self.send_event(&OutboundEvent::TypingStart);
                }
                self.timers.arm(TimerKind::TypingIdle, self.config.typing_idle);
            }
            Command::Location(report) => {
                if self.session.is_connected() {
                    self.send_event(&OutboundEvent::LocationUpdate(report.clone()));
                }
                self.last_location = Some(report);
            }
            Command::Subscribe(tx) => self.subscribers.push(tx),
            Command::ArmedTimers(reply) => {
                let _ = reply.send(self.timers.armed());
            }
            Command::Shutdown => {}
        }
    }

    async fn disconnect(&mut self) {
        self.timers.clear();
        self.pending_open = None;
        if let Some(mut link) = self.link.take() {
            if self.session.is_connected() {
                link.send(encode_packet(&Packet::Disconnect));
            }
            link.close(self.config.close_grace).await;
        }
        self.reset_connection_state();
        self.session.reconnect_attempts = 0;
        let was = self.session.status;
        self.enter(Phase::Disconnected);
        if was != ConnectionStatus::Disconnected {
            info!(reason = %CloseReason::Local, "disconnected");
        }
    }

    // -------------------------------------------------------------------------
    // attempts
    // -------------------------------------------------------------------------

    fn begin_attempt(&mut self) {
        self.session.epoch += 1;
        self.reset_connection_state();
        self.timers.cancel(TimerKind::Backoff);
        self.timers
            .arm(TimerKind::ConnectTimeout, self.config.connect_timeout);

        let connector = Arc::clone(&self.connector);
        let url = self.config.url.clone();
        self.pending_open = Some(Box::pin(async move { connector.open(&url).await }));

        info!(
            epoch = self.session.epoch,
            attempt = self.session.reconnect_attempts,
            url = %self.config.url,
            "opening connection"
        );
        self.enter(Phase::Connecting);
    }

    fn on_opened(&mut self, result: Result<Link, TransportError>) {
        self.pending_open = None;
        match result {
            Ok(link) => {
                debug!(epoch = self.session.epoch, "transport open; awaiting handshake");
                self.link = Some(link);
            }
            Err(error) => self.fail_attempt(&error.to_string()),
        }
    }

    /// Count a failed attempt and either schedule the next one or give up.
    fn fail_attempt(&mut self, reason: &str) {
        self.link = None;
        self.pending_open = None;
        self.timers.clear();
        self.reset_connection_state();

        self.session.reconnect_attempts = self.session.reconnect_attempts.saturating_add(1);
        let attempts = self.session.reconnect_attempts;
        warn!(attempts, %reason, "connection attempt failed");

        if self.config.backoff.exhausted(attempts) {
            error!(attempts, "giving up on the tracking server");
            self.session.terminal = true;
            self.session.last_error = Some(format!(
                "Could not reach the tracking server after {attempts} attempts ({reason}). \
                 Check your connection and reconnect manually."
            ));
            self.enter(Phase::Disconnected);
            return;
        }

        self.session.last_error = Some(reason.to_owned());
        // The first retry waits the initial delay.
        self.schedule_reconnect(self.config.backoff.next_delay(attempts - 1));
    }

    fn schedule_reconnect(&mut self, delay: Duration) {
        info!(
            attempts = self.session.reconnect_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "reconnect scheduled"
        );
        self.session.next_retry_in = Some(delay);
        self.timers.arm(TimerKind::Backoff, delay);
        self.enter(Phase::Reconnecting);
    }

    // -------------------------------------------------------------------------
    // link
    // -------------------------------------------------------------------------

    fn on_link_event(&mut self, event: Option<LinkEvent>) {
        match event {
            Some(LinkEvent::Text(text)) => match decode_packet(&text) {
                Ok(packet) => self.on_packet(packet),
                Err(error) => warn!(%error, "dropping malformed packet"),
            },
            Some(LinkEvent::Closed(reason)) => self.on_link_closed(reason),
            None => self.on_link_closed(CloseReason::Network("link dropped".to_owned())),
        }
    }

    fn on_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Open(handshake) => {
                if self.engine_open {
                    debug!("duplicate engine.io open ignored");
                    return;
                }
                self.engine_open = true;
                debug!(
                    sid = %handshake.sid,
                    ping_interval = handshake.ping_interval,
                    "engine.io session open"
                );
                let auth = self
                    .config
                    .auth_token
                    .as_ref()
                    .map(|token| json!({ "token": token }));
                self.send_packet(&Packet::Connect(auth));
            }
            Packet::Ping => self.send_packet(&Packet::Pong),
            Packet::Pong | Packet::Noop => {}
            Packet::Close | Packet::Disconnect => self.on_link_closed(CloseReason::Server),
            Packet::Connect(ref payload) => match packet.connect_sid() {
                Some(sid) => {
                    let sid = sid.to_owned();
                    self.on_connected(sid);
                }
                None => warn!(?payload, "connect ack without a socket id"),
            },
            Packet::ConnectError(_) => {
                let message = packet
                    .connect_error_message()
                    .unwrap_or_else(|| "unknown reason".to_owned());
                self.fail_attempt(&TransportError::Rejected(message).to_string());
            }
            Packet::Event { name, data } => match InboundEvent::decode(&name, data) {
                Ok(event) => self.on_inbound(event),
                Err(error) => warn!(event = %name, %error, "dropping inbound event"),
            },
        }
    }

    fn on_connected(&mut self, socket_id: String) {
        match self.session.status {
            ConnectionStatus::Connecting => {}
            ConnectionStatus::Connected => {
                debug!(%socket_id, "duplicate connect ack ignored");
                return;
            }
            status => {
                debug!(%status, "connect ack outside of an attempt ignored");
                return;
            }
        }

        self.timers.cancel(TimerKind::ConnectTimeout);
        self.session.reconnect_attempts = 0;
        self.session.last_error = None;
        self.session.terminal = false;
        info!(%socket_id, epoch = self.session.epoch, "connected");
        self.enter(Phase::Connected(socket_id));

        self.timers.arm(TimerKind::JoinSettle, self.config.join_settle);
        self.timers
            .arm(TimerKind::HeartbeatInterval, self.config.heartbeat.interval);
    }

    fn on_inbound(&mut self, event: InboundEvent) {
        match &event {
            InboundEvent::Pong(PingPayload { timestamp }) => {
                if let Some(latency) = self.heartbeat.on_pong(*timestamp) {
                    self.timers.cancel(TimerKind::HeartbeatTimeout);
                    debug!(latency_ms = latency.as_millis(), "heartbeat answered");
                    self.set_latency(Some(latency));
                }
            }
            InboundEvent::ServerShutdown(notice) => {
                warn!(message = %notice.message, "server is shutting down");
            }
            InboundEvent::Error(notice) => warn!(message = %notice.message, "server reported an error"),
            InboundEvent::ConnectionConfirmed(confirmed) => {
                debug!(socket_id = ?confirmed.socket_id, "connection confirmed");
            }
            _ => {}
        }
        self.dispatch(ClientEvent::Inbound {
            epoch: self.session.epoch,
            event,
        });
    }

    fn on_link_closed(&mut self, reason: CloseReason) {
        let was_connected = self.session.is_connected();
        self.link = None;
        self.pending_open = None;
        self.timers.clear();
        self.reset_connection_state();

        if !reason.reconnects() {
            self.enter(Phase::Disconnected);
            return;
        }
        if was_connected {
            warn!(%reason, "connection lost");
            self.session.last_error = Some(reason.to_string());
            self.schedule_reconnect(self.config.backoff.next_delay(0));
        } else {
            self.fail_attempt(&reason.to_string());
        }
    }

    // -------------------------------------------------------------------------
    // timers
    // -------------------------------------------------------------------------

    fn on_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::ConnectTimeout => {
                if self.session.status == ConnectionStatus::Connecting {
                    self.fail_attempt(&TransportError::Timeout.to_string());
                }
            }
            TimerKind::Backoff => {
                if self.session.status == ConnectionStatus::Reconnecting {
                    self.begin_attempt();
                }
            }
            TimerKind::JoinSettle => self.send_join(),
            TimerKind::HeartbeatInterval => {
                if !self.session.is_connected() {
                    return;
                }
                if self.heartbeat.awaiting_pong() {
                    // The previous ping outlived the interval without an answer.
                    self.timers.cancel(TimerKind::HeartbeatTimeout);
                    if self.miss_heartbeat() {
                        return;
                    }
                }
                let timestamp = crate::now_ms();
                self.heartbeat.begin(timestamp);
                self.send_event(&OutboundEvent::Ping(PingPayload { timestamp }));
                self.timers
                    .arm(TimerKind::HeartbeatTimeout, self.config.heartbeat.timeout);
                self.timers
                    .arm(TimerKind::HeartbeatInterval, self.config.heartbeat.interval);
            }
            TimerKind::HeartbeatTimeout => {
                self.miss_heartbeat();
            }
            TimerKind::TypingIdle => self.stop_typing(),
        }
    }

    /// Count an unanswered ping. Returns true when it closed the link.
    fn miss_heartbeat(&mut self) -> bool {
        let misses = self.heartbeat.on_timeout();
        warn!(misses, "heartbeat timed out; latency unknown");
        self.set_latency(None);
        if misses >= self.config.heartbeat.max_misses {
            self.on_link_closed(CloseReason::HeartbeatLost);
            return true;
        }
        false
    }

    fn send_join(&mut self) {
        if self.joined || !self.session.is_connected() {
            return;
        }
        self.joined = true;
        let last = self.last_location.as_ref();
        let join = JoinTracking {
            name: self.identity.name.clone(),
            role: self.identity.role,
            session_id: self.identity.session_id.clone(),
            location: last.map(|report| report.location),
            speed: last.and_then(|report| report.speed),
            accuracy: last.and_then(|report| report.accuracy),
            heading: last.and_then(|report| report.heading),
        };
        info!(name = %join.name, role = join.role.as_str(), "joining tracking");
        self.send_event(&OutboundEvent::JoinTracking(join));
    }

    fn stop_typing(&mut self) {
        self.timers.cancel(TimerKind::TypingIdle);
        if self.typing {
            self.typing = false;
            self.send_event(&OutboundEvent::TypingStop);
        }
    }

    // -------------------------------------------------------------------------
    // state
    // -------------------------------------------------------------------------

    /// Per-connection state that never survives into the next attempt.
    fn reset_connection_state(&mut self) {
        self.heartbeat.reset();
        self.engine_open = false;
        self.joined = false;
        self.typing = false;
    }

    /// The only place `status` and `socket_id` change.
    fn enter(&mut self, phase: Phase) {
        let (status, socket_id) = match phase {
            Phase::Disconnected => (ConnectionStatus::Disconnected, None),
            Phase::Connecting => (ConnectionStatus::Connecting, None),
            Phase::Connected(socket_id) => (ConnectionStatus::Connected, Some(socket_id)),
            Phase::Reconnecting => (ConnectionStatus::Reconnecting, None),
        };
        let changed = self.session.status != status;
        self.session.status = status;
        self.session.socket_id = socket_id;
        if status != ConnectionStatus::Reconnecting {
            self.session.next_retry_in = None;
        }
        if status != ConnectionStatus::Connected {
            self.set_latency(None);
        }
        self.publish();
        if changed {
            self.dispatch(ClientEvent::Status {
                status,
                epoch: self.session.epoch,
            });
        }
    }

    fn set_latency(&mut self, latency: Option<Duration>) {
        if latency.is_none() && self.session.latency.is_none() {
            return;
        }
        self.session.latency = latency;
        self.publish();
        self.dispatch(ClientEvent::Latency(latency));
    }

    fn publish(&self) {
        self.session_tx.send_replace(self.session.clone());
    }

    fn dispatch(&mut self, event: ClientEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn send_event(&self, event: &OutboundEvent) {
        if !self.session.is_connected() {
            debug!(event = event.name(), "not connected; event dropped");
            return;
        }
        self.send_packet(&event.to_packet());
    }

    fn send_packet(&self, packet: &Packet) {
        let Some(link) = &self.link else {
            return;
        };
        if !link.send(encode_packet(packet)) {
            debug!("link writer gone; packet dropped");
        }
    }
}

async fn opening(
    pending: &mut Option<BoxFuture<'static, Result<Link, TransportError>>>,
) -> Result<Link, TransportError> {
    match pending {
        Some(open) => open.await,
        None => std::future::pending().await,
    }
}

async fn link_event(link: &mut Option<Link>) -> Option<LinkEvent> {
    match link {
        Some(link) => link.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
