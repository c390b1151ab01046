//! The connection state machine.
//!
//! Every method that touches state runs on the [`EventThread`]. Public
//! methods enqueue; listeners and I/O completions are already there.
//! The state lock is never held while emitting or calling into a
//! transport.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tracing::{debug, error, trace, warn};

use crate::emitter::{Emitter, ListenerId};
use crate::error::{Error, Result};
use crate::protocol::{HandshakeData, PROTOCOL, Packet, PacketData, PacketType};
use crate::thread::EventThread;
use crate::transport::{
    self, HttpClient, PollingTransport, ReqwestHttpClient, Transport, TransportEvent,
    TransportKind, TransportOptions, TungsteniteConnector, WebSocketConnector, WebSocketTransport,
};
use crate::util::Query;

use super::event::{EVENT_DRAIN, EVENT_FLUSH, EVENT_UPGRADE, EVENT_UPGRADE_ERROR, SocketEvent};
use super::heartbeat::Heartbeat;
use super::memory::UpgradeMemory;
use super::options::{SocketOptions, TransportOverrides, normalize_path};
use super::probe::Probe;

// ============================================================================
// ReadyState
// ============================================================================

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Waiting for the handshake.
    Opening,
    /// Handshake done.
    Open,
    /// `close()` waits for the buffer to drain or an upgrade to finish.
    Closing,
    /// Terminal.
    Closed,
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        })
    }
}

// ============================================================================
// Config
// ============================================================================

/// Resolved, immutable configuration.
#[derive(Debug)]
struct Config {
    hostname: String,
    port: u16,
    secure: bool,
    path: String,
    transports: Vec<TransportKind>,
    upgrade: bool,
    remember_upgrade: bool,
    query: Query,
    timestamp_requests: bool,
    timestamp_param: String,
    extra_headers: Vec<(String, String)>,
    transport_options: FxHashMap<TransportKind, TransportOverrides>,
}

impl From<&SocketOptions> for Config {
    fn from(options: &SocketOptions) -> Self {
        Self {
            hostname: options.resolved_hostname(),
            port: options.resolved_port(),
            secure: options.secure,
            path: options.resolved_path(),
            transports: options.transports.clone(),
            upgrade: options.upgrade,
            remember_upgrade: options.remember_upgrade,
            query: options.query.clone(),
            timestamp_requests: options.timestamp_requests,
            timestamp_param: options.timestamp_param.clone(),
            extra_headers: options.extra_headers.clone(),
            transport_options: options.transport_options.clone(),
        }
    }
}

// ============================================================================
// State
// ============================================================================

#[derive(Default)]
struct State {
    ready_state: Option<ReadyState>,
    id: Option<String>,
    upgrades: Vec<TransportKind>,
    ping_interval: Duration,
    ping_timeout: Duration,
    max_payload: Option<u64>,
    write_buffer: VecDeque<Packet>,
    /// Length of the prefix handed to the transport by the last flush.
    prev_buffer_len: usize,
    upgrading: bool,
    /// One-shot `flush` listeners carrying send acknowledgements.
    acks: Vec<ListenerId>,
    transport: Option<Arc<dyn Transport>>,
    heartbeat: Heartbeat,
}

// ============================================================================
// SocketInner
// ============================================================================

pub(crate) struct SocketInner {
    config: Config,
    emitter: Emitter<SocketEvent>,
    state: Mutex<State>,
    event_thread: EventThread,
    upgrade_memory: UpgradeMemory,
    runtime: Handle,
    http_client: Arc<dyn HttpClient>,
    connector: Arc<dyn WebSocketConnector>,
}

impl Drop for SocketInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.heartbeat.stop();
        if let Some(transport) = state.transport.take()
            && matches!(state.ready_state, Some(ReadyState::Opening | ReadyState::Open | ReadyState::Closing))
        {
            trace!("Socket dropped - closing transport");
            transport.core().emitter().off_all();
            transport.close();
        }
    }
}

impl SocketInner {
    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub(crate) const fn emitter(&self) -> &Emitter<SocketEvent> {
        &self.emitter
    }

    #[inline]
    pub(crate) const fn upgrade_memory(&self) -> &UpgradeMemory {
        &self.upgrade_memory
    }

    pub(crate) fn ready_state(&self) -> Option<ReadyState> {
        self.state.lock().ready_state
    }

    pub(crate) fn current_transport(&self) -> Option<Arc<dyn Transport>> {
        self.state.lock().transport.clone()
    }

    pub(crate) fn set_upgrading(&self, upgrading: bool) {
        self.state.lock().upgrading = upgrading;
    }

    fn filter_upgrades(&self, upgrades: &[String]) -> Vec<TransportKind> {
        upgrades
            .iter()
            .filter_map(|name| name.parse::<TransportKind>().ok())
            .filter(|kind| self.config.transports.contains(kind))
            .collect()
    }

    /// Wraps `handler` so it only runs while the socket is alive.
    fn listener<E, F>(self: &Arc<Self>, handler: F) -> impl Fn(&E) + Send + Sync + 'static
    where
        F: Fn(&Arc<Self>, &E) + Send + Sync + 'static,
    {
        let weak: Weak<Self> = Arc::downgrade(self);
        move |event| {
            if let Some(socket) = weak.upgrade() {
                handler(&socket, event);
            }
        }
    }

    // ========================================================================
    // Open
    // ========================================================================

    fn open(self: &Arc<Self>) {
        if let Some(state) = self.ready_state() {
            debug!(%state, "Socket already opened");
            return;
        }

        let transports = &self.config.transports;
        let kind = if self.config.remember_upgrade
            && self.upgrade_memory.get()
            && transports.contains(&TransportKind::WebSocket)
        {
            TransportKind::WebSocket
        } else if let Some(first) = transports.first() {
            *first
        } else {
            let socket = Arc::clone(self);
            self.event_thread.next_tick(move || {
                socket
                    .emitter
                    .emit(SocketEvent::Error(Arc::new(Error::NoTransports)));
            });
            return;
        };

        self.state.lock().ready_state = Some(ReadyState::Opening);

        let transport = self.create_transport(kind);
        self.set_transport(Arc::clone(&transport));
        transport.open();
    }

    pub(crate) fn create_transport(self: &Arc<Self>, kind: TransportKind) -> Arc<dyn Transport> {
        debug!(transport = %kind, "Creating transport");

        let config = &self.config;
        let overrides = config.transport_options.get(&kind);

        let mut query = config.query.clone();
        if let Some(extra) = overrides.and_then(|o| o.query.as_ref()) {
            query.extend_from(extra);
        }
        query.set("EIO", PROTOCOL.to_string());
        query.set("transport", kind.name());
        if let Some(id) = self.state.lock().id.clone() {
            query.set("sid", id);
        }

        let options = TransportOptions {
            hostname: overrides
                .and_then(|o| o.hostname.clone())
                .unwrap_or_else(|| config.hostname.clone()),
            port: overrides.and_then(|o| o.port).unwrap_or(config.port),
            secure: overrides.and_then(|o| o.secure).unwrap_or(config.secure),
            path: overrides
                .and_then(|o| o.path.as_deref())
                .map_or_else(|| config.path.clone(), normalize_path),
            query,
            timestamp_requests: overrides
                .and_then(|o| o.timestamp_requests)
                .unwrap_or(config.timestamp_requests),
            timestamp_param: overrides
                .and_then(|o| o.timestamp_param.clone())
                .unwrap_or_else(|| config.timestamp_param.clone()),
            extra_headers: overrides
                .and_then(|o| o.extra_headers.clone())
                .unwrap_or_else(|| config.extra_headers.clone()),
            http_client: Arc::clone(&self.http_client),
            connector: Arc::clone(&self.connector),
            runtime: self.runtime.clone(),
            event_thread: self.event_thread.clone(),
        };

        let transport: Arc<dyn Transport> = match kind {
            TransportKind::Polling => Arc::new(PollingTransport::new(options)),
            TransportKind::WebSocket => Arc::new(WebSocketTransport::new(options)),
        };

        self.emitter.emit(SocketEvent::Transport(kind));
        transport
    }

    pub(crate) fn set_transport(self: &Arc<Self>, transport: Arc<dyn Transport>) {
        debug!(transport = %transport.kind(), "Setting transport");

        let previous = self.state.lock().transport.replace(Arc::clone(&transport));
        if let Some(previous) = previous {
            debug!(transport = %previous.kind(), "Clearing existing transport");
            previous.core().emitter().off_all();
        }

        let events = transport.core().emitter();
        events.on(
            transport::EVENT_DRAIN,
            self.listener(|socket, _: &TransportEvent| socket.on_drain()),
        );
        events.on(
            transport::EVENT_PACKET,
            self.listener(|socket, event: &TransportEvent| {
                if let TransportEvent::Packet(packet) = event {
                    socket.on_packet(packet.clone());
                }
            }),
        );
        events.on(
            transport::EVENT_ERROR,
            self.listener(|socket, event: &TransportEvent| {
                if let TransportEvent::Error(error) = event {
                    socket.on_error(Arc::clone(error));
                }
            }),
        );
        events.on(
            transport::EVENT_CLOSE,
            self.listener(|socket, _: &TransportEvent| socket.on_close("transport close", None)),
        );
    }

    // ========================================================================
    // Inbound
    // ========================================================================

    fn on_packet(self: &Arc<Self>, packet: Packet) {
        let ready_state = self.ready_state();
        match ready_state {
            Some(ReadyState::Opening) => {
                if !matches!(packet.kind, PacketType::Open | PacketType::Error) {
                    warn!(kind = %packet.kind, "Packet before handshake ignored");
                    return;
                }
            }
            Some(ReadyState::Open | ReadyState::Closing) => {}
            state => {
                debug!(?state, kind = %packet.kind, "Packet received with socket not open");
                return;
            }
        }

        trace!(kind = %packet.kind, "Socket received packet");
        self.emitter.emit(SocketEvent::Packet(packet.clone()));

        if ready_state == Some(ReadyState::Open) {
            self.reset_heartbeat();
        }

        match packet.kind {
            PacketType::Open => self.on_handshake_packet(&packet),
            PacketType::Ping => {
                self.emitter.emit(SocketEvent::Ping);
                self.send_packet(Packet::new(PacketType::Pong), None);
                self.emitter.emit(SocketEvent::Pong);
            }
            PacketType::Error => {
                let code = packet.text().map(str::to_string);
                self.on_error(Arc::new(Error::server(code)));
            }
            PacketType::Message => {
                let data = packet
                    .data
                    .unwrap_or_else(|| PacketData::Text(String::new()));
                self.emitter.emit(SocketEvent::Data(data.clone()));
                self.emitter.emit(SocketEvent::Message(data));
            }
            _ => {}
        }
    }

    fn on_handshake_packet(self: &Arc<Self>, packet: &Packet) {
        if self.ready_state() != Some(ReadyState::Opening) {
            debug!("Duplicate handshake ignored");
            return;
        }

        let parsed = packet
            .text()
            .ok_or_else(|| Error::handshake("missing handshake data"))
            .and_then(HandshakeData::parse);

        match parsed {
            Ok(data) => self.on_handshake(data),
            Err(e) => self.on_error(Arc::new(e)),
        }
    }

    fn on_handshake(self: &Arc<Self>, data: HandshakeData) {
        self.emitter.emit(SocketEvent::Handshake(data.clone()));

        let upgrades = self.filter_upgrades(&data.upgrades);
        let transport = {
            let mut state = self.state.lock();
            state.id = Some(data.sid.clone());
            state.upgrades = upgrades;
            state.ping_interval = data.ping_interval();
            state.ping_timeout = data.ping_timeout();
            state.max_payload = data.max_payload;
            state.transport.clone()
        };

        if let Some(transport) = transport {
            transport.core().set_query("sid", &data.sid);
        }

        self.on_open();

        if self.ready_state() == Some(ReadyState::Closed) {
            return;
        }
        self.reset_heartbeat();
    }

    fn on_open(self: &Arc<Self>) {
        debug!("Socket open");

        let kind = {
            let mut state = self.state.lock();
            state.ready_state = Some(ReadyState::Open);
            state.transport.as_ref().map(|t| t.kind())
        };

        self.upgrade_memory
            .set(kind == Some(TransportKind::WebSocket));
        self.emitter.emit(SocketEvent::Open);
        self.flush();

        let (ready_state, upgrades) = {
            let state = self.state.lock();
            (state.ready_state, state.upgrades.clone())
        };

        if ready_state == Some(ReadyState::Open)
            && self.config.upgrade
            && kind == Some(TransportKind::Polling)
        {
            debug!("Starting upgrade probes");
            for upgrade in upgrades.into_iter().filter(|u| Some(*u) != kind) {
                Probe::start(self, upgrade);
            }
        }
    }

    // ========================================================================
    // Heartbeat
    // ========================================================================

    fn reset_heartbeat(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let thread = self.event_thread.clone();

        let mut state = self.state.lock();
        let deadline = state.ping_interval + state.ping_timeout;
        state.heartbeat.reset(&self.runtime, deadline, move |generation| {
            thread.exec(move || {
                if let Some(socket) = weak.upgrade() {
                    socket.on_heartbeat_timeout(generation);
                }
            });
        });
    }

    fn on_heartbeat_timeout(self: &Arc<Self>, generation: u64) {
        let expired = {
            let state = self.state.lock();
            state.heartbeat.is_current(generation) && state.ready_state != Some(ReadyState::Closed)
        };
        if expired {
            debug!("Ping timeout");
            self.on_close("ping timeout", None);
        }
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    fn on_drain(self: &Arc<Self>) {
        let drained = {
            let mut state = self.state.lock();
            let sent = state.prev_buffer_len.min(state.write_buffer.len());
            state.write_buffer.drain(..sent);
            state.prev_buffer_len = 0;
            state.write_buffer.is_empty()
        };

        if drained {
            self.emitter.emit(SocketEvent::Drain);
        } else {
            self.flush();
        }
    }

    pub(crate) fn flush(self: &Arc<Self>) {
        let (transport, packets) = {
            let mut state = self.state.lock();
            let Some(transport) = state.transport.clone() else {
                return;
            };
            if state.ready_state == Some(ReadyState::Closed)
                || state.upgrading
                || state.write_buffer.is_empty()
                || !transport.core().writable()
            {
                return;
            }
            state.prev_buffer_len = state.write_buffer.len();
            (transport, state.write_buffer.iter().cloned().collect::<Vec<_>>())
        };

        debug!(count = packets.len(), "Flushing packets in socket");
        if let Err(e) = transport.send(packets) {
            error!(error = %e, "Flush on transport that is not open");
            self.state.lock().prev_buffer_len = 0;
            return;
        }

        // Acks registered from inside a flush listener wait for the next one.
        let fired = std::mem::take(&mut self.state.lock().acks);
        trace!(acks = fired.len(), "Flushed");
        self.emitter.emit(SocketEvent::Flush);
    }

    fn send_packet(self: &Arc<Self>, packet: Packet, ack: Option<Box<dyn FnOnce() + Send>>) {
        if matches!(
            self.ready_state(),
            Some(ReadyState::Closing | ReadyState::Closed)
        ) {
            debug!(kind = %packet.kind, "Socket closing - packet dropped");
            return;
        }

        self.emitter.emit(SocketEvent::PacketCreate(packet.clone()));
        self.state.lock().write_buffer.push_back(packet);

        if let Some(ack) = ack {
            let ack = Mutex::new(Some(ack));
            let id = self.emitter.once(EVENT_FLUSH, move |_| {
                if let Some(ack) = ack.lock().take() {
                    ack();
                }
            });
            self.state.lock().acks.push(id);
        }

        self.flush();
    }

    // ========================================================================
    // Close
    // ========================================================================

    fn close(self: &Arc<Self>) {
        let (buffered, upgrading) = {
            let mut state = self.state.lock();
            if !matches!(
                state.ready_state,
                Some(ReadyState::Opening | ReadyState::Open)
            ) {
                return;
            }
            state.ready_state = Some(ReadyState::Closing);
            (!state.write_buffer.is_empty(), state.upgrading)
        };

        if buffered {
            debug!("Waiting for write buffer to drain before closing");
            self.emitter.once(
                EVENT_DRAIN,
                self.listener(|socket, _: &SocketEvent| {
                    if socket.state.lock().upgrading {
                        socket.wait_for_upgrade();
                    } else {
                        socket.force_close();
                    }
                }),
            );
        } else if upgrading {
            self.wait_for_upgrade();
        } else {
            self.force_close();
        }
    }

    /// Closes once the upgrade in progress either commits or fails.
    fn wait_for_upgrade(self: &Arc<Self>) {
        debug!("Waiting for upgrade to finish before closing");

        let registrations: Arc<Mutex<Vec<(&'static str, ListenerId)>>> =
            Arc::new(Mutex::new(Vec::new()));

        let finish = {
            let registrations = Arc::clone(&registrations);
            move |socket: &Arc<Self>, failed: bool| {
                // A losing probe reports while the winner is still switching.
                if failed && socket.state.lock().upgrading {
                    return;
                }
                let registrations = std::mem::take(&mut *registrations.lock());
                if registrations.is_empty() {
                    return;
                }
                for (event, id) in registrations {
                    socket.emitter.off(event, id);
                }
                socket.force_close();
            }
        };
        let finish = Arc::new(finish);

        let on_upgrade = self.emitter.on(EVENT_UPGRADE, {
            let finish = Arc::clone(&finish);
            self.listener(move |socket, _: &SocketEvent| finish(socket, false))
        });
        let on_upgrade_error = self.emitter.on(
            EVENT_UPGRADE_ERROR,
            self.listener(move |socket, _: &SocketEvent| finish(socket, true)),
        );

        *registrations.lock() = vec![
            (EVENT_UPGRADE, on_upgrade),
            (EVENT_UPGRADE_ERROR, on_upgrade_error),
        ];
    }

    fn force_close(self: &Arc<Self>) {
        debug!("Socket closing - telling transport to close");
        self.on_close("forced close", None);
    }

    fn on_error(self: &Arc<Self>, error: Arc<Error>) {
        debug!(error = %error, "Socket error");
        self.upgrade_memory.set(false);
        self.emitter.emit(SocketEvent::Error(Arc::clone(&error)));
        self.on_close("transport error", Some(error));
    }

    fn on_close(self: &Arc<Self>, reason: &str, cause: Option<Arc<Error>>) {
        let transport = {
            let mut state = self.state.lock();
            if !matches!(
                state.ready_state,
                Some(ReadyState::Opening | ReadyState::Open | ReadyState::Closing)
            ) {
                return;
            }
            state.heartbeat.stop();
            state.ready_state = Some(ReadyState::Closed);
            state.id = None;
            state.transport.clone()
        };

        debug!(reason, "Socket close");

        if let Some(transport) = transport {
            let events = transport.core().emitter();
            events.off_event(transport::EVENT_CLOSE);
            Arc::clone(&transport).close();
            events.off_all();
        }

        self.emitter.emit(SocketEvent::Close {
            reason: reason.to_string(),
            cause,
        });

        let acks = {
            let mut state = self.state.lock();
            state.write_buffer.clear();
            state.prev_buffer_len = 0;
            std::mem::take(&mut state.acks)
        };
        for id in acks {
            self.emitter.off(EVENT_FLUSH, id);
        }
    }
}

// ============================================================================
// Socket
// ============================================================================

/// Engine.IO client connection.
///
/// Cloning yields another handle to the same connection. Dropping the last
/// handle closes the transport.
///
/// # Example
///
/// ```ignore
/// use engineio_client::{Socket, SocketEvent};
///
/// let socket = Socket::from_uri("http://localhost:3000")?;
/// socket.on("message", |event| {
///     if let SocketEvent::Message(data) = event {
///         println!("{data:?}");
///     }
/// });
/// socket.open();
/// socket.send("hello");
/// ```
#[derive(Clone)]
pub struct Socket {
    inner: Arc<SocketInner>,
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Socket")
            .field("id", &state.id)
            .field("ready_state", &state.ready_state)
            .field("transport", &state.transport.as_ref().map(|t| t.kind()))
            .field("upgrading", &state.upgrading)
            .field("buffered", &state.write_buffer.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Socket - Constructors
// ============================================================================

impl Socket {
    /// Creates a socket. Nothing connects until [`Socket::open`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid options or when no runtime is
    /// given and none is running.
    pub fn new(options: SocketOptions) -> Result<Self> {
        options.validate()?;

        let runtime = match &options.runtime {
            Some(runtime) => runtime.clone(),
            None => Handle::try_current().map_err(|_| {
                Error::config("No tokio runtime: create the socket inside one or set a runtime")
            })?,
        };

        let http_client = options
            .http_client
            .clone()
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()) as Arc<dyn HttpClient>);
        let connector = options
            .connector
            .clone()
            .unwrap_or_else(|| Arc::new(TungsteniteConnector) as Arc<dyn WebSocketConnector>);

        Ok(Self {
            inner: Arc::new(SocketInner {
                config: Config::from(&options),
                emitter: Emitter::new(),
                state: Mutex::new(State::default()),
                event_thread: options.event_thread.clone().unwrap_or_default(),
                upgrade_memory: options
                    .upgrade_memory
                    .clone()
                    .unwrap_or_else(UpgradeMemory::shared),
                runtime,
                http_client,
                connector,
            }),
        })
    }

    /// Creates a socket for `uri` with default options.
    ///
    /// # Errors
    ///
    /// See [`SocketOptions::from_uri`] and [`Socket::new`].
    pub fn from_uri(uri: &str) -> Result<Self> {
        Self::new(SocketOptions::from_uri(uri)?)
    }
}

// ============================================================================
// Socket - Lifecycle
// ============================================================================

impl Socket {
    /// Starts connecting. A socket opens at most once.
    pub fn open(&self) {
        let inner = Arc::clone(&self.inner);
        self.inner.event_thread.exec(move || inner.open());
    }

    /// Closes the connection after buffered packets are written and any
    /// upgrade in progress has settled.
    pub fn close(&self) {
        let inner = Arc::clone(&self.inner);
        self.inner.event_thread.exec(move || inner.close());
    }

    /// Sends a text message.
    pub fn send(&self, data: impl Into<String>) {
        self.enqueue(Packet::message(data.into()), None);
    }

    /// Sends a text message; `ack` runs once the message is flushed.
    pub fn send_with_ack<F>(&self, data: impl Into<String>, ack: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Packet::message(data.into()), Some(Box::new(ack)));
    }

    /// Sends a binary message.
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) {
        self.enqueue(Packet::message(data.into()), None);
    }

    /// Sends a binary message; `ack` runs once the message is flushed.
    pub fn send_binary_with_ack<F>(&self, data: impl Into<Vec<u8>>, ack: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Packet::message(data.into()), Some(Box::new(ack)));
    }

    /// Alias of [`Socket::send`].
    #[inline]
    pub fn write(&self, data: impl Into<String>) {
        self.send(data);
    }

    /// Alias of [`Socket::send_binary`].
    #[inline]
    pub fn write_binary(&self, data: impl Into<Vec<u8>>) {
        self.send_binary(data);
    }

    fn enqueue(&self, packet: Packet, ack: Option<Box<dyn FnOnce() + Send>>) {
        let inner = Arc::clone(&self.inner);
        self.inner
            .event_thread
            .exec(move || inner.send_packet(packet, ack));
    }
}

// ============================================================================
// Socket - Events
// ============================================================================

impl Socket {
    /// Registers a listener. See [`super::event`] for event names.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&SocketEvent) + Send + Sync + 'static,
    {
        self.inner.emitter.on(event, listener)
    }

    /// Registers a listener that runs at most once.
    pub fn once<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&SocketEvent) + Send + Sync + 'static,
    {
        self.inner.emitter.once(event, listener)
    }

    /// Removes one listener.
    pub fn off(&self, event: &str, id: ListenerId) {
        self.inner.emitter.off(event, id);
    }

    /// Removes every listener of `event`.
    pub fn off_event(&self, event: &str) {
        self.inner.emitter.off_event(event);
    }

    /// The underlying emitter.
    #[inline]
    #[must_use]
    pub fn emitter(&self) -> &Emitter<SocketEvent> {
        &self.inner.emitter
    }
}

// ============================================================================
// Socket - Accessors
// ============================================================================

impl Socket {
    /// Session id, set by the handshake and cleared on close.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.inner.state.lock().id.clone()
    }

    /// Connection state, `None` before [`Socket::open`].
    #[must_use]
    pub fn ready_state(&self) -> Option<ReadyState> {
        self.inner.ready_state()
    }

    /// Kind of the active transport.
    #[must_use]
    pub fn transport_name(&self) -> Option<TransportKind> {
        self.inner.current_transport().map(|t| t.kind())
    }

    /// Upgrade candidates accepted from the handshake.
    #[must_use]
    pub fn upgrades(&self) -> Vec<TransportKind> {
        self.inner.state.lock().upgrades.clone()
    }

    /// Returns `true` while a probe is switching transports.
    #[must_use]
    pub fn is_upgrading(&self) -> bool {
        self.inner.state.lock().upgrading
    }

    /// Packets waiting to be written or acknowledged by `drain`.
    #[must_use]
    pub fn write_buffer_len(&self) -> usize {
        self.inner.state.lock().write_buffer.len()
    }

    /// Negotiated ping interval.
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        self.inner.state.lock().ping_interval
    }

    /// Negotiated ping timeout.
    #[must_use]
    pub fn ping_timeout(&self) -> Duration {
        self.inner.state.lock().ping_timeout
    }

    /// Largest payload the server accepts, if it said so.
    #[must_use]
    pub fn max_payload(&self) -> Option<u64> {
        self.inner.state.lock().max_payload
    }

    /// Resolved host name.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.inner.config.hostname
    }

    /// Resolved port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.config.port
    }

    /// Returns `true` when TLS is used.
    #[must_use]
    pub fn secure(&self) -> bool {
        self.inner.config.secure
    }

    /// Keeps the server's upgrade offers that are configured locally, in
    /// server order.
    #[must_use]
    pub fn filter_upgrades(&self, upgrades: &[String]) -> Vec<TransportKind> {
        self.inner.filter_upgrades(upgrades)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::emitter::EventName;
    use crate::test_utils::{FakeServer, HANDSHAKE, handshake, wait_until};
    use crate::transport::Frame;

    struct Harness {
        fake: Arc<FakeServer>,
        socket: Socket,
        events: Arc<Mutex<Vec<SocketEvent>>>,
        memory: UpgradeMemory,
    }

    impl Harness {
        fn new(options: SocketOptions) -> Self {
            let fake = FakeServer::new();
            let memory = options.upgrade_memory.clone().unwrap_or_default();
            let options = options
                .with_http_client(Arc::clone(&fake) as Arc<dyn HttpClient>)
                .with_connector(Arc::clone(&fake) as Arc<dyn WebSocketConnector>)
                .with_upgrade_memory(memory.clone());
            let socket = Socket::new(options).expect("valid options");

            let events = Arc::new(Mutex::new(Vec::new()));
            for name in [
                "open", "close", "message", "error", "handshake", "upgrading", "upgrade",
                "upgradeError", "packetCreate", "flush", "drain", "ping", "pong", "transport",
            ] {
                let events = Arc::clone(&events);
                socket.on(name, move |event| events.lock().push(event.clone()));
            }

            Self {
                fake,
                socket,
                events,
                memory,
            }
        }

        fn polling() -> Self {
            Self::new(SocketOptions::new().with_transports([TransportKind::Polling]))
        }

        fn names(&self) -> Vec<&'static str> {
            self.events.lock().iter().map(EventName::name).collect()
        }

        fn count(&self, name: &str) -> usize {
            self.names().iter().filter(|n| **n == name).count()
        }

        async fn wait_for(&self, name: &str) {
            wait_until(|| self.count(name) > 0).await;
        }

        fn close_reason(&self) -> Option<String> {
            self.events.lock().iter().find_map(|event| match event {
                SocketEvent::Close { reason, .. } => Some(reason.clone()),
                _ => None,
            })
        }

        async fn open_with(&self, handshake: &str) {
            self.fake.push_poll(handshake);
            self.socket.open();
            self.wait_for("open").await;
        }
    }

    #[tokio::test]
    async fn test_filter_upgrades() {
        let socket = Socket::new(SocketOptions::new().with_transports([TransportKind::Polling]))
            .expect("valid options");
        let offered = vec!["polling".to_string(), "websocket".to_string()];
        assert_eq!(socket.filter_upgrades(&offered), vec![TransportKind::Polling]);
    }

    #[tokio::test]
    async fn test_filter_upgrades_keeps_server_order() {
        let socket = Socket::new(SocketOptions::new()).expect("valid options");
        let offered = vec![
            "websocket".to_string(),
            "flashsocket".to_string(),
            "polling".to_string(),
        ];
        assert_eq!(
            socket.filter_upgrades(&offered),
            vec![TransportKind::WebSocket, TransportKind::Polling]
        );
    }

    #[tokio::test]
    async fn test_resolves_uri() {
        let socket = Socket::from_uri("wss://localhost:2020").expect("valid uri");
        assert_eq!(socket.hostname(), "localhost");
        assert_eq!(socket.port(), 2020);
        assert!(socket.secure());

        let socket = Socket::from_uri("http://[::1]:8080").expect("valid uri");
        assert_eq!(socket.hostname(), "::1");
        assert_eq!(socket.port(), 8080);
    }

    #[test]
    fn test_new_without_runtime_is_config_error() {
        let result = Socket::new(SocketOptions::new());
        assert!(result.is_err_and(|e| e.is_config_error()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_handshake_over_polling() {
        let h = Harness::polling();
        h.open_with(HANDSHAKE).await;

        assert_eq!(h.socket.id().as_deref(), Some("123"));
        assert_eq!(h.socket.ready_state(), Some(ReadyState::Open));
        assert_eq!(h.socket.transport_name(), Some(TransportKind::Polling));
        assert_eq!(h.socket.ping_interval(), Duration::from_millis(25_000));
        assert_eq!(h.socket.ping_timeout(), Duration::from_millis(20_000));
        assert_eq!(h.socket.max_payload(), Some(1_000_000));
        assert!(!h.memory.get());

        let names = h.names();
        let position = |name| names.iter().position(|n| *n == name);
        assert!(position("transport") < position("handshake"));
        assert!(position("handshake") < position("open"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_subsequent_requests_carry_sid() {
        let h = Harness::polling();
        h.open_with(HANDSHAKE).await;

        h.socket.send("hi");
        wait_until(|| !h.fake.posts().is_empty()).await;
        let uri = &h.fake.post_uris()[0];
        assert!(uri.starts_with("http://localhost/engine.io/?"));
        assert!(uri.contains("EIO=4"));
        assert!(uri.contains("transport=polling"));
        assert!(uri.contains("sid=123"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_receives_messages() {
        let h = Harness::polling();
        h.open_with(HANDSHAKE).await;

        h.fake.push_poll("4hello\x1ebAQID");
        wait_until(|| h.count("message") == 2).await;

        let messages: Vec<PacketData> = h
            .events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SocketEvent::Message(data) => Some(data.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            messages,
            vec![PacketData::from("hello"), PacketData::from(vec![1u8, 2, 3])]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_receives_empty_message() {
        let h = Harness::polling();
        h.open_with(HANDSHAKE).await;

        h.fake.push_poll("4\x1e4after");
        wait_until(|| h.count("message") == 2).await;

        let first = h.events.lock().iter().find_map(|event| match event {
            SocketEvent::Message(data) => Some(data.clone()),
            _ => None,
        });
        assert_eq!(first, Some(PacketData::from("")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_send_flushes_and_drains() {
        let h = Harness::polling();
        h.open_with(HANDSHAKE).await;

        let acked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&acked);
        h.socket.send_with_ack("a", move || flag.store(true, Ordering::SeqCst));
        h.socket.send_binary(vec![1u8, 2]);

        wait_until(|| h.count("drain") > 0 && h.socket.write_buffer_len() == 0).await;
        assert!(acked.load(Ordering::SeqCst));

        let posts = h.fake.posts().join("\x1e");
        assert!(posts.contains("4a"));
        assert!(posts.contains("bAQI="));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_packets_sent_while_writing_are_kept() {
        let h = Harness::polling();
        h.open_with(HANDSHAKE).await;

        h.fake.hold_posts(true);
        h.socket.send("first");
        wait_until(|| h.fake.posts().len() == 1).await;

        h.socket.send("second");
        h.socket.send("third");
        wait_until(|| h.socket.write_buffer_len() == 3).await;

        h.fake.hold_posts(false);
        wait_until(|| h.socket.write_buffer_len() == 0).await;
        assert_eq!(
            h.fake.posts(),
            vec!["4first".to_string(), "4second\x1e4third".to_string()]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replies_pong_to_ping() {
        let h = Harness::polling();
        h.open_with(HANDSHAKE).await;

        h.fake.push_poll("2");
        wait_until(|| h.count("pong") == 1).await;
        wait_until(|| h.fake.posts().contains(&"3".to_string())).await;

        let names = h.names();
        let ping = names.iter().position(|n| *n == "ping");
        let pong = names.iter().position(|n| *n == "pong");
        assert!(ping < pong);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_close_is_forced_and_sends_close_packet() {
        let h = Harness::polling();
        h.open_with(HANDSHAKE).await;

        h.socket.close();
        h.wait_for("close").await;

        assert_eq!(h.close_reason().as_deref(), Some("forced close"));
        assert_eq!(h.socket.ready_state(), Some(ReadyState::Closed));
        assert_eq!(h.socket.id(), None);
        wait_until(|| h.fake.posts().contains(&"1".to_string())).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_close_waits_for_drain() {
        let h = Harness::polling();
        h.open_with(HANDSHAKE).await;

        h.fake.hold_posts(true);
        h.socket.send("a");
        wait_until(|| h.fake.posts().len() == 1).await;
        h.socket.send("b");
        h.socket.close();

        wait_until(|| h.socket.ready_state() == Some(ReadyState::Closing)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.count("close"), 0);
        assert_eq!(h.fake.posts(), vec!["4a".to_string()]);

        h.fake.hold_posts(false);
        h.wait_for("close").await;
        assert_eq!(h.close_reason().as_deref(), Some("forced close"));
        wait_until(|| h.fake.posts().len() == 3).await;
        assert_eq!(
            h.fake.posts(),
            vec!["4a".to_string(), "4b".to_string(), "1".to_string()]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_send_after_close_is_dropped() {
        let h = Harness::polling();
        h.open_with(HANDSHAKE).await;

        h.socket.close();
        h.socket.send("late");
        h.wait_for("close").await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(h.count("packetCreate"), 0);
        assert!(!h.fake.posts().iter().any(|p| p.contains("late")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_close_emitted_once() {
        let h = Harness::polling();
        h.open_with(HANDSHAKE).await;

        h.socket.close();
        h.socket.close();
        h.fake.push_poll("1");
        h.wait_for("close").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.count("close"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_server_close_packet_closes_socket() {
        let h = Harness::polling();
        h.open_with(HANDSHAKE).await;

        h.fake.push_poll("1");
        h.wait_for("close").await;
        assert_eq!(h.close_reason().as_deref(), Some("transport close"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_heartbeat_timeout_closes() {
        let h = Harness::polling();
        h.open_with(&handshake("hb", &[], 50, 50)).await;

        h.wait_for("close").await;
        assert_eq!(h.close_reason().as_deref(), Some("ping timeout"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_packets_reset_heartbeat() {
        let h = Harness::polling();
        h.open_with(&handshake("hb", &[], 100, 100)).await;

        for _ in 0..6 {
            tokio::time::sleep(Duration::from_millis(80)).await;
            h.fake.push_poll("2");
        }
        assert_eq!(h.count("close"), 0);

        h.wait_for("close").await;
        assert_eq!(h.close_reason().as_deref(), Some("ping timeout"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_transport_error_closes_and_resets_memory() {
        let h = Harness::polling();
        h.open_with(HANDSHAKE).await;
        h.memory.set(true);

        h.fake.fail_next_poll(500);
        h.wait_for("close").await;

        assert_eq!(h.count("error"), 1);
        assert_eq!(h.close_reason().as_deref(), Some("transport error"));
        assert!(!h.memory.get());
        let cause = h.events.lock().iter().find_map(|event| match event {
            SocketEvent::Close { cause, .. } => cause.clone(),
            _ => None,
        });
        assert!(cause.is_some_and(|e| e.is_transport_error()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_malformed_packet_closes() {
        let h = Harness::polling();
        h.open_with(HANDSHAKE).await;

        h.fake.push_poll("4bye\x1ex");
        h.wait_for("close").await;
        assert_eq!(h.count("message"), 1);
        assert_eq!(h.count("error"), 1);
        assert_eq!(h.close_reason().as_deref(), Some("transport error"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_malformed_handshake_closes() {
        let h = Harness::polling();
        h.fake.push_poll("0{not json");
        h.socket.open();

        h.wait_for("close").await;
        assert_eq!(h.count("open"), 0);
        assert_eq!(h.close_reason().as_deref(), Some("transport error"));
        let cause = h.events.lock().iter().find_map(|event| match event {
            SocketEvent::Close { cause, .. } => cause.clone(),
            _ => None,
        });
        assert!(cause.is_some_and(|e| matches!(*e, Error::Json(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_no_transports_reports_error_on_next_tick() {
        let h = Harness::new(SocketOptions::new().with_transports([]));
        h.socket.open();
        h.wait_for("error").await;

        let error = h.events.lock().iter().find_map(|event| match event {
            SocketEvent::Error(e) => Some(e.to_string()),
            _ => None,
        });
        assert_eq!(error.as_deref(), Some("No transports available"));
        assert_eq!(h.socket.ready_state(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_twice_is_ignored() {
        let h = Harness::polling();
        h.fake.push_poll(HANDSHAKE);
        h.socket.open();
        h.socket.open();
        h.wait_for("open").await;
        assert_eq!(h.count("transport"), 1);
    }

    // ========================================================================
    // Upgrade
    // ========================================================================

    fn upgrading_harness() -> Harness {
        Harness::new(SocketOptions::new())
    }

    async fn probe_until_pong(h: &Harness) {
        h.open_with(&handshake("up", &["websocket"], 25_000, 20_000))
            .await;
        wait_until(|| h.fake.ws_connect_count() == 1).await;
        wait_until(|| h.fake.ws_sent().contains(&Frame::Text("2probe".into()))).await;
        h.fake.push_ws(Frame::Text("3probe".into()));
        h.wait_for("upgrading").await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upgrade_to_websocket() {
        let h = upgrading_harness();
        probe_until_pong(&h).await;

        assert!(h.socket.is_upgrading());
        assert!(h.memory.get());

        // The polling transport is still waiting on its GET.
        h.fake.push_poll("6");
        h.wait_for("upgrade").await;

        assert_eq!(h.socket.transport_name(), Some(TransportKind::WebSocket));
        assert!(!h.socket.is_upgrading());
        wait_until(|| h.fake.ws_sent().contains(&Frame::Text("5".into()))).await;
        assert!(h.fake.ws_uris()[0].contains("sid=up"));

        h.socket.send("over ws");
        wait_until(|| h.fake.ws_sent().contains(&Frame::Text("4over ws".into()))).await;
        assert_eq!(h.count("upgradeError"), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_send_while_upgrading_is_buffered() {
        let h = upgrading_harness();
        probe_until_pong(&h).await;

        h.socket.send("mid");
        wait_until(|| h.socket.write_buffer_len() == 1).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(h.fake.posts().is_empty());

        h.fake.push_poll("6");
        h.wait_for("upgrade").await;

        wait_until(|| h.fake.ws_sent().contains(&Frame::Text("4mid".into()))).await;
        let sent = h.fake.ws_sent();
        let upgrade = sent.iter().position(|f| *f == Frame::Text("5".into()));
        let mid = sent.iter().position(|f| *f == Frame::Text("4mid".into()));
        assert!(upgrade < mid);
        assert!(h.fake.posts().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_close_while_upgrading_waits_for_upgrade() {
        let h = upgrading_harness();
        probe_until_pong(&h).await;

        h.socket.close();
        wait_until(|| h.socket.ready_state() == Some(ReadyState::Closing)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.count("close"), 0);

        h.fake.push_poll("6");
        h.wait_for("close").await;

        let names = h.names();
        let upgrade = names.iter().position(|n| *n == "upgrade");
        let close = names.iter().position(|n| *n == "close");
        assert!(upgrade.is_some() && upgrade < close);
        assert_eq!(h.close_reason().as_deref(), Some("forced close"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_after_pong_resumes_polling() {
        let h = upgrading_harness();
        probe_until_pong(&h).await;
        let gets = h.fake.get_count();

        h.fake.close_ws();
        h.wait_for("upgradeError").await;
        assert!(!h.socket.is_upgrading());
        assert_eq!(h.socket.transport_name(), Some(TransportKind::Polling));

        // The poll that was pending when the pause began still completes.
        h.fake.push_poll("6");
        wait_until(|| h.fake.get_count() > gets).await;

        h.socket.send("still polling");
        wait_until(|| h.fake.posts().contains(&"4still polling".to_string())).await;
        assert_eq!(h.count("upgrade"), 0);
        assert_eq!(h.socket.ready_state(), Some(ReadyState::Open));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_buffered_during_failed_upgrade_is_sent_on_polling() {
        let h = upgrading_harness();
        probe_until_pong(&h).await;

        let acked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&acked);
        h.socket.send_with_ack("mid", move || flag.store(true, Ordering::SeqCst));
        wait_until(|| h.socket.write_buffer_len() == 1).await;

        h.fake.close_ws();
        wait_until(|| h.fake.posts().contains(&"4mid".to_string())).await;
        assert!(acked.load(Ordering::SeqCst));
        assert_eq!(h.count("upgradeError"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_close_drops_pending_acks() {
        let h = upgrading_harness();
        probe_until_pong(&h).await;
        let baseline = h.socket.emitter().listeners("flush");

        let acked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&acked);
        h.socket.send_with_ack("mid", move || flag.store(true, Ordering::SeqCst));
        wait_until(|| h.socket.emitter().listeners("flush") == baseline + 1).await;

        h.fake.push_poll("1");
        h.wait_for("close").await;

        assert_eq!(h.socket.emitter().listeners("flush"), baseline);
        assert!(!acked.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_bad_probe_reply_keeps_polling() {
        let h = upgrading_harness();
        h.open_with(&handshake("up", &["websocket"], 25_000, 20_000))
            .await;
        wait_until(|| h.fake.ws_sent().contains(&Frame::Text("2probe".into()))).await;

        h.fake.push_ws(Frame::Text("3nope".into()));
        h.wait_for("upgradeError").await;

        assert_eq!(h.socket.transport_name(), Some(TransportKind::Polling));
        assert_eq!(h.count("upgrading"), 0);
        assert!(!h.memory.get());
        wait_until(|| h.fake.ws_client_closed()).await;

        h.socket.send("still polling");
        wait_until(|| h.fake.posts().contains(&"4still polling".to_string())).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_probe_connect_failure_is_upgrade_error() {
        let h = upgrading_harness();
        h.fake.fail_next_connect();
        h.open_with(&handshake("up", &["websocket"], 25_000, 20_000))
            .await;

        h.wait_for("upgradeError").await;
        let error = h.events.lock().iter().find_map(|event| match event {
            SocketEvent::UpgradeError(e) => Some(Arc::clone(e)),
            _ => None,
        });
        let error = error.expect("upgradeError carries the cause");
        assert!(error.is_probe_error());
        assert_eq!(error.probe_transport(), Some("websocket"));
        assert_eq!(h.socket.ready_state(), Some(ReadyState::Open));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upgrade_disabled_does_not_probe() {
        let h = Harness::new(SocketOptions::new().with_upgrade(false));
        h.open_with(&handshake("up", &["websocket"], 25_000, 20_000))
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.fake.ws_connect_count(), 0);
        assert_eq!(h.socket.upgrades(), vec![TransportKind::WebSocket]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remember_upgrade_opens_websocket_directly() {
        let memory = UpgradeMemory::new();
        memory.set(true);
        let h = Harness::new(
            SocketOptions::new()
                .with_remember_upgrade(true)
                .with_upgrade_memory(memory),
        );

        h.socket.open();
        wait_until(|| h.fake.ws_connect_count() == 1).await;
        h.fake.push_ws(Frame::Text(handshake("ws", &[], 25_000, 20_000)));
        h.wait_for("open").await;

        assert_eq!(h.socket.transport_name(), Some(TransportKind::WebSocket));
        assert_eq!(h.fake.get_count(), 0);
        assert!(h.memory.get());
    }
}
