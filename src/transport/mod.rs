//! Transport layer.
//!
//! A transport is one physical mechanism carrying the logical
//! connection. Every transport shares the lifecycle contract below and
//! reports through its [`Emitter`]; it knows nothing about handshakes,
//! heartbeats or upgrades.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  TransportEvent   ┌─────────────────────┐
//! │    Socket    │◄──────────────────│  Arc<dyn Transport> │
//! │              │  send(packets)    │  ├ PollingTransport │──► HttpClient
//! │              │──────────────────►│  └ WebSocketTransport──► WebSocketConnector
//! └──────────────┘                   └─────────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! (new) ──open()──► opening ──on_open()──► open ──close()/on_close()──► closed
//!                                           │
//!                                           └──pause()──► paused  (polling only)
//! ```
//!
//! All public operations hop onto the [`EventThread`] before touching
//! state; I/O completions re-enter the same way and discard themselves
//! once the transport is closed.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `polling` | HTTP long-polling transport |
//! | `websocket` | WebSocket transport |
//! | `http` | HTTP client capability |
//! | `connector` | WebSocket client capability |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket client capability.
pub mod connector;

/// HTTP client capability.
pub mod http;

/// HTTP long-polling transport.
pub mod polling;

/// WebSocket transport.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{error, trace};

use crate::emitter::{Emitter, EventName};
use crate::error::{Error, Result};
use crate::protocol::Packet;
use crate::thread::EventThread;
use crate::util::{Query, yeast};

// ============================================================================
// Re-exports
// ============================================================================

pub use connector::{Frame, TungsteniteConnector, WebSocketChannel, WebSocketConnector};
pub use http::{HttpClient, HttpResponse, ReqwestHttpClient};
pub use polling::PollingTransport;
pub use websocket::WebSocketTransport;

// ============================================================================
// Event Names
// ============================================================================

/// Transport finished connecting.
pub const EVENT_OPEN: &str = "open";
/// Transport closed.
pub const EVENT_CLOSE: &str = "close";
/// A packet was decoded.
pub const EVENT_PACKET: &str = "packet";
/// Previously handed-off packets were flushed.
pub const EVENT_DRAIN: &str = "drain";
/// A transport-level fault occurred.
pub const EVENT_ERROR: &str = "error";
/// A poll request was issued.
pub const EVENT_POLL: &str = "poll";
/// A poll response was fully processed.
pub const EVENT_POLL_COMPLETE: &str = "pollComplete";
/// Headers about to be sent with a request.
pub const EVENT_REQUEST_HEADERS: &str = "requestHeaders";
/// Headers received with a response.
pub const EVENT_RESPONSE_HEADERS: &str = "responseHeaders";

// ============================================================================
// TransportKind
// ============================================================================

/// The concrete transport mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// HTTP long-polling.
    Polling,
    /// Persistent WebSocket connection.
    WebSocket,
}

impl TransportKind {
    /// Returns the protocol name used in the `transport` query parameter.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Polling => "polling",
            Self::WebSocket => "websocket",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "polling" => Ok(Self::Polling),
            "websocket" => Ok(Self::WebSocket),
            other => Err(Error::config(format!("Unknown transport: {other}"))),
        }
    }
}

// ============================================================================
// TransportState
// ============================================================================

/// Lifecycle state of one transport instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Connecting.
    Opening,
    /// Ready to send.
    Open,
    /// Polling transport retired during upgrade.
    Paused,
    /// Closed; all late callbacks are ignored.
    Closed,
}

// ============================================================================
// TransportEvent
// ============================================================================

/// Notifications emitted by a transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// See [`EVENT_OPEN`].
    Open,
    /// See [`EVENT_CLOSE`].
    Close,
    /// See [`EVENT_PACKET`].
    Packet(Packet),
    /// See [`EVENT_DRAIN`].
    Drain,
    /// See [`EVENT_ERROR`].
    Error(Arc<Error>),
    /// See [`EVENT_POLL`].
    Poll,
    /// See [`EVENT_POLL_COMPLETE`].
    PollComplete,
    /// See [`EVENT_REQUEST_HEADERS`].
    RequestHeaders(Vec<(String, String)>),
    /// See [`EVENT_RESPONSE_HEADERS`].
    ResponseHeaders(Vec<(String, String)>),
}

impl EventName for TransportEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Open => EVENT_OPEN,
            Self::Close => EVENT_CLOSE,
            Self::Packet(_) => EVENT_PACKET,
            Self::Drain => EVENT_DRAIN,
            Self::Error(_) => EVENT_ERROR,
            Self::Poll => EVENT_POLL,
            Self::PollComplete => EVENT_POLL_COMPLETE,
            Self::RequestHeaders(_) => EVENT_REQUEST_HEADERS,
            Self::ResponseHeaders(_) => EVENT_RESPONSE_HEADERS,
        }
    }
}

// ============================================================================
// TransportOptions
// ============================================================================

/// Everything a transport needs to build its URI and perform I/O.
#[derive(Clone)]
pub struct TransportOptions {
    /// Host name, IPv6 literals without brackets.
    pub hostname: String,
    /// Port.
    pub port: u16,
    /// Use `https`/`wss`.
    pub secure: bool,
    /// Path prefix ending with `/`.
    pub path: String,
    /// Query parameters, including `EIO`, `transport` and `sid`.
    pub query: Query,
    /// Append a cache-busting timestamp parameter.
    pub timestamp_requests: bool,
    /// Name of the timestamp parameter.
    pub timestamp_param: String,
    /// Headers sent with every request.
    pub extra_headers: Vec<(String, String)>,
    /// HTTP capability.
    pub http_client: Arc<dyn HttpClient>,
    /// WebSocket capability.
    pub connector: Arc<dyn WebSocketConnector>,
    /// Runtime the I/O tasks are spawned on.
    pub runtime: Handle,
    /// Executor for state changes.
    pub event_thread: EventThread,
}

impl fmt::Debug for TransportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportOptions")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("timestamp_requests", &self.timestamp_requests)
            .field("timestamp_param", &self.timestamp_param)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TransportCore
// ============================================================================

/// Mutable part of [`TransportCore`].
struct CoreState {
    ready_state: Option<TransportState>,
    writable: bool,
}

/// State and hooks shared by all transports.
pub struct TransportCore {
    kind: TransportKind,
    emitter: Emitter<TransportEvent>,
    state: Mutex<CoreState>,
    query: Mutex<Query>,
    options: TransportOptions,
}

impl fmt::Debug for TransportCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportCore")
            .field("kind", &self.kind)
            .field("ready_state", &self.ready_state())
            .field("writable", &self.writable())
            .finish_non_exhaustive()
    }
}

impl TransportCore {
    /// Creates the shared state for a transport of `kind`.
    #[must_use]
    pub fn new(kind: TransportKind, options: TransportOptions) -> Self {
        Self {
            kind,
            emitter: Emitter::new(),
            state: Mutex::new(CoreState {
                ready_state: None,
                writable: false,
            }),
            query: Mutex::new(options.query.clone()),
            options,
        }
    }

    /// Transport mechanism.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Event emitter.
    #[inline]
    #[must_use]
    pub const fn emitter(&self) -> &Emitter<TransportEvent> {
        &self.emitter
    }

    /// Construction options.
    #[inline]
    #[must_use]
    pub const fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Executor all state changes run on.
    #[inline]
    #[must_use]
    pub const fn event_thread(&self) -> &EventThread {
        &self.options.event_thread
    }

    /// Current state, `None` before the first `open()`.
    #[must_use]
    pub fn ready_state(&self) -> Option<TransportState> {
        self.state.lock().ready_state
    }

    /// Returns `true` if the state is `state`.
    #[inline]
    #[must_use]
    pub fn is(&self, state: TransportState) -> bool {
        self.ready_state() == Some(state)
    }

    pub(crate) fn set_ready_state(&self, ready_state: TransportState) {
        self.state.lock().ready_state = Some(ready_state);
    }

    /// Whether the transport can accept another batch.
    #[must_use]
    pub fn writable(&self) -> bool {
        self.state.lock().writable
    }

    pub(crate) fn set_writable(&self, writable: bool) {
        self.state.lock().writable = writable;
    }

    /// Sets one query parameter for subsequent requests.
    pub fn set_query(&self, key: &str, value: &str) {
        self.query.lock().set(key, value);
    }

    /// Snapshot of the query parameters.
    #[must_use]
    pub fn query(&self) -> Query {
        self.query.lock().clone()
    }

    /// Builds the request URI.
    ///
    /// `schemes` is the `(plain, secure)` scheme pair. The port is omitted
    /// when it is the scheme default, IPv6 hosts are bracketed, and a
    /// fresh timestamp is appended when enabled.
    #[must_use]
    pub fn uri(&self, schemes: (&str, &str)) -> String {
        let options = &self.options;
        let mut query = self.query();

        if options.timestamp_requests {
            query.set(options.timestamp_param.as_str(), yeast::yeast());
        }

        let (scheme, default_port) = if options.secure {
            (schemes.1, 443)
        } else {
            (schemes.0, 80)
        };

        let port = if options.port > 0 && options.port != default_port {
            format!(":{}", options.port)
        } else {
            String::new()
        };

        let host = if options.hostname.contains(':') {
            format!("[{}]", options.hostname)
        } else {
            options.hostname.clone()
        };

        let encoded = query.encode();
        let query = if encoded.is_empty() {
            encoded
        } else {
            format!("?{encoded}")
        };

        format!("{scheme}://{host}{port}{}{query}", options.path)
    }

    // ========================================================================
    // Hooks
    // ========================================================================

    /// Marks the transport open and writable, then emits `open`.
    pub fn on_open(&self) {
        {
            let mut state = self.state.lock();
            state.ready_state = Some(TransportState::Open);
            state.writable = true;
        }
        self.emitter.emit(TransportEvent::Open);
    }

    /// Emits `packet`.
    pub fn on_packet(&self, packet: Packet) {
        self.emitter.emit(TransportEvent::Packet(packet));
    }

    /// Marks the transport closed, then emits `close`.
    pub fn on_close(&self) {
        self.set_ready_state(TransportState::Closed);
        self.emitter.emit(TransportEvent::Close);
    }

    /// Emits `error` wrapping `cause`.
    pub fn on_error(&self, message: &str, cause: Option<Error>) {
        let error = match cause {
            Some(cause) => Error::transport_with(message, Arc::new(cause)),
            None => Error::transport(message),
        };
        self.emitter.emit(TransportEvent::Error(Arc::new(error)));
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Lifecycle contract shared by the concrete transports.
///
/// Implementors provide the `do_*` hooks and [`Transport::write`]; the
/// provided methods route everything through the event thread and
/// enforce the state guards.
pub trait Transport: Send + Sync + 'static {
    /// Shared state.
    fn core(&self) -> &TransportCore;

    /// Starts connecting. Called in state `opening`.
    fn do_open(self: Arc<Self>);

    /// Tears down the connection. Called in state `opening` or `open`.
    fn do_close(self: Arc<Self>);

    /// Hands a batch to the wire. Called in state `open`.
    fn write(self: Arc<Self>, packets: Vec<Packet>);

    /// Request URI for this transport.
    fn uri(&self) -> String;

    /// Stops issuing requests and calls `on_paused` once nothing is in
    /// flight. Only polling transports need to wait.
    fn pause(self: Arc<Self>, on_paused: Box<dyn FnOnce() + Send>) {
        let thread = self.core().event_thread().clone();
        thread.exec(move || {
            self.core().set_ready_state(TransportState::Paused);
            on_paused();
        });
    }

    /// Undoes [`Transport::pause`] when the upgrade it served fell
    /// through. A pending `on_paused` is dropped without running.
    fn resume(self: Arc<Self>) {
        let thread = self.core().event_thread().clone();
        thread.exec(move || {
            if self.core().is(TransportState::Paused) {
                trace!(transport = %self.kind(), "Resuming transport");
                self.core().set_ready_state(TransportState::Open);
            }
        });
    }

    /// Transport mechanism.
    fn kind(&self) -> TransportKind {
        self.core().kind()
    }

    /// Opens the transport unless it is already opening or open.
    fn open(self: Arc<Self>) {
        let thread = self.core().event_thread().clone();
        thread.exec(move || {
            if matches!(self.core().ready_state(), None | Some(TransportState::Closed)) {
                trace!(transport = %self.kind(), "Opening transport");
                self.core().set_ready_state(TransportState::Opening);
                self.do_open();
            }
        });
    }

    /// Closes the transport if it is opening or open.
    fn close(self: Arc<Self>) {
        let thread = self.core().event_thread().clone();
        thread.exec(move || {
            if matches!(
                self.core().ready_state(),
                Some(TransportState::Opening | TransportState::Open)
            ) {
                trace!(transport = %self.kind(), "Closing transport");
                Arc::clone(&self).do_close();
                self.core().on_close();
            }
        });
    }

    /// Sends a batch of packets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportNotOpen`] when called on the event thread
    /// while the transport is not open. Off the event thread the check runs
    /// later and a violation is logged.
    fn send(self: Arc<Self>, packets: Vec<Packet>) -> Result<()> {
        let thread = self.core().event_thread().clone();
        if !thread.is_current() {
            thread.exec(move || {
                if let Err(e) = self.send(packets) {
                    error!(error = %e, "Send on transport that is not open");
                }
            });
            return Ok(());
        }

        if !self.core().is(TransportState::Open) {
            return Err(Error::TransportNotOpen);
        }

        self.write(packets);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::FakeServer;

    fn options(hostname: &str, secure: bool, port: u16, query: &[(&str, &str)]) -> TransportOptions {
        let fake = FakeServer::new();
        let mut options = fake.transport_options(Handle::current());
        options.hostname = hostname.to_string();
        options.secure = secure;
        options.port = port;
        options.path = "/engine.io".to_string();
        options.query = query.iter().copied().collect();
        options
    }

    #[tokio::test]
    async fn test_uri() {
        let core = TransportCore::new(
            TransportKind::Polling,
            options("localhost", false, 0, &[("sid", "test")]),
        );
        assert_eq!(core.uri(("http", "https")), "http://localhost/engine.io?sid=test");
    }

    #[tokio::test]
    async fn test_uri_with_default_port() {
        let core = TransportCore::new(
            TransportKind::Polling,
            options("localhost", false, 80, &[("sid", "test")]),
        );
        assert_eq!(core.uri(("http", "https")), "http://localhost/engine.io?sid=test");
    }

    #[tokio::test]
    async fn test_uri_with_port() {
        let core = TransportCore::new(
            TransportKind::Polling,
            options("localhost", false, 3000, &[("sid", "test")]),
        );
        assert_eq!(core.uri(("http", "https")), "http://localhost:3000/engine.io?sid=test");
    }

    #[tokio::test]
    async fn test_https_uri_with_default_port() {
        let core = TransportCore::new(
            TransportKind::Polling,
            options("localhost", true, 443, &[("sid", "test")]),
        );
        assert_eq!(core.uri(("http", "https")), "https://localhost/engine.io?sid=test");
    }

    #[tokio::test]
    async fn test_ipv6_uri_is_bracketed() {
        let core = TransportCore::new(TransportKind::WebSocket, options("::1", false, 8080, &[]));
        assert_eq!(core.uri(("ws", "wss")), "ws://[::1]:8080/engine.io");
    }

    #[tokio::test]
    async fn test_timestamped_uri() {
        let mut opts = options("localhost", false, 0, &[]);
        opts.timestamp_requests = true;
        opts.timestamp_param = "t".to_string();
        let core = TransportCore::new(TransportKind::Polling, opts);

        let re = regex::Regex::new(r"^http://localhost/engine\.io\?t=[0-9A-Za-z_-]+(\.[0-9A-Za-z_-]+)?$")
            .expect("valid regex");
        assert!(re.is_match(&core.uri(("http", "https"))));
    }

    #[tokio::test]
    async fn test_set_query_is_visible_in_uri() {
        let core = TransportCore::new(
            TransportKind::WebSocket,
            options("test", false, 0, &[("transport", "websocket")]),
        );
        core.set_query("sid", "abc");
        assert_eq!(core.uri(("ws", "wss")), "ws://test/engine.io?transport=websocket&sid=abc");
    }

    #[test]
    fn test_transport_kind_names() {
        assert_eq!(TransportKind::Polling.to_string(), "polling");
        assert_eq!("websocket".parse::<TransportKind>().ok(), Some(TransportKind::WebSocket));
        assert!("flashsocket".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_event_names() {
        assert_eq!(TransportEvent::PollComplete.name(), "pollComplete");
        assert_eq!(TransportEvent::Drain.name(), "drain");
    }
}
