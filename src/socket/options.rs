//! Socket configuration.
//!
//! # Example
//!
//! ```ignore
//! use engineio_client::{SocketOptions, TransportKind};
//!
//! let options = SocketOptions::from_uri("https://example.com:8443/?token=abc")?
//!     .with_transports([TransportKind::WebSocket])
//!     .with_remember_upgrade(true)
//!     .with_header("authorization", "Bearer xyz");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use url::Url;

use crate::error::{Error, Result};
use crate::thread::EventThread;
use crate::transport::{HttpClient, TransportKind, WebSocketConnector};
use crate::util::Query;

use super::memory::UpgradeMemory;

// ============================================================================
// Constants
// ============================================================================

/// Default path prefix.
pub const DEFAULT_PATH: &str = "/engine.io";

/// Default timestamp parameter name.
pub const DEFAULT_TIMESTAMP_PARAM: &str = "t";

// ============================================================================
// TransportOverrides
// ============================================================================

/// Per-transport settings that take precedence over the socket-wide ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOverrides {
    /// Host name override.
    pub hostname: Option<String>,
    /// Port override.
    pub port: Option<u16>,
    /// TLS override.
    pub secure: Option<bool>,
    /// Path override.
    pub path: Option<String>,
    /// Extra query parameters, merged over the socket query.
    pub query: Option<Query>,
    /// Timestamp flag override.
    pub timestamp_requests: Option<bool>,
    /// Timestamp parameter override.
    pub timestamp_param: Option<String>,
    /// Header list override.
    pub extra_headers: Option<Vec<(String, String)>>,
}

// ============================================================================
// SocketOptions
// ============================================================================

/// Socket configuration.
///
/// Capabilities left as `None` get defaults when the socket is created:
/// a [`ReqwestHttpClient`](crate::transport::ReqwestHttpClient), a
/// [`TungsteniteConnector`](crate::transport::TungsteniteConnector), a
/// fresh [`EventThread`], the process-wide [`UpgradeMemory`] and the
/// ambient tokio runtime.
#[derive(Clone)]
pub struct SocketOptions {
    /// `host[:port]` form, IPv6 literals may be bracketed. Wins over
    /// `hostname`.
    pub host: Option<String>,

    /// Host name. Defaults to `localhost`.
    pub hostname: Option<String>,

    /// Port. Defaults to 443 when secure, else 80.
    pub port: Option<u16>,

    /// Use `https`/`wss`.
    pub secure: bool,

    /// Path prefix. A trailing `/` is enforced.
    pub path: String,

    /// Transports in preference order.
    pub transports: Vec<TransportKind>,

    /// Probe for upgrades after opening over polling.
    pub upgrade: bool,

    /// Open directly over WebSocket if the last connection upgraded.
    pub remember_upgrade: bool,

    /// Query parameters sent with every request.
    pub query: Query,

    /// Append a cache-busting timestamp parameter.
    pub timestamp_requests: bool,

    /// Name of the timestamp parameter.
    pub timestamp_param: String,

    /// Headers sent with every request.
    pub extra_headers: Vec<(String, String)>,

    /// Per-transport overrides.
    pub transport_options: FxHashMap<TransportKind, TransportOverrides>,

    /// HTTP capability for polling.
    pub http_client: Option<Arc<dyn HttpClient>>,

    /// WebSocket capability.
    pub connector: Option<Arc<dyn WebSocketConnector>>,

    /// Executor for socket and transport state.
    pub event_thread: Option<EventThread>,

    /// Upgrade memory used by `remember_upgrade`.
    pub upgrade_memory: Option<UpgradeMemory>,

    /// Runtime for I/O tasks and timers.
    pub runtime: Option<Handle>,
}

impl fmt::Debug for SocketOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketOptions")
            .field("host", &self.host)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("path", &self.path)
            .field("transports", &self.transports)
            .field("upgrade", &self.upgrade)
            .field("remember_upgrade", &self.remember_upgrade)
            .field("query", &self.query)
            .field("timestamp_requests", &self.timestamp_requests)
            .field("timestamp_param", &self.timestamp_param)
            .finish_non_exhaustive()
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            host: None,
            hostname: None,
            port: None,
            secure: false,
            path: DEFAULT_PATH.to_string(),
            transports: vec![TransportKind::Polling, TransportKind::WebSocket],
            upgrade: true,
            remember_upgrade: false,
            query: Query::new(),
            timestamp_requests: false,
            timestamp_param: DEFAULT_TIMESTAMP_PARAM.to_string(),
            extra_headers: Vec::new(),
            transport_options: FxHashMap::default(),
            http_client: None,
            connector: None,
            event_thread: None,
            upgrade_memory: None,
            runtime: None,
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl SocketOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options from a server URI.
    ///
    /// Scheme (`http`, `https`, `ws`, `wss`), host, port and query are
    /// taken from the URI; its path is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUri`] if the URI does not parse, or
    /// [`Error::Config`] for an unsupported scheme or a missing host.
    pub fn from_uri(uri: &str) -> Result<Self> {
        Self::default().with_uri(uri)
    }

    /// Applies host, port, TLS and query of `uri` to these options.
    ///
    /// # Errors
    ///
    /// See [`SocketOptions::from_uri`].
    pub fn with_uri(mut self, uri: &str) -> Result<Self> {
        let url = Url::parse(uri)?;

        self.secure = match url.scheme() {
            "https" | "wss" => true,
            "http" | "ws" => false,
            other => return Err(Error::config(format!("Unsupported scheme: {other}"))),
        };

        let host = url
            .host_str()
            .ok_or_else(|| Error::config(format!("URI has no host: {uri}")))?;
        self.hostname = Some(strip_brackets(host).to_string());
        self.host = None;
        self.port = url.port();

        if let Some(query) = url.query() {
            self.query = Query::decode(query);
        }

        Ok(self)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SocketOptions {
    /// Sets `host[:port]`.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the host name.
    #[inline]
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Sets the port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Enables TLS.
    #[inline]
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the path prefix.
    #[inline]
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the transports in preference order.
    #[inline]
    #[must_use]
    pub fn with_transports(mut self, transports: impl IntoIterator<Item = TransportKind>) -> Self {
        self.transports = transports.into_iter().collect();
        self
    }

    /// Enables or disables upgrade probing.
    #[inline]
    #[must_use]
    pub fn with_upgrade(mut self, upgrade: bool) -> Self {
        self.upgrade = upgrade;
        self
    }

    /// Enables or disables `remember_upgrade`.
    #[inline]
    #[must_use]
    pub fn with_remember_upgrade(mut self, remember_upgrade: bool) -> Self {
        self.remember_upgrade = remember_upgrade;
        self
    }

    /// Adds a query parameter.
    #[inline]
    #[must_use]
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.set(key, value);
        self
    }

    /// Enables timestamped requests, optionally renaming the parameter.
    #[inline]
    #[must_use]
    pub fn with_timestamp_requests(mut self, param: Option<&str>) -> Self {
        self.timestamp_requests = true;
        if let Some(param) = param {
            self.timestamp_param = param.to_string();
        }
        self
    }

    /// Adds a header sent with every request.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Sets overrides for one transport.
    #[inline]
    #[must_use]
    pub fn with_transport_options(mut self, kind: TransportKind, overrides: TransportOverrides) -> Self {
        self.transport_options.insert(kind, overrides);
        self
    }

    /// Sets the HTTP capability.
    #[inline]
    #[must_use]
    pub fn with_http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the WebSocket capability.
    #[inline]
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn WebSocketConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Shares an executor with other sockets.
    #[inline]
    #[must_use]
    pub fn with_event_thread(mut self, event_thread: EventThread) -> Self {
        self.event_thread = Some(event_thread);
        self
    }

    /// Uses a specific upgrade memory.
    #[inline]
    #[must_use]
    pub fn with_upgrade_memory(mut self, memory: UpgradeMemory) -> Self {
        self.upgrade_memory = Some(memory);
        self
    }

    /// Spawns I/O on `runtime` instead of the ambient one.
    #[inline]
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

// ============================================================================
// Resolution
// ============================================================================

impl SocketOptions {
    /// Effective host name: `host` (brackets stripped, port dropped), then
    /// `hostname`, then `localhost`.
    #[must_use]
    pub fn resolved_hostname(&self) -> String {
        if let Some(host) = &self.host {
            return split_host(host).to_string();
        }
        self.hostname
            .clone()
            .unwrap_or_else(|| "localhost".to_string())
    }

    /// Effective port.
    #[must_use]
    pub fn resolved_port(&self) -> u16 {
        self.port
            .unwrap_or(if self.secure { 443 } else { 80 })
    }

    /// Path with exactly one trailing `/`.
    #[must_use]
    pub fn resolved_path(&self) -> String {
        normalize_path(&self.path)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the timestamp parameter is empty while
    /// timestamps are enabled.
    pub fn validate(&self) -> Result<()> {
        if self.timestamp_requests && self.timestamp_param.is_empty() {
            return Err(Error::config("Timestamp parameter must not be empty"));
        }
        Ok(())
    }
}

/// Removes IPv6 brackets.
fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

/// Extracts the host name from `host[:port]`. A bare IPv6 literal (more
/// than one `:`) is kept whole.
fn split_host(host: &str) -> &str {
    if host.starts_with('[') {
        let end = host.rfind(']').unwrap_or(host.len());
        return &host[1..end];
    }
    if host.matches(':').count() > 1 {
        return host;
    }
    host.split(':').next().unwrap_or(host)
}

/// Forces one trailing slash.
pub(crate) fn normalize_path(path: &str) -> String {
    format!("{}/", path.strip_suffix('/').unwrap_or(path))
}

// ============================================================================
// Tests
// ============================================================================
