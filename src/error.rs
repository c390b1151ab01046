//! Error types for the Engine.IO client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Fallible constructors return [`Result<T>`] which uses [`Error`].
//! Runtime faults are not returned to the caller; they are delivered
//! through `error`, `upgradeError` and `close` events as `Arc<Error>`.
//!
//! ```ignore
//! use engineio_client::{Result, Socket, SocketOptions};
//!
//! fn example() -> Result<Socket> {
//!     let options = SocketOptions::from_uri("http://localhost:3000")?;
//!     Socket::new(options)
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidUri`], [`Error::NoTransports`] |
//! | Transport | [`Error::Transport`], [`Error::Http`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Handshake`], [`Error::Server`], [`Error::TransportNotOpen`] |
//! | Upgrade | [`Error::Probe`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::Request`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;
use std::sync::Arc;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when socket options are invalid or no runtime is available.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Connection target could not be parsed.
    #[error("Invalid URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    /// The configured transport list is empty.
    #[error("No transports available")]
    NoTransports,

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// A transport-level fault (poll, post or websocket failure).
    #[error("{message}")]
    Transport {
        /// Short description, e.g. `xhr poll error`.
        message: String,
        /// Underlying cause, when one is known.
        #[source]
        source: Option<Arc<Error>>,
    },

    /// HTTP request completed with a non-2xx status.
    #[error("HTTP status {status}")]
    Http {
        /// Status code returned by the server.
        status: u16,
    },

    /// Connection closed while an operation was pending.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The `open` packet did not carry valid handshake data.
    #[error("Handshake error: {message}")]
    Handshake {
        /// Description of the malformed handshake.
        message: String,
    },

    /// The server sent an `error` packet.
    #[error("server error")]
    Server {
        /// Data carried by the error packet.
        code: Option<String>,
    },

    /// `send` was called on a transport that is not open.
    #[error("Transport not open")]
    TransportNotOpen,

    // ========================================================================
    // Upgrade Errors
    // ========================================================================
    /// An upgrade probe failed. Never fatal to the socket.
    #[error("{message}")]
    Probe {
        /// Name of the transport that was being probed.
        transport: String,
        /// Description, `probe error` or `probe error: <reason>`.
        message: String,
        /// Underlying cause, when one is known.
        #[source]
        source: Option<Arc<Error>>,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// Malformed handshake JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP client error.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a transport error without a cause.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transport error wrapping a cause.
    #[inline]
    pub fn transport_with(message: impl Into<String>, source: Arc<Error>) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates an HTTP status error.
    #[inline]
    pub fn http(status: u16) -> Self {
        Self::Http { status }
    }

    /// Creates a handshake error.
    #[inline]
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }

    /// Creates a server error from an `error` packet payload.
    #[inline]
    pub fn server(code: Option<String>) -> Self {
        Self::Server { code }
    }

    /// Creates a probe error.
    #[inline]
    pub fn probe(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Probe {
            transport: transport.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a probe error wrapping the fault raised by the probe transport.
    #[inline]
    pub fn probe_with(transport: impl Into<String>, source: Arc<Error>) -> Self {
        Self::Probe {
            transport: transport.into(),
            message: "probe error".to_string(),
            source: Some(source),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error came from a transport.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Http { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
                | Self::Request(_)
        )
    }

    /// Returns `true` if this is an upgrade probe failure.
    #[inline]
    #[must_use]
    pub fn is_probe_error(&self) -> bool {
        matches!(self, Self::Probe { .. })
    }

    /// Returns `true` if this is a configuration error.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::InvalidUri(_) | Self::NoTransports
        )
    }

    /// Returns the probed transport name for probe errors.
    #[inline]
    #[must_use]
    pub fn probe_transport(&self) -> Option<&str> {
        match self {
            Self::Probe { transport, .. } => Some(transport),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
