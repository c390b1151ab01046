//! Handshake data carried by the `open` packet.
//!
//! # Format
//!
//! ```json
//! {
//!   "sid": "lv_VI97HAXpY6yYWAAAC",
//!   "upgrades": ["websocket"],
//!   "pingInterval": 25000,
//!   "pingTimeout": 20000,
//!   "maxPayload": 1000000
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

// ============================================================================
// HandshakeData
// ============================================================================

/// Session parameters negotiated by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeData {
    /// Session id.
    pub sid: String,

    /// Transport names the server accepts as upgrade targets.
    pub upgrades: Vec<String>,

    /// Interval between server pings, in milliseconds.
    pub ping_interval: u64,

    /// Grace period for a ping to arrive, in milliseconds.
    pub ping_timeout: u64,

    /// Largest payload the server accepts, in bytes.
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl HandshakeData {
    /// Parses handshake JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the JSON is malformed or a required
    /// field is missing.
    pub fn parse(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Returns the ping interval as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval)
    }

    /// Returns the ping timeout as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout)
    }
}

// ============================================================================
// Tests
// ============================================================================
