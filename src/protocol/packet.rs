//! Packet model.
//!
//! A [`Packet`] is a typed, immutable protocol unit with optional text or
//! binary data.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// PacketType
// ============================================================================

/// Packet type with its fixed wire digit.
///
/// | Type | Digit |
/// |------|-------|
/// | `open` | 0 |
/// | `close` | 1 |
/// | `ping` | 2 |
/// | `pong` | 3 |
/// | `message` | 4 |
/// | `upgrade` | 5 |
/// | `noop` | 6 |
///
/// `error` has no digit; it only exists as the decoder's sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Handshake from the server.
    Open,
    /// Request to close the transport.
    Close,
    /// Heartbeat request.
    Ping,
    /// Heartbeat reply.
    Pong,
    /// Application data.
    Message,
    /// Commits a transport upgrade.
    Upgrade,
    /// No-op, used to release a pending poll.
    Noop,
    /// Decoder sentinel or server error.
    Error,
}

impl PacketType {
    /// Returns the wire digit, or `None` for [`PacketType::Error`].
    #[inline]
    #[must_use]
    pub const fn to_digit(self) -> Option<u8> {
        match self {
            Self::Open => Some(0),
            Self::Close => Some(1),
            Self::Ping => Some(2),
            Self::Pong => Some(3),
            Self::Message => Some(4),
            Self::Upgrade => Some(5),
            Self::Noop => Some(6),
            Self::Error => None,
        }
    }

    /// Maps a wire digit back to its type.
    #[inline]
    #[must_use]
    pub const fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(Self::Open),
            1 => Some(Self::Close),
            2 => Some(Self::Ping),
            3 => Some(Self::Pong),
            4 => Some(Self::Message),
            5 => Some(Self::Upgrade),
            6 => Some(Self::Noop),
            _ => None,
        }
    }

    /// Returns the lowercase protocol name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Message => "message",
            Self::Upgrade => "upgrade",
            Self::Noop => "noop",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PacketData
// ============================================================================

/// Packet payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PacketData {
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Binary(Vec<u8>),
}

impl PacketData {
    /// Returns the text, if this is text data.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Returns the bytes, if this is binary data.
    #[inline]
    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Text(_) => None,
            Self::Binary(bytes) => Some(bytes),
        }
    }

    /// Returns `true` for binary data.
    #[inline]
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }
}

impl From<String> for PacketData {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for PacketData {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for PacketData {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

impl From<&[u8]> for PacketData {
    fn from(bytes: &[u8]) -> Self {
        Self::Binary(bytes.to_vec())
    }
}

// ============================================================================
// Packet
// ============================================================================

/// A single protocol packet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Packet {
    /// Packet type.
    pub kind: PacketType,
    /// Optional payload.
    pub data: Option<PacketData>,
}

impl Packet {
    /// Creates a packet without data.
    #[inline]
    #[must_use]
    pub const fn new(kind: PacketType) -> Self {
        Self { kind, data: None }
    }

    /// Creates a packet carrying `data`.
    #[inline]
    #[must_use]
    pub fn with_data(kind: PacketType, data: impl Into<PacketData>) -> Self {
        Self {
            kind,
            data: Some(data.into()),
        }
    }

    /// Creates a `message` packet.
    #[inline]
    #[must_use]
    pub fn message(data: impl Into<PacketData>) -> Self {
        Self::with_data(PacketType::Message, data)
    }

    /// Creates the decoder's error sentinel, `{error, "parser error"}`.
    #[inline]
    #[must_use]
    pub fn parser_error() -> Self {
        Self::with_data(PacketType::Error, "parser error")
    }

    /// Returns `true` if this is the decoder's error sentinel.
    #[inline]
    #[must_use]
    pub fn is_parser_error(&self) -> bool {
        self.kind == PacketType::Error && self.text() == Some("parser error")
    }

    /// Returns the text payload, if any.
    #[inline]
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.data.as_ref().and_then(PacketData::as_text)
    }

    /// Returns `true` if the payload is binary.
    #[inline]
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.data.as_ref().is_some_and(PacketData::is_binary)
    }
}

// ============================================================================
// Tests
// ============================================================================
