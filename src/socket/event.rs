//! Socket events.
//!
//! | Event | Payload |
//! |-------|---------|
//! | `open` | |
//! | `close` | reason, optional cause |
//! | `message` / `data` | [`PacketData`] |
//! | `error` | [`Error`] |
//! | `handshake` | [`HandshakeData`] |
//! | `upgrading` / `upgrade` | target [`TransportKind`] |
//! | `upgradeError` | probe [`Error`] |
//! | `packet` / `packetCreate` | [`Packet`] |
//! | `flush` / `drain` | |
//! | `ping` / `pong` | |
//! | `transport` | created [`TransportKind`] |

use std::sync::Arc;

use crate::emitter::EventName;
use crate::error::Error;
use crate::protocol::{HandshakeData, Packet, PacketData};
use crate::transport::TransportKind;

// ============================================================================
// Event Names
// ============================================================================

pub const EVENT_OPEN: &str = "open";
pub const EVENT_CLOSE: &str = "close";
pub const EVENT_MESSAGE: &str = "message";
pub const EVENT_DATA: &str = "data";
pub const EVENT_ERROR: &str = "error";
pub const EVENT_HANDSHAKE: &str = "handshake";
pub const EVENT_UPGRADING: &str = "upgrading";
pub const EVENT_UPGRADE: &str = "upgrade";
pub const EVENT_UPGRADE_ERROR: &str = "upgradeError";
pub const EVENT_PACKET: &str = "packet";
pub const EVENT_PACKET_CREATE: &str = "packetCreate";
pub const EVENT_FLUSH: &str = "flush";
pub const EVENT_DRAIN: &str = "drain";
pub const EVENT_PING: &str = "ping";
pub const EVENT_PONG: &str = "pong";
pub const EVENT_TRANSPORT: &str = "transport";

// ============================================================================
// SocketEvent
// ============================================================================

/// Notifications emitted by a [`Socket`](super::Socket).
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// Handshake completed.
    Open,
    /// Connection closed. Emitted exactly once.
    Close {
        /// `"forced close"`, `"transport close"`, `"transport error"` or
        /// `"ping timeout"`.
        reason: String,
        /// Fault behind a `"transport error"` close.
        cause: Option<Arc<Error>>,
    },
    /// Application message.
    Message(PacketData),
    /// Same payload as [`SocketEvent::Message`].
    Data(PacketData),
    /// Fatal fault; a `close` follows.
    Error(Arc<Error>),
    /// Handshake data received.
    Handshake(HandshakeData),
    /// A probe succeeded and the switch began.
    Upgrading(TransportKind),
    /// The switch completed.
    Upgrade(TransportKind),
    /// A probe failed.
    UpgradeError(Arc<Error>),
    /// Any inbound packet.
    Packet(Packet),
    /// An outbound packet entered the write buffer.
    PacketCreate(Packet),
    /// The write buffer was handed to the transport.
    Flush,
    /// The write buffer is empty.
    Drain,
    /// The server pinged.
    Ping,
    /// A pong was sent in reply.
    Pong,
    /// A transport was created.
    Transport(TransportKind),
}

impl EventName for SocketEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Open => EVENT_OPEN,
            Self::Close { .. } => EVENT_CLOSE,
            Self::Message(_) => EVENT_MESSAGE,
            Self::Data(_) => EVENT_DATA,
            Self::Error(_) => EVENT_ERROR,
            Self::Handshake(_) => EVENT_HANDSHAKE,
            Self::Upgrading(_) => EVENT_UPGRADING,
            Self::Upgrade(_) => EVENT_UPGRADE,
            Self::UpgradeError(_) => EVENT_UPGRADE_ERROR,
            Self::Packet(_) => EVENT_PACKET,
            Self::PacketCreate(_) => EVENT_PACKET_CREATE,
            Self::Flush => EVENT_FLUSH,
            Self::Drain => EVENT_DRAIN,
            Self::Ping => EVENT_PING,
            Self::Pong => EVENT_PONG,
            Self::Transport(_) => EVENT_TRANSPORT,
        }
    }
}
