//! Engine.IO wire protocol.
//!
//! This module defines packets, the payload framing used by the polling
//! transport, and the handshake carried by the first `open` packet.
//!
//! # Protocol Overview
//!
//! | Packet | Direction | Purpose |
//! |--------|-----------|---------|
//! | `open` | Server → Client | Handshake data |
//! | `close` | Both | Close the transport |
//! | `ping` / `pong` | Both | Heartbeat and upgrade probe |
//! | `message` | Both | Application data |
//! | `upgrade` | Client → Server | Commit a transport switch |
//! | `noop` | Server → Client | Release a pending poll |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `packet` | Packet model |
//! | `parser` | Packet and payload codec |
//! | `handshake` | Handshake data |

// ============================================================================
// Submodules
// ============================================================================

/// Handshake data of the `open` packet.
pub mod handshake;

/// Packet model.
pub mod packet;

/// Packet and payload codec.
pub mod parser;

// ============================================================================
// Re-exports
// ============================================================================

pub use handshake::HandshakeData;
pub use packet::{Packet, PacketData, PacketType};
pub use parser::{
    Encoded, PROTOCOL, SEPARATOR, decode_binary_packet, decode_packet, decode_payload,
    decode_payload_vec, encode_packet, encode_payload,
};
