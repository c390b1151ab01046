//! Engine.IO client - Transport-agnostic realtime connection library.
//!
//! This library implements the client side of the Engine.IO protocol
//! (revision 4): HTTP long-polling, WebSocket, and the upgrade from one to
//! the other.
//!
//! # Architecture
//!
//! The client follows a single-owner event model:
//!
//! - **Socket**: Connection state machine, write buffer, heartbeat, upgrades
//! - **Transport**: Wire I/O for one channel (polling or WebSocket)
//! - **Event thread**: Serializes every state change, callbacks included
//!
//! Key design principles:
//!
//! - Network I/O runs on tokio; results hop back to the event thread
//! - Listeners never run under a lock and may call back into the socket
//! - Packets are buffered until the active transport is writable
//! - The connection starts on polling and upgrades when probing succeeds
//!
//! # Quick Start
//!
//! ```no_run
//! use engineio_client::{Result, Socket, SocketEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let socket = Socket::from_uri("http://localhost:3000")?;
//!
//!     socket.on("open", |_| println!("connected"));
//!     socket.on("message", |event| {
//!         if let SocketEvent::Message(data) = event {
//!             println!("received {data:?}");
//!         }
//!     });
//!
//!     socket.open();
//!     socket.send("hello");
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!     socket.close();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`socket`] | [`Socket`], options and events |
//! | [`transport`] | Polling and WebSocket transports |
//! | [`protocol`] | Packet codec and handshake |
//! | [`emitter`] | Named-event listener registry |
//! | [`thread`] | Serialized [`EventThread`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`util`] | Query strings and cache-busting ids |

// ============================================================================
// Modules
// ============================================================================

/// Event registry.
///
/// Listeners are keyed by event name and invoked on a snapshot, so they
/// may register or remove listeners while running.
pub mod emitter;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Engine.IO wire protocol.
///
/// Packet types, payload framing and the handshake.
pub mod protocol;

/// Engine.IO socket.
///
/// Use [`Socket::new`] or [`Socket::from_uri`] to create a connection.
pub mod socket;

/// Serialized executor for protocol state.
pub mod thread;

/// Transport layer.
///
/// HTTP long-polling and WebSocket channels behind one [`Transport`] trait.
pub mod transport;

/// URI helpers.
pub mod util;

#[cfg(test)]
pub(crate) mod test_utils;

// ============================================================================
// Re-exports
// ============================================================================

// Socket types
pub use socket::{
    ReadyState, Socket, SocketEvent, SocketOptions, TransportOverrides, UpgradeMemory,
};

// Transport types
pub use transport::{
    HttpClient, HttpResponse, ReqwestHttpClient, Transport, TransportKind, TungsteniteConnector,
    WebSocketConnector,
};

// Protocol types
pub use protocol::{HandshakeData, Packet, PacketData, PacketType};

// Event types
pub use emitter::{Emitter, EventName, ListenerId};
pub use thread::EventThread;

// Error types
pub use error::{Error, Result};
