//! Engine.IO socket.
//!
//! A [`Socket`] owns one active transport, negotiates the session through
//! the handshake, keeps the connection alive, buffers outbound packets and
//! upgrades from polling to WebSocket when the server offers it.
//!
//! ```text
//!   open()          handshake              close() / error / timeout
//! ─────────► opening ─────────► open ─────────────────────────────► closed
//!                                 │  close() with pending writes    ▲
//!                                 └──────────► closing ─────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`Socket`] state machine |
//! | `event` | [`SocketEvent`] and event names |
//! | `options` | [`SocketOptions`] and per-transport overrides |
//! | `memory` | [`UpgradeMemory`] |
//! | `probe` | Upgrade probe (internal) |
//! | `heartbeat` | Liveness deadline (internal) |

// ============================================================================
// Submodules
// ============================================================================

/// Socket state machine.
pub mod core;

/// Socket events.
pub mod event;

/// Remembered upgrade outcome.
pub mod memory;

/// Socket configuration.
pub mod options;

mod heartbeat;
mod probe;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{ReadyState, Socket};
pub use event::SocketEvent;
pub use memory::UpgradeMemory;
pub use options::{SocketOptions, TransportOverrides};
