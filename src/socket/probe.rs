//! Upgrade probe.
//!
//! One [`Probe`] per candidate transport. It opens the candidate next to
//! the active transport, verifies it with a `ping probe` / `pong probe`
//! round trip, and commits the switch once the active transport is paused.
//!
//! ```text
//!            pong "probe"              paused
//! probing ───────────────► succeeded ─────────► upgraded
//!    │                         │
//!    │ error, bad reply,       │ error, close
//!    │ close                   │
//!    ├─────────────────────────┴──────────────► failed   (upgradeError)
//!    │                  resumes the active transport if it was pausing
//!    │
//!    │ another probe is upgrading
//!    └────────────────────────────────────────► aborted  (upgradeError)
//! ```
//!
//! Every listener the probe installs is recorded and removed on the first
//! terminal transition, so late events cannot act twice.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::emitter::ListenerId;
use crate::error::Error;
use crate::protocol::{Packet, PacketType};
use crate::transport::{self, Transport, TransportEvent, TransportKind};

use super::core::{ReadyState, SocketInner};
use super::event::{EVENT_CLOSE, EVENT_UPGRADING, SocketEvent};

// ============================================================================
// ProbeState
// ============================================================================

/// Lifecycle of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProbeState {
    /// Waiting for the candidate to open and answer.
    Probing,
    /// Answered; waiting for the active transport to pause.
    Succeeded,
    /// Committed as the active transport.
    Upgraded,
    /// Faulted or answered wrongly.
    Failed,
    /// Lost to another probe.
    Aborted,
}

/// A listener to remove on cleanup.
enum Subscription {
    Transport(&'static str, ListenerId),
    Socket(&'static str, ListenerId),
}

// ============================================================================
// Probe
// ============================================================================

pub(crate) struct Probe {
    kind: TransportKind,
    socket: Weak<SocketInner>,
    transport: Arc<dyn Transport>,
    state: Mutex<ProbeState>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Probe {
    /// Creates the candidate transport and starts probing it.
    pub(crate) fn start(socket: &Arc<SocketInner>, kind: TransportKind) {
        debug!(transport = %kind, "Probing transport");

        let transport = socket.create_transport(kind);
        socket.upgrade_memory().set(false);

        let probe = Arc::new(Self {
            kind,
            socket: Arc::downgrade(socket),
            transport: Arc::clone(&transport),
            state: Mutex::new(ProbeState::Probing),
            subscriptions: Mutex::new(Vec::new()),
        });

        let transport_events = transport.core().emitter();
        let subscriptions = vec![
            Subscription::Transport(
                transport::EVENT_OPEN,
                transport_events.once(transport::EVENT_OPEN, {
                    let probe = Arc::clone(&probe);
                    move |_| probe.on_transport_open()
                }),
            ),
            Subscription::Transport(
                transport::EVENT_ERROR,
                transport_events.once(transport::EVENT_ERROR, {
                    let probe = Arc::clone(&probe);
                    move |event| {
                        if let TransportEvent::Error(error) = event {
                            let error = Error::probe_with(probe.kind.name(), Arc::clone(error));
                            probe.fail(ProbeState::Failed, error);
                        }
                    }
                }),
            ),
            Subscription::Transport(
                transport::EVENT_CLOSE,
                transport_events.once(transport::EVENT_CLOSE, {
                    let probe = Arc::clone(&probe);
                    move |_| {
                        let error = Error::probe(probe.kind.name(), "probe error: transport closed");
                        probe.fail(ProbeState::Failed, error);
                    }
                }),
            ),
            Subscription::Socket(
                EVENT_CLOSE,
                socket.emitter().once(EVENT_CLOSE, {
                    let probe = Arc::clone(&probe);
                    move |_| {
                        let error = Error::probe(probe.kind.name(), "probe error: socket closed");
                        probe.fail(ProbeState::Failed, error);
                    }
                }),
            ),
            Subscription::Socket(
                EVENT_UPGRADING,
                socket.emitter().once(EVENT_UPGRADING, {
                    let probe = Arc::clone(&probe);
                    move |event| {
                        if let SocketEvent::Upgrading(winner) = event {
                            probe.on_upgrading(*winner);
                        }
                    }
                }),
            ),
        ];
        *probe.subscriptions.lock() = subscriptions;

        transport.open();
    }

    #[inline]
    fn state(&self) -> ProbeState {
        *self.state.lock()
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    fn on_transport_open(self: &Arc<Self>) {
        if self.state() != ProbeState::Probing {
            return;
        }
        debug!(transport = %self.kind, "Probe transport opened");

        let id = self.transport.core().emitter().once(transport::EVENT_PACKET, {
            let probe = Arc::clone(self);
            move |event| {
                if let TransportEvent::Packet(packet) = event {
                    probe.on_reply(packet);
                }
            }
        });
        self.subscriptions
            .lock()
            .push(Subscription::Transport(transport::EVENT_PACKET, id));

        let ping = Packet::with_data(PacketType::Ping, "probe");
        if let Err(e) = Arc::clone(&self.transport).send(vec![ping]) {
            self.fail(ProbeState::Failed, Error::probe_with(self.kind.name(), Arc::new(e)));
        }
    }

    fn on_reply(self: &Arc<Self>, packet: &Packet) {
        let Some(socket) = self.socket.upgrade() else {
            return;
        };

        if packet.kind != PacketType::Pong || packet.text() != Some("probe") {
            debug!(transport = %self.kind, kind = %packet.kind, "Probe transport failed");
            self.fail(ProbeState::Failed, Error::probe(self.kind.name(), "probe error"));
            return;
        }

        {
            let mut state = self.state.lock();
            if *state != ProbeState::Probing {
                return;
            }
            *state = ProbeState::Succeeded;
        }

        debug!(transport = %self.kind, "Probe transport pong");
        socket.set_upgrading(true);
        socket.emitter().emit(SocketEvent::Upgrading(self.kind));

        if self.state() != ProbeState::Succeeded {
            return;
        }

        socket
            .upgrade_memory()
            .set(self.kind == TransportKind::WebSocket);

        let Some(current) = socket.current_transport() else {
            self.fail(ProbeState::Failed, Error::probe(self.kind.name(), "no active transport"));
            return;
        };

        debug!(transport = %current.kind(), "Pausing current transport");
        let probe = Arc::clone(self);
        current.pause(Box::new(move || probe.on_paused()));
    }

    fn on_paused(self: &Arc<Self>) {
        if self.state() != ProbeState::Succeeded {
            return;
        }
        let Some(socket) = self.socket.upgrade() else {
            return;
        };
        if socket.ready_state() == Some(ReadyState::Closed) {
            return;
        }

        debug!(transport = %self.kind, "Changing transport and sending upgrade packet");
        self.cleanup();
        *self.state.lock() = ProbeState::Upgraded;

        socket.set_transport(Arc::clone(&self.transport));
        if let Err(e) = Arc::clone(&self.transport).send(vec![Packet::new(PacketType::Upgrade)]) {
            warn!(error = %e, "Failed to send upgrade packet");
        }
        socket.emitter().emit(SocketEvent::Upgrade(self.kind));
        socket.set_upgrading(false);
        socket.flush();
    }

    fn on_upgrading(self: &Arc<Self>, winner: TransportKind) {
        if winner == self.kind {
            return;
        }
        debug!(winner = %winner, transport = %self.kind, "Upgrade won elsewhere - aborting probe");
        let error = Error::probe(self.kind.name(), format!("{winner} upgraded first"));
        self.fail(ProbeState::Aborted, error);
    }

    /// Freezes the probe and reports `error` as `upgradeError`.
    fn fail(self: &Arc<Self>, next: ProbeState, error: Error) {
        let Some(previous) = self.freeze(next) else {
            return;
        };
        debug!(transport = %self.kind, error = %error, "Probe transport failed");

        let Some(socket) = self.socket.upgrade() else {
            return;
        };

        // The active transport may already be pausing for this probe.
        let resumed = previous == ProbeState::Succeeded;
        if resumed {
            socket.set_upgrading(false);
            if let Some(current) = socket.current_transport() {
                current.resume();
            }
        }

        socket
            .emitter()
            .emit(SocketEvent::UpgradeError(Arc::new(error)));

        if resumed {
            socket.flush();
        }
    }

    /// Moves to a terminal state, detaches every listener and closes the
    /// candidate. Returns the previous state, or `None` if already terminal.
    fn freeze(&self, next: ProbeState) -> Option<ProbeState> {
        let previous = {
            let mut state = self.state.lock();
            let previous = *state;
            if !matches!(previous, ProbeState::Probing | ProbeState::Succeeded) {
                return None;
            }
            *state = next;
            previous
        };

        self.cleanup();
        Arc::clone(&self.transport).close();
        Some(previous)
    }

    fn cleanup(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        let socket = self.socket.upgrade();

        for subscription in subscriptions {
            match subscription {
                Subscription::Transport(event, id) => {
                    self.transport.core().emitter().off(event, id);
                }
                Subscription::Socket(event, id) => {
                    if let Some(socket) = &socket {
                        socket.emitter().off(event, id);
                    }
                }
            }
        }
    }
}
