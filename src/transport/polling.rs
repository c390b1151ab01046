//! HTTP long-polling transport.
//!
//! At most one `GET` (the poll) and one `POST` (the write) are in flight.
//! The poll is re-issued every time a response has been processed while
//! the transport is open. A write clears `writable` until its `POST`
//! completes, then `drain` is emitted.
//!
//! # Pausing
//!
//! ```text
//! pause() ──► paused ──► wait for pollComplete (if polling)
//!                    └─► wait for drain        (if a write is in flight)
//!                                 │
//!                                 └──► on_paused()
//! ```
//!
//! `resume()` cancels a pause that has not completed and restarts the poll
//! cycle if no `GET` is in flight.

// ============================================================================
// Imports
// ============================================================================

use std::ops::ControlFlow;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use crate::emitter::ListenerId;
use crate::error::{Error, Result};
use crate::protocol::{HandshakeData, Packet, PacketType, decode_payload, encode_payload};

use super::http::HttpResponse;
use super::{
    EVENT_DRAIN, EVENT_POLL_COMPLETE, Transport, TransportCore, TransportEvent, TransportKind,
    TransportOptions, TransportState,
};

// ============================================================================
// Constants
// ============================================================================

const CONTENT_TYPE: &str = "text/plain;charset=UTF-8";

// ============================================================================
// PollingTransport
// ============================================================================

/// Mutable part of [`PollingTransport`].
#[derive(Default)]
struct PollState {
    /// A `GET` is in flight.
    polling: bool,
    /// Abort handle of the in-flight `GET`.
    poll_task: Option<AbortHandle>,
    /// `close()` arrived before the handshake response.
    close_deferred: bool,
    /// Pause waiting for in-flight requests.
    pending_pause: Option<PendingPause>,
}

/// HTTP long-polling transport.
pub struct PollingTransport {
    core: TransportCore,
    state: Mutex<PollState>,
}

impl std::fmt::Debug for PollingTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingTransport")
            .field("core", &self.core)
            .field("polling", &self.is_polling())
            .finish()
    }
}

impl PollingTransport {
    /// Creates a polling transport.
    #[must_use]
    pub fn new(options: TransportOptions) -> Self {
        Self {
            core: TransportCore::new(TransportKind::Polling, options),
            state: Mutex::new(PollState::default()),
        }
    }

    /// Returns `true` while a poll request is in flight.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.state.lock().polling
    }

    fn request_headers(&self, post: bool) -> Vec<(String, String)> {
        let mut headers = self.core.options().extra_headers.clone();
        if post {
            headers.push(("content-type".to_string(), CONTENT_TYPE.to_string()));
        }
        self.core
            .emitter()
            .emit(TransportEvent::RequestHeaders(headers.clone()));
        headers
    }

    // ========================================================================
    // Poll Cycle
    // ========================================================================

    fn poll(self: &Arc<Self>) {
        trace!("Polling");
        let uri = self.uri();
        let headers = self.request_headers(false);
        let http = Arc::clone(&self.core.options().http_client);
        let this = Arc::clone(self);

        let task = self.core.options().runtime.spawn(async move {
            let result = http.get(&uri, &headers).await;
            let thread = this.core.event_thread().clone();
            thread.exec(move || this.on_poll_response(result));
        });

        {
            let mut state = self.state.lock();
            state.polling = true;
            state.poll_task = Some(task.abort_handle());
        }

        self.core.emitter().emit(TransportEvent::Poll);
    }

    fn on_poll_response(self: Arc<Self>, result: Result<HttpResponse>) {
        if self.core.is(TransportState::Closed) {
            self.answer_deferred_close(result);
            return;
        }

        let body = match Self::check_response(result) {
            Ok(response) => {
                if !response.headers.is_empty() {
                    self.core
                        .emitter()
                        .emit(TransportEvent::ResponseHeaders(response.headers));
                }
                response.body
            }
            Err(e) => {
                self.core.on_error("xhr poll error", Some(e));
                return;
            }
        };

        let text = String::from_utf8_lossy(&body);
        trace!(data = %text, "Polling got data");

        decode_payload(&text, |packet, _, _| {
            if self.core.is(TransportState::Opening) {
                self.core.on_open();
            }

            if packet.kind == PacketType::Close {
                self.core.on_close();
                return ControlFlow::Break(());
            }

            self.core.on_packet(packet);

            if self.core.is(TransportState::Closed) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        if self.core.is(TransportState::Closed) {
            return;
        }

        {
            let mut state = self.state.lock();
            state.polling = false;
            state.poll_task = None;
        }
        self.core.emitter().emit(TransportEvent::PollComplete);

        match self.core.ready_state() {
            Some(TransportState::Open) => self.poll(),
            state => trace!(?state, "Ignoring poll - transport state"),
        }
    }

    /// A `close()` issued while opening waits for the handshake, then
    /// tells the server to drop the session it just created.
    fn answer_deferred_close(self: Arc<Self>, result: Result<HttpResponse>) {
        if !std::mem::take(&mut self.state.lock().close_deferred) {
            return;
        }

        let Ok(response) = Self::check_response(result) else {
            return;
        };

        let text = String::from_utf8_lossy(&response.body);
        let mut sid = None;
        decode_payload(&text, |packet, _, _| {
            if packet.kind == PacketType::Open
                && let Some(data) = packet.text()
                && let Ok(handshake) = HandshakeData::parse(data)
            {
                sid = Some(handshake.sid);
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        });

        if let Some(sid) = sid {
            debug!("Transport open - closing");
            self.core.set_query("sid", &sid);
            self.write_close();
        }
    }

    fn check_response(result: Result<HttpResponse>) -> Result<HttpResponse> {
        let response = result?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(Error::http(response.status))
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    fn post(self: &Arc<Self>, packets: &[Packet]) {
        let body = encode_payload(packets).into_bytes();
        let uri = self.uri();
        let headers = self.request_headers(true);
        let http = Arc::clone(&self.core.options().http_client);
        let this = Arc::clone(self);

        self.core.options().runtime.spawn(async move {
            let result = http.post(&uri, &headers, body).await;
            let thread = this.core.event_thread().clone();
            thread.exec(move || this.on_post_response(result));
        });
    }

    fn on_post_response(self: Arc<Self>, result: Result<HttpResponse>) {
        if self.core.is(TransportState::Closed) {
            return;
        }

        match Self::check_response(result) {
            Ok(_) => {
                self.core.set_writable(true);
                self.core.emitter().emit(TransportEvent::Drain);
            }
            Err(e) => self.core.on_error("xhr post error", Some(e)),
        }
    }

    fn write_close(self: &Arc<Self>) {
        debug!("Writing close packet");
        self.post(&[Packet::new(PacketType::Close)]);
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

impl Transport for PollingTransport {
    fn core(&self) -> &TransportCore {
        &self.core
    }

    fn do_open(self: Arc<Self>) {
        self.poll();
    }

    fn do_close(self: Arc<Self>) {
        if self.core.is(TransportState::Open) {
            debug!("Transport open - closing");
            if let Some(task) = self.state.lock().poll_task.take() {
                task.abort();
            }
            self.write_close();
        } else {
            // The handshake is still in flight; the close goes out with its sid.
            debug!("Transport not open - deferring close");
            self.state.lock().close_deferred = true;
        }
    }

    fn write(self: Arc<Self>, packets: Vec<Packet>) {
        self.core.set_writable(false);
        self.post(&packets);
    }

    fn uri(&self) -> String {
        self.core.uri(("http", "https"))
    }

    fn pause(self: Arc<Self>, on_paused: Box<dyn FnOnce() + Send>) {
        let thread = self.core.event_thread().clone();
        thread.exec(move || {
            self.core.set_ready_state(TransportState::Paused);

            let polling = self.is_polling();
            let writable = self.core.writable();

            if !polling && writable {
                debug!("Paused");
                on_paused();
                return;
            }

            let waiter = Arc::new(PauseWaiter {
                remaining: Mutex::new(usize::from(polling) + usize::from(!writable)),
                on_paused: Mutex::new(Some(on_paused)),
            });
            let mut listeners = Vec::new();

            if polling {
                debug!("We are currently polling - waiting to pause");
                let waiter = Arc::clone(&waiter);
                let id = self.core.emitter().once(EVENT_POLL_COMPLETE, move |_| {
                    debug!("Pre-pause polling complete");
                    waiter.complete();
                });
                listeners.push((EVENT_POLL_COMPLETE, id));
            }

            if !writable {
                debug!("We are currently writing - waiting to pause");
                let waiter = Arc::clone(&waiter);
                let id = self.core.emitter().once(EVENT_DRAIN, move |_| {
                    debug!("Pre-pause writing complete");
                    waiter.complete();
                });
                listeners.push((EVENT_DRAIN, id));
            }

            self.state.lock().pending_pause = Some(PendingPause { waiter, listeners });
        });
    }

    fn resume(self: Arc<Self>) {
        let thread = self.core.event_thread().clone();
        thread.exec(move || {
            if !self.core.is(TransportState::Paused) {
                return;
            }
            debug!("Resuming");

            let (pending, polling) = {
                let mut state = self.state.lock();
                (state.pending_pause.take(), state.polling)
            };
            if let Some(pending) = pending {
                for (event, id) in pending.listeners {
                    self.core.emitter().off(event, id);
                }
                drop(pending.waiter.on_paused.lock().take());
            }

            self.core.set_ready_state(TransportState::Open);
            if !polling {
                self.poll();
            }
        });
    }
}

// ============================================================================
// PauseWaiter
// ============================================================================

/// A pause still waiting, with the listeners that complete it.
struct PendingPause {
    waiter: Arc<PauseWaiter>,
    listeners: Vec<(&'static str, ListenerId)>,
}

/// Counts down the in-flight requests a pause waits for.
struct PauseWaiter {
    remaining: Mutex<usize>,
    on_paused: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl PauseWaiter {
    fn complete(&self) {
        {
            let mut remaining = self.remaining.lock();
            *remaining = remaining.saturating_sub(1);
            if *remaining > 0 {
                return;
            }
        }

        if let Some(on_paused) = self.on_paused.lock().take() {
            debug!("Paused");
            on_paused();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
