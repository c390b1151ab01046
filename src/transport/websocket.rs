//! WebSocket transport.
//!
//! The connection runs in its own task:
//!
//! - Inbound frames are decoded and handed to the event thread
//! - Outbound batches arrive as [`WsCommand::Frames`]; once every frame
//!   of a batch is written, `drain` is scheduled on the event thread
//! - [`WsCommand::Close`] (or dropping the command channel) closes the
//!   socket with a normal closure

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{Packet, decode_binary_packet, decode_packet, encode_packet};

use super::connector::{Frame, FrameSink, FrameStream, WebSocketChannel};
use super::{Transport, TransportCore, TransportEvent, TransportKind, TransportOptions, TransportState};

// ============================================================================
// WsCommand
// ============================================================================

/// Commands for the connection task.
enum WsCommand {
    /// Write a batch, then report `drain`.
    Frames(Vec<Frame>),
    /// Close with code 1000.
    Close,
}

// ============================================================================
// WebSocketTransport
// ============================================================================

#[derive(Default)]
struct WsState {
    command_tx: Option<mpsc::UnboundedSender<WsCommand>>,
    connect_task: Option<AbortHandle>,
}

/// WebSocket transport.
pub struct WebSocketTransport {
    core: TransportCore,
    state: Mutex<WsState>,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl WebSocketTransport {
    /// Creates a WebSocket transport.
    #[must_use]
    pub fn new(options: TransportOptions) -> Self {
        Self {
            core: TransportCore::new(TransportKind::WebSocket, options),
            state: Mutex::new(WsState::default()),
        }
    }

    // ========================================================================
    // Event Thread Handlers
    // ========================================================================

    fn on_connected(
        self: Arc<Self>,
        command_tx: mpsc::UnboundedSender<WsCommand>,
        response_headers: Vec<(String, String)>,
    ) {
        if !self.core.is(TransportState::Opening) {
            // Closed while connecting; dropping the sender ends the task.
            return;
        }

        {
            let mut state = self.state.lock();
            state.command_tx = Some(command_tx);
            state.connect_task = None;
        }

        if !response_headers.is_empty() {
            self.core
                .emitter()
                .emit(TransportEvent::ResponseHeaders(response_headers));
        }
        self.core.on_open();
    }

    fn on_frame(self: Arc<Self>, frame: Frame) {
        if !self.is_live() {
            return;
        }

        let packet = match frame {
            Frame::Text(text) => decode_packet(&text),
            Frame::Binary(bytes) => decode_binary_packet(&bytes),
        };
        self.core.on_packet(packet);
    }

    fn on_drain(self: Arc<Self>) {
        if !self.is_live() {
            return;
        }
        self.core.set_writable(true);
        self.core.emitter().emit(TransportEvent::Drain);
    }

    fn on_remote_close(self: Arc<Self>) {
        if !self.is_live() {
            return;
        }
        self.state.lock().command_tx = None;
        self.core.on_close();
    }

    fn on_failure(self: Arc<Self>, message: &str, error: Error) {
        if self.core.is(TransportState::Closed) {
            return;
        }
        self.core.on_error(message, Some(error));
    }

    fn is_live(&self) -> bool {
        matches!(
            self.core.ready_state(),
            Some(TransportState::Open | TransportState::Paused)
        )
    }

    // ========================================================================
    // Connection Task
    // ========================================================================

    async fn run_connection(self: Arc<Self>, uri: String, headers: Vec<(String, String)>) {
        let connector = Arc::clone(&self.core.options().connector);
        let thread = self.core.event_thread().clone();

        let WebSocketChannel {
            sink,
            stream,
            response_headers,
        } = match connector.connect(&uri, &headers).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(error = %e, "WebSocket connect failed");
                thread.exec(move || self.on_failure("websocket error", e));
                return;
            }
        };

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        {
            let this = Arc::clone(&self);
            thread.exec(move || this.on_connected(command_tx, response_headers));
        }

        Self::run_event_loop(self, sink, stream, command_rx).await;
    }

    async fn run_event_loop(
        this: Arc<Self>,
        mut ws_write: FrameSink,
        mut ws_read: FrameStream,
        mut command_rx: mpsc::UnboundedReceiver<WsCommand>,
    ) {
        let thread = this.core.event_thread().clone();

        loop {
            tokio::select! {
                // Incoming frames from the server
                frame = ws_read.next() => {
                    match frame {
                        Some(Ok(frame)) => {
                            let this = Arc::clone(&this);
                            thread.exec(move || this.on_frame(frame));
                        }

                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket error");
                            let this = Arc::clone(&this);
                            thread.exec(move || this.on_failure("websocket error", e));
                            break;
                        }

                        None => {
                            debug!("WebSocket closed by remote");
                            let this = Arc::clone(&this);
                            thread.exec(move || this.on_remote_close());
                            break;
                        }
                    }
                }

                // Commands from the transport
                command = command_rx.recv() => {
                    match command {
                        Some(WsCommand::Frames(frames)) => {
                            if let Err(e) = Self::write_frames(&mut ws_write, frames).await {
                                let this = Arc::clone(&this);
                                thread.exec(move || this.on_failure("websocket error", e));
                                break;
                            }
                            let this = Arc::clone(&this);
                            thread.exec(move || this.on_drain());
                        }

                        Some(WsCommand::Close) | None => {
                            debug!("Closing WebSocket");
                            let _ = ws_write.close().await;
                            break;
                        }
                    }
                }
            }
        }

        trace!("WebSocket event loop terminated");
    }

    async fn write_frames(ws_write: &mut FrameSink, frames: Vec<Frame>) -> Result<()> {
        for frame in frames {
            ws_write.feed(frame).await?;
        }
        ws_write.flush().await
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

impl Transport for WebSocketTransport {
    fn core(&self) -> &TransportCore {
        &self.core
    }

    fn do_open(self: Arc<Self>) {
        let uri = self.uri();
        let headers = self.core.options().extra_headers.clone();
        self.core
            .emitter()
            .emit(TransportEvent::RequestHeaders(headers.clone()));

        let runtime = self.core.options().runtime.clone();
        let this = Arc::clone(&self);
        let task = runtime.spawn(this.run_connection(uri, headers));
        self.state.lock().connect_task = Some(task.abort_handle());
    }

    fn do_close(self: Arc<Self>) {
        let (command_tx, connect_task) = {
            let mut state = self.state.lock();
            (state.command_tx.take(), state.connect_task.take())
        };

        if let Some(command_tx) = command_tx {
            let _ = command_tx.send(WsCommand::Close);
        } else if let Some(task) = connect_task {
            debug!("Aborting pending WebSocket connect");
            task.abort();
        }
    }

    fn write(self: Arc<Self>, packets: Vec<Packet>) {
        self.core.set_writable(false);

        let frames = packets
            .iter()
            .map(|packet| Frame::from(encode_packet(packet)))
            .collect();

        let sent = self
            .state
            .lock()
            .command_tx
            .as_ref()
            .is_some_and(|tx| tx.send(WsCommand::Frames(frames)).is_ok());

        if !sent {
            self.core.on_error("websocket error", Some(Error::ConnectionClosed));
        }
    }

    fn uri(&self) -> String {
        self.core.uri(("ws", "wss"))
    }
}

// ============================================================================
// Tests
// ============================================================================
