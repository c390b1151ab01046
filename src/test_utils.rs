//! In-memory server for transport and socket tests.
//!
//! [`FakeServer`] implements both I/O capabilities. Poll responses are
//! queued with [`FakeServer::push_poll`], posts and WebSocket frames are
//! recorded, and the WebSocket side can be driven frame by frame.

use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{sink, stream};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};
use crate::thread::EventThread;
use crate::transport::{
    Frame, HttpClient, HttpResponse, TransportOptions, WebSocketChannel, WebSocketConnector,
};
use crate::util::Query;

/// Handshake with session id `123`, no upgrades and long heartbeats.
pub(crate) const HANDSHAKE: &str = r#"0{"sid":"123","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

/// Builds an `open` packet.
pub(crate) fn handshake(sid: &str, upgrades: &[&str], ping_interval: u64, ping_timeout: u64) -> String {
    let upgrades = upgrades
        .iter()
        .map(|u| format!("\"{u}\""))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        r#"0{{"sid":"{sid}","upgrades":[{upgrades}],"pingInterval":{ping_interval},"pingTimeout":{ping_timeout}}}"#
    )
}

/// Installs a test writer subscriber once. `RUST_LOG` overrides the
/// default `engineio_client=debug` filter.
pub(crate) fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("engineio_client=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}

/// Polls `condition` until it holds; panics after five seconds.
pub(crate) async fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

enum PollReply {
    Body(String),
    Status(u16),
}

/// Scripted HTTP and WebSocket peer.
#[derive(Debug)]
pub(crate) struct FakeServer {
    polls_tx: mpsc::UnboundedSender<PollReply>,
    polls_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<PollReply>>,
    gets: AtomicUsize,
    posts: Mutex<Vec<(String, String)>>,
    post_gate: watch::Sender<bool>,
    ws_connects: Mutex<Vec<String>>,
    ws_fail_next: AtomicBool,
    ws_to_client: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    ws_sent: Arc<Mutex<Vec<Frame>>>,
    ws_client_closed: Arc<AtomicBool>,
}

impl std::fmt::Debug for PollReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Body(body) => write!(f, "Body({body:?})"),
            Self::Status(status) => write!(f, "Status({status})"),
        }
    }
}

impl FakeServer {
    pub(crate) fn new() -> Arc<Self> {
        init_logging();
        let (polls_tx, polls_rx) = mpsc::unbounded_channel();
        let (post_gate, _) = watch::channel(false);
        Arc::new(Self {
            polls_tx,
            polls_rx: tokio::sync::Mutex::new(polls_rx),
            gets: AtomicUsize::new(0),
            posts: Mutex::new(Vec::new()),
            post_gate,
            ws_connects: Mutex::new(Vec::new()),
            ws_fail_next: AtomicBool::new(false),
            ws_to_client: Mutex::new(None),
            ws_sent: Arc::new(Mutex::new(Vec::new())),
            ws_client_closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Options pointing both capabilities at this server.
    pub(crate) fn transport_options(self: &Arc<Self>, runtime: Handle) -> TransportOptions {
        TransportOptions {
            hostname: "localhost".to_string(),
            port: 0,
            secure: false,
            path: "/engine.io/".to_string(),
            query: Query::new(),
            timestamp_requests: false,
            timestamp_param: "t".to_string(),
            extra_headers: Vec::new(),
            http_client: Arc::clone(self) as Arc<dyn HttpClient>,
            connector: Arc::clone(self) as Arc<dyn WebSocketConnector>,
            runtime,
            event_thread: EventThread::new(),
        }
    }

    // ========================================================================
    // Polling Side
    // ========================================================================

    pub(crate) fn push_poll(&self, body: impl Into<String>) {
        let _ = self.polls_tx.send(PollReply::Body(body.into()));
    }

    pub(crate) fn fail_next_poll(&self, status: u16) {
        let _ = self.polls_tx.send(PollReply::Status(status));
    }

    pub(crate) fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub(crate) fn posts(&self) -> Vec<String> {
        self.posts.lock().iter().map(|(_, body)| body.clone()).collect()
    }

    pub(crate) fn post_uris(&self) -> Vec<String> {
        self.posts.lock().iter().map(|(uri, _)| uri.clone()).collect()
    }

    /// While held, `POST` requests are recorded but do not complete.
    pub(crate) fn hold_posts(&self, hold: bool) {
        self.post_gate.send_replace(hold);
    }

    // ========================================================================
    // WebSocket Side
    // ========================================================================

    pub(crate) fn ws_connect_count(&self) -> usize {
        self.ws_connects.lock().len()
    }

    pub(crate) fn ws_uris(&self) -> Vec<String> {
        self.ws_connects.lock().clone()
    }

    pub(crate) fn fail_next_connect(&self) {
        self.ws_fail_next.store(true, Ordering::SeqCst);
    }

    /// Sends a frame to the most recent WebSocket client.
    pub(crate) fn push_ws(&self, frame: Frame) {
        if let Some(tx) = self.ws_to_client.lock().as_ref() {
            let _ = tx.send(frame);
        }
    }

    /// Ends the server-to-client stream.
    pub(crate) fn close_ws(&self) {
        self.ws_to_client.lock().take();
    }

    pub(crate) fn ws_sent(&self) -> Vec<Frame> {
        self.ws_sent.lock().clone()
    }

    /// Returns `true` once the client dropped its sink.
    pub(crate) fn ws_client_closed(&self) -> bool {
        self.ws_client_closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for FakeServer {
    async fn get(&self, _url: &str, _headers: &[(String, String)]) -> Result<HttpResponse> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let reply = self.polls_rx.lock().await.recv().await;
        match reply {
            Some(PollReply::Body(body)) => Ok(HttpResponse::ok(body)),
            Some(PollReply::Status(status)) => Ok(HttpResponse {
                status,
                ..HttpResponse::default()
            }),
            None => Err(Error::ConnectionClosed),
        }
    }

    async fn post(
        &self,
        url: &str,
        _headers: &[(String, String)],
        body: Vec<u8>,
    ) -> Result<HttpResponse> {
        let body = String::from_utf8_lossy(&body).into_owned();
        self.posts.lock().push((url.to_string(), body));

        let mut gate = self.post_gate.subscribe();
        let _ = gate.wait_for(|held| !*held).await;
        Ok(HttpResponse::ok("ok"))
    }
}

#[async_trait]
impl WebSocketConnector for FakeServer {
    async fn connect(&self, url: &str, _headers: &[(String, String)]) -> Result<WebSocketChannel> {
        self.ws_connects.lock().push(url.to_string());
        if self.ws_fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::transport("connection refused"));
        }

        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel::<Frame>();
        let (from_client_tx, mut from_client_rx) = mpsc::unbounded_channel::<Frame>();
        *self.ws_to_client.lock() = Some(to_client_tx);
        self.ws_client_closed.store(false, Ordering::SeqCst);

        let sent = Arc::clone(&self.ws_sent);
        let closed = Arc::clone(&self.ws_client_closed);
        tokio::spawn(async move {
            while let Some(frame) = from_client_rx.recv().await {
                sent.lock().push(frame);
            }
            closed.store(true, Ordering::SeqCst);
        });

        let sink = sink::unfold(from_client_tx, |tx, frame: Frame| async move {
            tx.send(frame).map_err(|_| Error::ConnectionClosed)?;
            Ok::<_, Error>(tx)
        });
        let stream = stream::unfold(to_client_rx, |mut rx| async move {
            rx.recv().await.map(|frame| (Ok(frame), rx))
        });

        Ok(WebSocketChannel {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
            response_headers: Vec::new(),
        })
    }
}
