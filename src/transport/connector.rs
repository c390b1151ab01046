//! WebSocket client capability.
//!
//! [`WebSocketConnector`] opens a connection and hands back a split
//! [`WebSocketChannel`]: a sink of outbound frames and a stream of inbound
//! frames. Control frames never reach the transport; the stream ends when
//! the peer closes.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::future;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::Encoded;

// ============================================================================
// Frame
// ============================================================================

/// One WebSocket data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl From<Encoded> for Frame {
    fn from(encoded: Encoded) -> Self {
        match encoded {
            Encoded::Text(text) => Self::Text(text),
            Encoded::Binary(bytes) => Self::Binary(bytes),
        }
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes.into()),
        }
    }
}

// ============================================================================
// WebSocketChannel
// ============================================================================

/// Outbound half of a connection.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = Error> + Send>>;

/// Inbound half of a connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame>> + Send>>;

/// An established connection.
pub struct WebSocketChannel {
    /// Outbound frames.
    pub sink: FrameSink,
    /// Inbound frames.
    pub stream: FrameStream,
    /// Headers of the upgrade response.
    pub response_headers: Vec<(String, String)>,
}

impl fmt::Debug for WebSocketChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketChannel")
            .field("response_headers", &self.response_headers)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// WebSocketConnector
// ============================================================================

/// Opens WebSocket connections for the WebSocket transport.
#[async_trait]
pub trait WebSocketConnector: Send + Sync + fmt::Debug {
    /// Connects to `url`, sending `headers` with the upgrade request.
    async fn connect(&self, url: &str, headers: &[(String, String)]) -> Result<WebSocketChannel>;
}

// ============================================================================
// TungsteniteConnector
// ============================================================================

/// [`tokio_tungstenite`]-backed [`WebSocketConnector`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl WebSocketConnector for TungsteniteConnector {
    async fn connect(&self, url: &str, headers: &[(String, String)]) -> Result<WebSocketChannel> {
        let mut request = url.into_client_request()?;
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::config(format!("Invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::config(format!("Invalid header value: {e}")))?;
            request.headers_mut().append(name, value);
        }

        let (ws_stream, response) = connect_async(request).await?;
        debug!(url, status = %response.status(), "WebSocket connected");

        let response_headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();

        let (ws_write, ws_read) = ws_stream.split();

        let sink = ws_write
            .sink_map_err(Error::from)
            .with(|frame: Frame| future::ready(Ok::<Message, Error>(frame.into())));

        let stream = ws_read.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
                Ok(Message::Binary(bytes)) => Some(Ok(Frame::Binary(bytes.to_vec()))),
                // Ping, Pong and Close are handled by tungstenite
                Ok(_) => None,
                Err(e) => Some(Err(Error::from(e))),
            })
        });

        Ok(WebSocketChannel {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
            response_headers,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
