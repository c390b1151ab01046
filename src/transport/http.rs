//! HTTP client capability for the polling transport.
//!
//! The polling transport only needs `GET` and `POST` with custom headers,
//! so this is all [`HttpClient`] exposes. [`ReqwestHttpClient`] is the
//! default implementation; tests substitute an in-memory server.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;

use crate::error::Result;

// ============================================================================
// HttpResponse
// ============================================================================

/// A minimal HTTP response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,

    /// Body bytes.
    pub body: Vec<u8>,

    /// Response headers (lowercase keys).
    pub headers: Vec<(String, String)>,
}

impl HttpResponse {
    /// Creates a `200 OK` response with `body`.
    #[must_use]
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            headers: Vec::new(),
        }
    }

    /// Returns `true` for a 2xx status.
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Looks up a header by name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        let lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == lower)
            .map(|(_, v)| v.as_str())
    }
}

// ============================================================================
// HttpClient
// ============================================================================

/// Async HTTP client used by the polling transport.
#[async_trait]
pub trait HttpClient: Send + Sync + fmt::Debug {
    /// Sends a `GET` request.
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse>;

    /// Sends a `POST` request with `body`.
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
    ) -> Result<HttpResponse>;
}

// ============================================================================
// ReqwestHttpClient
// ============================================================================

/// [`reqwest`]-backed [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    inner: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Creates a client with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
        }
    }

    /// Creates a client whose requests time out after `timeout`.
    ///
    /// Keep `timeout` above the server's ping interval, a poll is held
    /// open for that long.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`](crate::Error::Request) if the TLS backend cannot be initialized.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let inner = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { inner })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn from_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    async fn execute(builder: RequestBuilder, headers: &[(String, String)]) -> Result<HttpResponse> {
        let builder = headers
            .iter()
            .fold(builder, |builder, (name, value)| builder.header(name, value));

        let resp = builder.send().await?;
        let status = resp.status().as_u16();

        let resp_headers: Vec<(String, String)> = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();

        let body = resp.bytes().await?.to_vec();

        Ok(HttpResponse {
            status,
            body,
            headers: resp_headers,
        })
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse> {
        Self::execute(self.inner.get(url), headers).await
    }

    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
    ) -> Result<HttpResponse> {
        Self::execute(self.inner.post(url).body(body), headers).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = HttpResponse {
            status: 200,
            body: Vec::new(),
            headers: vec![("set-cookie".to_string(), "io=abc".to_string())],
        };
        assert_eq!(response.header("Set-Cookie"), Some("io=abc"));
        assert_eq!(response.header("content-type"), None);
    }

    #[test]
    fn test_is_success() {
        assert!(HttpResponse::ok("ok").is_success());
        assert!(
            !HttpResponse {
                status: 400,
                ..HttpResponse::default()
            }
            .is_success()
        );
    }

    #[test]
    fn test_with_timeout_builds_client() {
        assert!(ReqwestHttpClient::with_timeout(Duration::from_secs(30)).is_ok());
    }
}
