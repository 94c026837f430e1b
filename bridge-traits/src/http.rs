//! HTTP Client Abstraction
//!
//! Request/response values exchanged with the host's HTTP stack. The uploader
//! only ever talks to two kinds of endpoint: the OAuth token endpoint (form
//! posts) and the photo library API (JSON and raw byte uploads), so the
//! builders here cover exactly those shapes.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Outgoing request.
///
/// The `Debug` output omits the body and masks the `Authorization` header, so
/// requests can be traced without leaking tokens or file contents.
#[derive(Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    /// JSON body with a matching `Content-Type`.
    pub fn json<T: Serialize>(self, body: &T) -> Result<Self> {
        let json = serde_json::to_vec(body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON serialization failed: {}", e))
        })?;
        Ok(self
            .header("Content-Type", "application/json")
            .body(Bytes::from(json)))
    }

    /// `application/x-www-form-urlencoded` body, as token endpoints expect.
    pub fn form(self, fields: &[(&str, &str)]) -> Result<Self> {
        let encoded = serde_urlencoded::to_string(fields).map_err(|e| {
            BridgeError::OperationFailed(format!("Form encoding failed: {}", e))
        })?;
        Ok(self
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Bytes::from(encoded)))
    }

    /// Raw bytes sent as `application/octet-stream`.
    pub fn octet_stream(self, content: Bytes) -> Self {
        self.header("Content-Type", "application/octet-stream")
            .body(content)
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: HashMap<&str, &str> = self
            .headers
            .iter()
            .map(|(key, value)| {
                if key.eq_ignore_ascii_case("authorization") {
                    (key.as_str(), "[REDACTED]")
                } else {
                    (key.as_str(), value.as_str())
                }
            })
            .collect();

        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &headers)
            .field("body_len", &self.body.as_ref().map(Bytes::len))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON deserialization failed: {}", e))
        })
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid UTF-8: {}", e)))
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 4xx
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// 5xx
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// `Retry-After` in its delay-seconds form. HTTP dates are not parsed.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("Retry-After")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

/// Async HTTP client trait
///
/// Implementations own connection pooling, TLS and any transport-level retry.
/// Bearer tokens are supplied per request by the caller; the client never
/// refreshes credentials itself, and a 401 is returned as a normal response.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest};
///
/// async fn create(client: &dyn HttpClient, token: &str) -> Result<u16> {
///     let request = HttpRequest::post("https://photoslibrary.googleapis.com/v1/albums")
///         .bearer_token(token)
///         .json(&serde_json::json!({ "album": { "title": "Trip" } }))?;
///
///     Ok(client.execute(request).await?.status)
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request
    ///
    /// # Errors
    ///
    /// Transport failures only (connection, TLS, timeout). Any response the
    /// server produced, whatever its status, is returned as `Ok`.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}
