//! HTTP client on reqwest with transport-level retry.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("photo-album-uploader/", env!("CARGO_PKG_VERSION"));

/// Retry applied below the upload orchestrator, for answers that say nothing
/// about the request itself: 5xx, 429 and connection failures.
///
/// 401 and other 4xx answers are never retried here; they reach the caller
/// on the first attempt so a stale token is noticed immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRetry {
    /// Total sends, including the first
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for TransportRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl TransportRetry {
    /// Single send, no retry.
    pub fn disabled() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    pub fn is_retryable(status: u16) -> bool {
        status == 429 || (500..600).contains(&status)
    }

    /// Pause after the `attempt`-th failed send (1-based). A server-supplied
    /// `Retry-After` wins over the exponential schedule; both are capped.
    fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        retry_after.unwrap_or(exponential).min(self.max_delay)
    }
}

pub struct ReqwestHttpClient {
    client: Client,
    retry: TransportRetry,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(60))
    }

    /// Default per-request timeout; requests may override it. Media uploads
    /// send whole files in one request and carry their own, longer timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            retry: TransportRetry::default(),
        }
    }

    pub fn with_retry(mut self, retry: TransportRetry) -> Self {
        self.retry = retry;
        self
    }

    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, &request.url);

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            // Bytes clones are reference-counted
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder
    }

    async fn into_response(response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to read body: {}", e)))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn transport_error(error: reqwest::Error) -> BridgeError {
        if error.is_timeout() {
            BridgeError::OperationFailed("Request timed out".to_string())
        } else if error.is_connect() {
            BridgeError::OperationFailed(format!("Connection failed: {}", error))
        } else {
            BridgeError::OperationFailed(error.to_string())
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(attempt, method = ?request.method, url = %request.url, "Sending HTTP request");

            let (outcome, retry_after) = match self.build_request(&request).send().await {
                Ok(response) => {
                    let response = Self::into_response(response).await?;
                    if !TransportRetry::is_retryable(response.status) {
                        return Ok(response);
                    }
                    warn!(status = response.status, attempt, "Retryable HTTP status");
                    let retry_after = response.retry_after();
                    (Ok(response), retry_after)
                }
                Err(e) => {
                    warn!(error = %e, attempt, "HTTP transport failure");
                    (Err(Self::transport_error(e)), None)
                }
            };

            if attempt >= attempts {
                // The last retryable response goes back to the caller as-is
                return outcome;
            }

            let delay = self.retry.delay_for(attempt, retry_after);
            debug!(delay_ms = delay.as_millis() as u64, "Retrying HTTP request");
            sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_client_creation() {
        let client = ReqwestHttpClient::new().unwrap();
        assert_eq!(client.retry, TransportRetry::default());

        let client = client.with_retry(TransportRetry::disabled());
        assert_eq!(client.retry.attempts, 1);
    }

    #[test]
    fn test_only_server_errors_and_throttling_retry() {
        assert!(TransportRetry::is_retryable(429));
        assert!(TransportRetry::is_retryable(503));
        assert!(!TransportRetry::is_retryable(401));
        assert!(!TransportRetry::is_retryable(400));
        assert!(!TransportRetry::is_retryable(200));
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let retry = TransportRetry {
            attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };

        assert_eq!(retry.delay_for(1, None), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2, None), Duration::from_millis(200));
        assert_eq!(retry.delay_for(8, None), Duration::from_millis(500));
    }

    #[test]
    fn test_retry_after_overrides_schedule_within_cap() {
        let retry = TransportRetry::default();

        assert_eq!(
            retry.delay_for(1, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(
            retry.delay_for(1, Some(Duration::from_secs(600))),
            retry.max_delay
        );
    }
}
