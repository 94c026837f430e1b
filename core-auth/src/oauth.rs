//! OAuth 2.0 Authorization Flow with PKCE
//!
//! Implements RFC 6749 (authorization code grant) and RFC 7636 (PKCE) against
//! the Google identity endpoints:
//! - Building the consent URL (offline access, so a refresh token is issued)
//! - Exchanging an authorization code for tokens
//! - Refreshing an access token
//!
//! Tokens, codes and verifiers are never logged.
//!
//! # Example
//!
//! ```ignore
//! use core_auth::oauth::{OAuthConfig, OAuthFlowManager};
//!
//! let config = OAuthConfig::google_photos("client-id", Some("secret".into()), "http://localhost:3000/auth/google/callback/");
//! let flow = OAuthFlowManager::new(config, http_client);
//! let (auth_url, verifier) = flow.build_auth_url()?;
//! // user visits auth_url and pastes back the code
//! let tokens = flow.exchange_code(&code, Some(&verifier)).await?;
//! ```

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Photos Library scopes: read albums, share them, append media.
pub const PHOTOS_LIBRARY_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/photoslibrary.readonly",
    "https://www.googleapis.com/auth/photoslibrary.sharing",
    "https://www.googleapis.com/auth/photoslibrary.appendonly",
];

const MAX_REFRESH_ATTEMPTS: u32 = 3;

/// Identity-provider exchange capability.
///
/// Implemented by [`OAuthFlowManager`]; the token lifecycle manager only talks
/// to this trait so it can be exercised without a network.
#[async_trait]
pub trait IdentityExchange: Send + Sync {
    /// Trade an authorization code for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        verifier: Option<&PkceVerifier>,
    ) -> Result<OAuthTokens>;

    /// Obtain a new access token. The returned refresh token is `Some` only
    /// when the provider rotated it.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens>;
}

/// OAuth 2.0 provider configuration.
#[derive(Clone)]
pub struct OAuthConfig {
    /// Human-readable provider name used in logs and events
    pub provider: String,
    pub client_id: String,
    /// OAuth client secret (optional for public clients)
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
}

impl OAuthConfig {
    /// Google identity endpoints with the Photos Library scopes.
    pub fn google_photos(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            provider: "Google Photos".to_string(),
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
            scopes: PHOTOS_LIBRARY_SCOPES.iter().map(|s| s.to_string()).collect(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// PKCE (Proof Key for Code Exchange) verifier.
///
/// Only the challenge derived from the verifier is sent with the consent URL;
/// the verifier itself accompanies the code exchange.
#[derive(Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    /// 32 random bytes for the verifier and 16 for the state, both
    /// base64-url-encoded without padding.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Self { verifier, state }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// S256 challenge: BASE64URL(SHA256(code_verifier))
    pub fn challenge(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceVerifier")
            .field("verifier", &"[REDACTED]")
            .field("state", &self.state)
            .finish()
    }
}

/// OAuth 2.0 flow manager.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn provider(&self) -> &str {
        &self.config.provider
    }

    /// Build the consent URL with a fresh PKCE challenge.
    ///
    /// Returns the URL and the verifier to pass to
    /// [`exchange_code`](IdentityExchange::exchange_code).
    #[instrument(skip(self), fields(provider = %self.config.provider))]
    pub fn build_auth_url(&self) -> Result<(String, PkceVerifier)> {
        let verifier = PkceVerifier::new();
        let challenge = verifier.challenge();

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::Other(format!("Invalid auth URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", verifier.state())
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");

        debug!("Built authorization URL");
        Ok((url.to_string(), verifier))
    }

    fn token_request(&self, params: &[(&str, &str)]) -> Result<HttpRequest> {
        let mut form: Vec<(&str, &str)> = params.to_vec();
        form.push(("client_id", &self.config.client_id));
        if let Some(ref client_secret) = self.config.client_secret {
            form.push(("client_secret", client_secret));
        }

        HttpRequest::post(self.config.token_url.clone())
            .form(&form)
            .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))
    }

    fn error_body(response: &HttpResponse) -> String {
        response
            .text()
            .unwrap_or_else(|_| "Unable to read error response".to_string())
    }

    fn parse_tokens(response: &HttpResponse) -> Result<OAuthTokens> {
        let token_response: TokenResponse = response
            .json()
            .map_err(|e| AuthError::Other(format!("Failed to parse token response: {}", e)))?;

        Ok(OAuthTokens::new(
            token_response.access_token,
            token_response.refresh_token,
            token_response.expires_in,
        ))
    }
}

#[async_trait]
impl IdentityExchange for OAuthFlowManager {
    #[instrument(skip(self, code, verifier), fields(provider = %self.config.provider))]
    async fn exchange_code(
        &self,
        code: &str,
        verifier: Option<&PkceVerifier>,
    ) -> Result<OAuthTokens> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        if let Some(verifier) = verifier {
            params.push(("code_verifier", verifier.verifier()));
        }

        debug!(pkce = verifier.is_some(), "Exchanging authorization code for tokens");

        let request = self.token_request(&params)?;
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.is_success() {
            let status = response.status;
            let error_body = Self::error_body(&response);
            warn!(status, error = %error_body, "Authorization code exchange failed");

            return Err(AuthError::InvalidAuthCode(format!(
                "Token endpoint returned {}: {}",
                status, error_body
            )));
        }

        let tokens = Self::parse_tokens(&response)?;
        info!(
            expires_at = %tokens.expires_at,
            refresh_token_issued = tokens.refresh_token.is_some(),
            "Exchanged authorization code for tokens"
        );
        Ok(tokens)
    }

    /// 5xx answers are retried with exponential backoff up to three attempts;
    /// 4xx answers (revoked or invalid refresh token) fail immediately.
    #[instrument(skip(self, refresh_token), fields(provider = %self.config.provider))]
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let request = self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])?;

        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = self
                .http_client
                .execute(request.clone())
                .await
                .map_err(|e| AuthError::NetworkError(e.to_string()))?;

            if response.is_success() {
                let tokens = Self::parse_tokens(&response)?;
                info!(
                    expires_at = %tokens.expires_at,
                    rotated = tokens.refresh_token.is_some(),
                    "Refreshed access token"
                );
                return Ok(tokens);
            }

            let status = response.status;

            if response.is_client_error() {
                let error_body = Self::error_body(&response);
                warn!(status, error = %error_body, "Token refresh rejected");

                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token endpoint returned {}: {}",
                    status, error_body
                )));
            }

            if attempts >= MAX_REFRESH_ATTEMPTS {
                let error_body = Self::error_body(&response);
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token refresh failed after {} attempts. Last error: {} - {}",
                    attempts, status, error_body
                )));
            }

            let delay = Duration::from_millis(100 * 2u64.pow(attempts - 1));
            warn!(
                status,
                attempts,
                delay_ms = delay.as_millis() as u64,
                "Token refresh failed, retrying"
            );
            sleep(delay).await;
        }
    }
}

/// Token endpoint response body.
#[derive(Debug, Deserialize, Serialize)]
struct TokenResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn config() -> OAuthConfig {
        OAuthConfig::google_photos(
            "test-client",
            Some("secret".to_string()),
            "http://localhost:3000/auth/google/callback/",
        )
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn form_of(request: &HttpRequest) -> HashMap<String, String> {
        let body = request.body.as_ref().expect("token request has a body");
        serde_urlencoded::from_bytes(body).unwrap()
    }

    #[test]
    fn test_pkce_verifier_generation() {
        let verifier = PkceVerifier::new();
        assert!(verifier.verifier().len() >= 43);
        assert_eq!(verifier.challenge(), verifier.challenge());

        let other = PkceVerifier::new();
        assert_ne!(verifier.verifier(), other.verifier());
        assert_ne!(verifier.state(), other.state());
    }

    #[test]
    fn test_pkce_challenge_rfc7636_vector() {
        let verifier = PkceVerifier {
            verifier: "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string(),
            state: "state".to_string(),
        };

        assert_eq!(
            verifier.challenge(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_build_auth_url() {
        let manager = OAuthFlowManager::new(config(), Arc::new(MockHttpClient::new()));
        let (url, verifier) = manager.build_auth_url().unwrap();
        let parsed = Url::parse(&url).unwrap();
        let query: HashMap<String, String> = parsed.query_pairs().into_owned().collect();

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert_eq!(query["client_id"], "test-client");
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["access_type"], "offline");
        assert_eq!(query["state"], verifier.state());
        assert_eq!(query["code_challenge"], verifier.challenge());
        assert_eq!(query["code_challenge_method"], "S256");
        assert!(query["scope"].contains("photoslibrary.appendonly"));
        assert_eq!(query["scope"].split(' ').count(), 3);
    }

    #[test]
    fn test_build_auth_url_invalid_url() {
        let mut config = config();
        config.auth_url = "not a valid url".to_string();
        let manager = OAuthFlowManager::new(config, Arc::new(MockHttpClient::new()));

        assert!(manager.build_auth_url().is_err());
    }

    #[tokio::test]
    async fn test_exchange_code_sends_verifier() {
        let verifier = PkceVerifier::new();
        let expected_verifier = verifier.verifier().to_string();

        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(move |req| {
                let form = form_of(req);
                req.url == GOOGLE_TOKEN_URL
                    && form["grant_type"] == "authorization_code"
                    && form["code"] == "auth-code"
                    && form["code_verifier"] == expected_verifier
                    && form["client_secret"] == "secret"
            })
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"access_token":"ya29.a","refresh_token":"1//r","expires_in":3599}"#,
                ))
            });

        let manager = OAuthFlowManager::new(config(), Arc::new(http));
        let tokens = manager
            .exchange_code("auth-code", Some(&verifier))
            .await
            .unwrap();

        assert_eq!(tokens.access_token, "ya29.a");
        assert_eq!(tokens.refresh_token.as_deref(), Some("1//r"));
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(400, r#"{"error":"invalid_grant"}"#)));

        let manager = OAuthFlowManager::new(config(), Arc::new(http));
        let err = manager.exchange_code("stale", None).await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidAuthCode(msg) if msg.contains("invalid_grant")));
    }

    #[tokio::test]
    async fn test_refresh_without_rotation() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|req| {
                let form = form_of(req);
                form["grant_type"] == "refresh_token" && form["refresh_token"] == "1//r"
            })
            .times(1)
            .returning(|_| Ok(response(200, r#"{"access_token":"ya29.b"}"#)));

        let manager = OAuthFlowManager::new(config(), Arc::new(http));
        let tokens = manager.refresh_access_token("1//r").await.unwrap();

        assert_eq!(tokens.access_token, "ya29.b");
        assert_eq!(tokens.refresh_token, None);
    }

    #[tokio::test]
    async fn test_refresh_retries_server_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut http = MockHttpClient::new();
        http.expect_execute().times(3).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(response(503, "unavailable"))
            } else {
                Ok(response(200, r#"{"access_token":"ya29.c","expires_in":60}"#))
            }
        });

        let manager = OAuthFlowManager::new(config(), Arc::new(http));
        let tokens = manager.refresh_access_token("1//r").await.unwrap();

        assert_eq!(tokens.access_token, "ya29.c");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_refresh_client_error_not_retried() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(400, r#"{"error":"invalid_grant"}"#)));

        let manager = OAuthFlowManager::new(config(), Arc::new(http));
        let err = manager.refresh_access_token("revoked").await.unwrap_err();

        assert!(matches!(err, AuthError::TokenRefreshFailed(_)));
    }

    #[tokio::test]
    async fn test_refresh_transport_error() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::OperationFailed("Connection failed".to_string())));

        let manager = OAuthFlowManager::new(config(), Arc::new(http));
        let err = manager.refresh_access_token("1//r").await.unwrap_err();

        assert!(matches!(err, AuthError::NetworkError(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_token_response_deserialization_minimal() {
        let response: TokenResponse = serde_json::from_str(r#"{"access_token": "token"}"#).unwrap();
        assert_eq!(response.access_token, "token");
        assert_eq!(response.refresh_token, None);
        assert_eq!(response.expires_in, 3600);
    }

    #[test]
    fn test_config_debug_redacts_secret() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("\"secret\""));
        assert!(debug.contains("[REDACTED]"));
    }
}
