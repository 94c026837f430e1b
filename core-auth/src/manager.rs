//! # Token Lifecycle Manager
//!
//! Owns the session credential for the remote photo service.
//!
//! ## Overview
//!
//! The manager holds the short-lived access token in memory and keeps the
//! long-lived refresh token in the [`CredentialStore`]. It is the single
//! source of access tokens for the upload pipeline, which consumes it through
//! the [`AccessTokenProvider`] capability.
//!
//! ## Refresh
//!
//! Refreshes are single-flight: callers that arrive while a refresh is in
//! progress wait for it and share its outcome, success or failure, instead of
//! issuing their own exchange. A rotated refresh token is persisted before
//! the in-memory session is updated, so a crash never leaves the store behind
//! the provider.
//!
//! ## Usage
//!
//! ```ignore
//! use core_auth::{CredentialStore, TokenLifecycleManager};
//!
//! let manager = TokenLifecycleManager::new(store, exchange, event_bus, "Google Photos");
//! if !manager.bootstrap().await? {
//!     // no stored credential: run the authorization flow
//! }
//! let token = manager.access_token().await?;
//! ```

use crate::credential_store::CredentialStore;
use crate::error::{AuthError, Result};
use crate::oauth::IdentityExchange;
use crate::types::{AuthState, Credential, CredentialSummary, OAuthTokens};
use async_trait::async_trait;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, instrument, warn};

/// Default timeout for identity-provider exchanges (2 minutes)
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(120);

/// Access tokens this close to expiry are refreshed before use (5 minutes)
const TOKEN_REFRESH_BUFFER_SECS: i64 = 300;

/// Source of bearer tokens for remote calls.
///
/// The upload orchestrator asks for a token before every attempt and calls
/// [`refresh`](AccessTokenProvider::refresh) after an unauthorized answer.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Current access token, refreshed first if it is about to expire.
    async fn access_token(&self) -> Result<String>;

    /// Force a refresh of the access token.
    async fn refresh(&self) -> Result<()>;
}

#[derive(Debug, Default)]
struct SessionState {
    state: AuthState,
    credential: Option<Credential>,
}

/// Bookkeeping for single-flight refreshes, guarded by the refresh gate.
#[derive(Debug, Default)]
struct RefreshRecord {
    completed: u64,
    last_error: Option<AuthError>,
}

/// Session owner: bootstrap, authorization completion and refresh.
pub struct TokenLifecycleManager {
    store: CredentialStore,
    exchange: Arc<dyn IdentityExchange>,
    event_bus: EventBus,
    provider: String,
    clock: Arc<dyn Clock>,
    exchange_timeout: Duration,
    session: RwLock<SessionState>,
    refresh_gate: Mutex<RefreshRecord>,
    /// Mirrors `RefreshRecord::completed` so callers can sample it without the gate
    completed_refreshes: AtomicU64,
}

impl TokenLifecycleManager {
    pub fn new(
        store: CredentialStore,
        exchange: Arc<dyn IdentityExchange>,
        event_bus: EventBus,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            store,
            exchange,
            event_bus,
            provider: provider.into(),
            clock: Arc::new(SystemClock),
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
            session: RwLock::new(SessionState::default()),
            refresh_gate: Mutex::new(RefreshRecord::default()),
            completed_refreshes: AtomicU64::new(0),
        }
    }

    /// Replace the time source used for expiry decisions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_exchange_timeout(mut self, exchange_timeout: Duration) -> Self {
        self.exchange_timeout = exchange_timeout;
        self
    }

    pub async fn state(&self) -> AuthState {
        self.session.read().await.state
    }

    /// Restore a session from the stored refresh token.
    ///
    /// Returns `false` when nothing is stored. A stored token is refreshed
    /// immediately, so `true` means a usable access token is held.
    #[instrument(skip(self), fields(provider = %self.provider))]
    pub async fn bootstrap(&self) -> Result<bool> {
        if self.store.load().await?.is_none() {
            debug!("No stored credential, authorization required");
            return Ok(false);
        }

        info!("Restoring session from stored credential");
        self.refresh().await?;
        Ok(true)
    }

    /// `true` when a session is already held, otherwise the bootstrap outcome.
    pub async fn ensure_authenticated(&self) -> Result<bool> {
        {
            let session = self.session.read().await;
            if session.state.is_authenticated() && session.credential.is_some() {
                return Ok(true);
            }
        }
        self.bootstrap().await
    }

    /// Install the tokens obtained from an authorization-code exchange.
    ///
    /// A returned refresh token is persisted before the session changes. When
    /// the provider returns none (a repeat consent), the stored one is kept.
    #[instrument(skip(self, tokens), fields(provider = %self.provider))]
    pub async fn complete_authorization(&self, tokens: OAuthTokens) -> Result<CredentialSummary> {
        let _gate = self.refresh_gate.lock().await;

        let refresh_token_issued = tokens.refresh_token.is_some();
        let refresh_token = match tokens.refresh_token {
            Some(refresh_token) => {
                self.store.save(&refresh_token).await.map_err(|e| {
                    self.emit_auth_error(&e);
                    e
                })?;
                Some(refresh_token)
            }
            None => {
                let stored = self.store.load().await?;
                if stored.is_none() {
                    warn!("Provider issued no refresh token and none is stored; the session cannot be restored later");
                }
                stored
            }
        };

        let summary = CredentialSummary {
            state: AuthState::Authenticated,
            has_refresh_token: refresh_token.is_some(),
            refresh_token_issued,
            expires_at: tokens.expires_at,
        };

        {
            let mut session = self.session.write().await;
            session.state = AuthState::Authenticated;
            session.credential = Some(Credential {
                access_token: tokens.access_token,
                refresh_token,
                expires_at: tokens.expires_at,
            });
        }

        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedIn {
            provider: self.provider.clone(),
            refresh_token_issued,
        }));

        info!(
            refresh_token_issued,
            expires_at = %summary.expires_at,
            "Authorization completed"
        );
        Ok(summary)
    }

    /// Current access token, refreshing first when it is within five minutes
    /// of expiry and a refresh token is held.
    pub async fn access_token(&self) -> Result<String> {
        {
            let session = self.session.read().await;
            let credential = session
                .credential
                .as_ref()
                .ok_or(AuthError::AuthorizationRequired)?;

            let expiring = credential.expires_within(
                self.clock.now(),
                chrono::Duration::seconds(TOKEN_REFRESH_BUFFER_SECS),
            );
            if !expiring || credential.refresh_token.is_none() {
                return Ok(credential.access_token.clone());
            }
        }

        debug!("Access token expiring soon, refreshing");
        self.refresh().await?;

        self.session
            .read()
            .await
            .credential
            .as_ref()
            .map(|c| c.access_token.clone())
            .ok_or(AuthError::AuthorizationRequired)
    }

    /// Refresh the access token, sharing an in-flight refresh if one exists.
    pub async fn refresh(&self) -> Result<()> {
        let seen = self.completed_refreshes.load(Ordering::Acquire);
        let mut record = self.refresh_gate.lock().await;

        if record.completed != seen {
            debug!("Reusing outcome of concurrent refresh");
            return match &record.last_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            };
        }

        let outcome = self.perform_refresh().await;

        record.completed += 1;
        record.last_error = outcome.as_ref().err().cloned();
        self.completed_refreshes
            .store(record.completed, Ordering::Release);

        outcome
    }

    /// Remove the stored credential and drop the session.
    #[instrument(skip(self), fields(provider = %self.provider))]
    pub async fn logout(&self) -> Result<()> {
        let _gate = self.refresh_gate.lock().await;
        self.store.clear().await?;

        {
            let mut session = self.session.write().await;
            *session = SessionState::default();
        }

        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedOut));
        info!("Signed out");
        Ok(())
    }

    #[instrument(skip(self), fields(provider = %self.provider))]
    async fn perform_refresh(&self) -> Result<()> {
        let (previous_state, held_refresh_token) = {
            let session = self.session.read().await;
            (
                session.state,
                session
                    .credential
                    .as_ref()
                    .and_then(|c| c.refresh_token.clone()),
            )
        };

        let refresh_token = match held_refresh_token {
            Some(token) => token,
            None => self.store.load().await?.ok_or_else(|| {
                warn!("No refresh token held or stored");
                AuthError::AuthorizationRequired
            })?,
        };

        self.set_state(AuthState::Refreshing).await;
        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshing));

        let tokens = match timeout(
            self.exchange_timeout,
            self.exchange.refresh_access_token(&refresh_token),
        )
        .await
        {
            Ok(Ok(tokens)) => tokens,
            Ok(Err(e)) => return Err(self.fail_refresh(previous_state, e).await),
            Err(_) => {
                let e = AuthError::OperationTimeout {
                    operation: "token refresh".to_string(),
                    timeout_secs: self.exchange_timeout.as_secs(),
                };
                return Err(self.fail_refresh(previous_state, e).await);
            }
        };

        let rotated = tokens
            .refresh_token
            .as_deref()
            .is_some_and(|issued| issued != refresh_token);
        let refresh_token = tokens.refresh_token.unwrap_or(refresh_token);

        if let Err(e) = self.store.save(&refresh_token).await {
            return Err(self.fail_refresh(previous_state, e).await);
        }

        let expires_at = tokens.expires_at;
        {
            let mut session = self.session.write().await;
            session.state = AuthState::Authenticated;
            session.credential = Some(Credential {
                access_token: tokens.access_token,
                refresh_token: Some(refresh_token),
                expires_at,
            });
        }

        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshed {
                expires_at: expires_at.timestamp(),
                rotated,
            }));

        info!(rotated, expires_at = %expires_at, "Access token refreshed");
        Ok(())
    }

    async fn fail_refresh(&self, previous_state: AuthState, e: AuthError) -> AuthError {
        error!(error = %e, "Token refresh failed");
        self.set_state(previous_state).await;
        self.emit_auth_error(&e);
        e
    }

    fn emit_auth_error(&self, e: &AuthError) {
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
            message: e.to_string(),
            recoverable: e.is_recoverable(),
        }));
    }

    async fn set_state(&self, state: AuthState) {
        self.session.write().await.state = state;
    }
}

#[async_trait]
impl AccessTokenProvider for TokenLifecycleManager {
    async fn access_token(&self) -> Result<String> {
        TokenLifecycleManager::access_token(self).await
    }

    async fn refresh(&self) -> Result<()> {
        TokenLifecycleManager::refresh(self).await
    }
}
