//! # Authentication Module
//!
//! Credential lifecycle for the remote photo service.
//!
//! ## Overview
//!
//! This module runs the OAuth 2.0 authorization-code flow against Google,
//! persists the long-lived refresh token, and hands out short-lived access
//! tokens to the upload pipeline.
//!
//! ## Features
//!
//! - OAuth 2.0 authorization flow with PKCE
//! - Crash-safe refresh token persistence via the platform secure store
//! - Single-flight token refresh with rotation handling
//! - Proactive refresh before expiration
//! - Auth state event emission

pub mod credential_store;
pub mod error;
pub mod manager;
pub mod oauth;
pub mod types;

pub use credential_store::CredentialStore;
pub use error::{AuthError, Result};
pub use manager::{AccessTokenProvider, TokenLifecycleManager, DEFAULT_EXCHANGE_TIMEOUT};
pub use oauth::{IdentityExchange, OAuthConfig, OAuthFlowManager, PkceVerifier};
pub use types::{AuthState, Credential, CredentialSummary, OAuthTokens};
