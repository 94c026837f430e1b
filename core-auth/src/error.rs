use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No usable credential; the user must run the authorization flow.
    #[error("Authorization required: no stored credential, run the authorization flow first")]
    AuthorizationRequired,

    #[error("Invalid authorization code: {0}")]
    InvalidAuthCode(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// The refresh credential could not be written or read back.
    #[error("Credential persistence failed: {0}")]
    Persistence(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Operation '{operation}' timed out after {timeout_secs}s")]
    OperationTimeout { operation: String, timeout_secs: u64 },

    #[error("Auth error: {0}")]
    Other(String),
}

impl AuthError {
    /// Persistence failures abort the caller instead of being retried.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, AuthError::Persistence(_))
    }

    /// Whether trying again later can succeed without user interaction.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::NetworkError(_)
                | AuthError::OperationTimeout { .. }
                | AuthError::TokenRefreshFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
