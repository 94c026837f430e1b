use core_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    /// No session and nothing stored to restore one from.
    #[error("Authorization required: run `login` first")]
    AuthorizationRequired,

    #[error("A bulk upload is already running")]
    RunInProgress,

    #[error("Authentication error: {0}")]
    Auth(AuthError),

    #[error("Upload error: {0}")]
    Upload(#[from] core_upload::UploadError),
}

impl From<AuthError> for CoreError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::AuthorizationRequired => CoreError::AuthorizationRequired,
            other => CoreError::Auth(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
