use core_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    /// The media tree could not be read; raised before any remote call.
    #[error("Media discovery failed at {path}: {reason}")]
    Discovery { path: String, reason: String },

    /// Unrecoverable credential failure (persistence) during a run.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

pub type Result<T> = std::result::Result<T, UploadError>;
