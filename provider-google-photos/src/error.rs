//! Error types for Google Photos provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Google Photos provider errors
#[derive(Error, Debug)]
pub enum GooglePhotosError {
    /// The access token was rejected (HTTP 401)
    #[error("Access token rejected: {0}")]
    Unauthorized(String),

    /// API request returned an error
    #[error("Google Photos API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimitExceeded { retry_after_seconds: u64 },

    /// The media item was uploaded but could not be added to the album
    #[error("Media item '{file_name}' rejected: {message}")]
    MediaItemRejected { file_name: String, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Google Photos operations
pub type Result<T> = std::result::Result<T, GooglePhotosError>;

impl From<GooglePhotosError> for BridgeError {
    fn from(error: GooglePhotosError) -> Self {
        match error {
            GooglePhotosError::Unauthorized(msg) => BridgeError::Unauthorized(msg),
            GooglePhotosError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
