use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The remote service rejected the access credential (HTTP 401).
    ///
    /// Callers treat this as recoverable by refreshing the credential.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The path is a symlink whose target cannot be resolved.
    #[error("Broken symlink: {0}")]
    BrokenLink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure came from a rejected access credential.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BridgeError::Unauthorized(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
