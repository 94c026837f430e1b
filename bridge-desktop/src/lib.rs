//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux):
//! - `HttpClient` using `reqwest`
//! - `FileSystemAccess` using `tokio::fs`
//! - `SecureStore` as an atomically replaced JSON file
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FileSecureStore, ReqwestHttpClient, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let fs = TokioFileSystem::new();
//!     let store = FileSecureStore::new(FileSecureStore::default_location());
//!     // Hand these to core-service
//!     Ok(())
//! }
//! ```

mod filesystem;
mod http;
mod secure_store;

pub use filesystem::TokioFileSystem;
pub use http::{ReqwestHttpClient, TransportRetry};
pub use secure_store::FileSecureStore;
