//! # Host Bridge Traits
//!
//! Capability traits the uploader core depends on, implemented per host.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP requests (form, JSON, raw bytes)
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Directory listing and file reads
//!
//! ### Remote Services
//! - [`AlbumService`](album::AlbumService) - Create albums and upload media
//!
//! ### Security & Storage
//! - [`SecureStore`](storage::SecureStore) - Durable credential persistence
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! convert platform errors into it and report a rejected access token as
//! [`BridgeError::Unauthorized`](error::BridgeError::Unauthorized), which is
//! the only variant the core treats as recoverable by a credential refresh.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single instance can be shared
//! behind an `Arc` across async tasks.

pub mod album;
pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use album::{AlbumService, RemoteAlbum};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::{FileMetadata, FileSystemAccess, SecureStore};
pub use time::{Clock, SystemClock};
