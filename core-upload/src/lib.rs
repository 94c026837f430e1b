//! # Upload Module
//!
//! Turns a local media tree into remote albums.
//!
//! ## Overview
//!
//! This module manages one bulk upload run:
//! - Discovering media files grouped by top-level folder
//! - Normalizing file names into slugs
//! - Creating one album per folder and uploading its files in order
//! - Retrying failed calls with a fixed delay, refreshing the token on 401
//! - Emitting progress events
//!
//! ## Components
//!
//! - **Media Discovery** (`discovery`): folder walk and extension filter
//! - **Slugs** (`slug`): file name normalization
//! - **Upload Orchestrator** (`orchestrator`): album creation, bounded retry, results

pub mod config;
pub mod discovery;
pub mod error;
pub mod orchestrator;
pub mod slug;
pub mod types;

pub use config::{UploadConfig, DEFAULT_MEDIA_EXTENSIONS};
pub use discovery::MediaDiscovery;
pub use error::{Result, UploadError};
pub use orchestrator::{FailureKind, UploadOrchestrator};
pub use slug::slugify_file_name;
pub use types::{FolderGroup, MediaFile, UploadResult};
