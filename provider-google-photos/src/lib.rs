//! # Google Photos Provider
//!
//! Implements the `AlbumService` trait for the Google Photos Library API v1.
//!
//! ## Overview
//!
//! This module provides:
//! - Album creation
//! - Raw-protocol byte uploads followed by `mediaItems:batchCreate`
//! - MIME type selection from the file extension
//! - Mapping of 401 responses to `BridgeError::Unauthorized` so callers can refresh

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{mime_type_for, GooglePhotosConnector, PHOTOS_API_BASE};
pub use error::{GooglePhotosError, Result};
