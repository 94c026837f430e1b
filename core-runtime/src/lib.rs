//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the uploader crates:
//! - Logging and tracing setup
//! - Validated configuration
//! - Event bus for auth and upload progress

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
