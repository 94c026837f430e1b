//! # Uploader Configuration
//!
//! Settings for a bulk upload run, built with [`UploaderConfigBuilder`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::UploaderConfig;
//!
//! let config = UploaderConfig::builder()
//!     .client_id("1234.apps.googleusercontent.com")
//!     .client_secret("secret")
//!     .credential_path("/home/me/.config/photo-album-uploader/credentials.json")
//!     .build()?;
//!
//! assert_eq!(config.media_root, std::path::PathBuf::from("./PHOTOS"));
//! assert_eq!(config.retry.max_retry, 10);
//! ```
//!
//! ## Error Handling
//!
//! `build()` fails fast with an actionable [`Error::Config`] message when a
//! required value is missing or a value is out of range.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default folder scanned for media
pub const DEFAULT_MEDIA_ROOT: &str = "./PHOTOS";

/// Default port used to derive the OAuth redirect target
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Path of the authorization callback on the local host
pub const DEFAULT_CALLBACK_PATH: &str = "/auth/google/callback/";

/// Retries per file after the first attempt
pub const DEFAULT_MAX_RETRY: u32 = 10;

/// Fixed pause after every failed attempt
pub const DEFAULT_RETRY_DELAY_MS: u64 = 3000;

/// Extensions accepted as media by default, compared case-insensitively
pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "mp4", "avi", "mov"];

const MAX_RETRY_CEILING: u32 = 100;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// OAuth client registration
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl std::fmt::Debug for OAuthClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_url", &self.redirect_url)
            .finish()
    }
}

/// Per-file retry behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// Retries after the first attempt; a file gets `max_retry + 1` attempts
    pub max_retry: u32,
    /// Pause after every failed attempt, including the last one
    pub retry_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retry: DEFAULT_MAX_RETRY,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

/// Validated uploader settings.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Root folder; each immediate subfolder becomes one album
    pub media_root: PathBuf,

    /// Local port the authorization callback is served on
    pub server_port: u16,

    pub oauth: OAuthClientSettings,

    /// Where the refresh credential is persisted
    pub credential_path: PathBuf,

    pub retry: RetrySettings,

    /// Lowercase extensions (without the dot) picked up by discovery
    pub media_extensions: Vec<String>,
}

impl UploaderConfig {
    pub fn builder() -> UploaderConfigBuilder {
        UploaderConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.media_root.as_os_str().is_empty() {
            return Err(Error::Config("Media root cannot be empty".to_string()));
        }

        if self.credential_path.as_os_str().is_empty() {
            return Err(Error::Config("Credential path cannot be empty".to_string()));
        }

        if self.server_port == 0 {
            return Err(Error::Config(
                "Server port must be between 1 and 65535".to_string(),
            ));
        }

        if self.oauth.client_id.trim().is_empty() {
            return Err(Error::Config(
                "OAuth client id cannot be empty. Set GOOGLE_CLIENT_ID or pass --client-id."
                    .to_string(),
            ));
        }

        if self.oauth.client_secret.trim().is_empty() {
            return Err(Error::Config(
                "OAuth client secret cannot be empty. Set GOOGLE_CLIENT_SECRET or pass --client-secret."
                    .to_string(),
            ));
        }

        if !self.oauth.redirect_url.starts_with("http://")
            && !self.oauth.redirect_url.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "Redirect URL must be an http(s) URL, got '{}'",
                self.oauth.redirect_url
            )));
        }

        if self.retry.max_retry > MAX_RETRY_CEILING {
            return Err(Error::Config(format!(
                "Retry ceiling exceeds maximum of {}",
                MAX_RETRY_CEILING
            )));
        }

        if self.retry.retry_delay > MAX_RETRY_DELAY {
            return Err(Error::Config(
                "Retry delay exceeds maximum of 60 seconds (60,000ms)".to_string(),
            ));
        }

        if self.media_extensions.is_empty() {
            return Err(Error::Config(
                "At least one media extension is required. Set MEDIA_EXTENSIONS or pass --extensions."
                    .to_string(),
            ));
        }

        if let Some(bad) = self
            .media_extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.contains(|c: char| matches!(c, '.' | '/' | '\\')))
        {
            return Err(Error::Config(format!(
                "Invalid media extension '{}'",
                bad
            )));
        }

        Ok(())
    }
}

/// Redirect target used when none is configured explicitly
pub fn default_redirect_url(port: u16) -> String {
    format!("http://localhost:{}{}", port, DEFAULT_CALLBACK_PATH)
}

#[derive(Debug, Default)]
pub struct UploaderConfigBuilder {
    media_root: Option<PathBuf>,
    server_port: Option<u16>,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_url: Option<String>,
    credential_path: Option<PathBuf>,
    max_retry: Option<u32>,
    retry_delay: Option<Duration>,
    media_extensions: Option<Vec<String>>,
}

impl UploaderConfigBuilder {
    pub fn media_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.media_root = Some(path.into());
        self
    }

    pub fn server_port(mut self, port: u16) -> Self {
        self.server_port = Some(port);
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Override the redirect target; defaults to [`default_redirect_url`]
    pub fn redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    pub fn credential_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.credential_path = Some(path.into());
        self
    }

    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = Some(max_retry);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Replace the media allow-list. Entries are trimmed, lowercased and
    /// may carry a leading dot.
    pub fn media_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.media_extensions = Some(
            extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .collect(),
        );
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<UploaderConfig> {
        let client_id = self.client_id.ok_or_else(|| {
            Error::Config(
                "OAuth client id is required. Set GOOGLE_CLIENT_ID or pass --client-id."
                    .to_string(),
            )
        })?;
        let client_secret = self.client_secret.ok_or_else(|| {
            Error::Config(
                "OAuth client secret is required. Set GOOGLE_CLIENT_SECRET or pass --client-secret."
                    .to_string(),
            )
        })?;
        let credential_path = self
            .credential_path
            .ok_or_else(|| Error::Config("Credential path is required".to_string()))?;

        let server_port = self.server_port.unwrap_or(DEFAULT_SERVER_PORT);
        let defaults = RetrySettings::default();

        let config = UploaderConfig {
            media_root: self
                .media_root
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_ROOT)),
            server_port,
            oauth: OAuthClientSettings {
                client_id,
                client_secret,
                redirect_url: self
                    .redirect_url
                    .unwrap_or_else(|| default_redirect_url(server_port)),
            },
            credential_path,
            retry: RetrySettings {
                max_retry: self.max_retry.unwrap_or(defaults.max_retry),
                retry_delay: self.retry_delay.unwrap_or(defaults.retry_delay),
            },
            media_extensions: self.media_extensions.unwrap_or_else(|| {
                DEFAULT_MEDIA_EXTENSIONS
                    .iter()
                    .map(|ext| ext.to_string())
                    .collect()
            }),
        };

        config.validate()?;
        Ok(config)
    }
}

fn normalize_extension(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('.')
        .unwrap_or(trimmed)
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> UploaderConfigBuilder {
        UploaderConfig::builder()
            .client_id("client")
            .client_secret("secret")
            .credential_path("/tmp/credentials.json")
    }

    #[test]
    fn test_defaults() {
        let config = minimal().build().unwrap();

        assert_eq!(config.media_root, PathBuf::from("./PHOTOS"));
        assert_eq!(config.server_port, 3000);
        assert_eq!(
            config.oauth.redirect_url,
            "http://localhost:3000/auth/google/callback/"
        );
        assert_eq!(config.retry.max_retry, 10);
        assert_eq!(config.retry.retry_delay, Duration::from_millis(3000));
        assert_eq!(config.media_extensions.len(), 6);
        assert!(config.media_extensions.contains(&"mov".to_string()));
    }

    #[test]
    fn test_media_extensions_are_normalized() {
        let config = minimal()
            .media_extensions([" .HEIC", "jpg", "Webp "])
            .build()
            .unwrap();

        assert_eq!(config.media_extensions, vec!["heic", "jpg", "webp"]);
    }

    #[test]
    fn test_rejects_unusable_media_extensions() {
        let err = minimal()
            .media_extensions(Vec::<String>::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("MEDIA_EXTENSIONS"));

        assert!(minimal().media_extensions(["jpg", " "]).build().is_err());
        assert!(minimal().media_extensions(["tar.gz"]).build().is_err());
    }

    #[test]
    fn test_redirect_follows_port() {
        let config = minimal().server_port(8080).build().unwrap();
        assert_eq!(
            config.oauth.redirect_url,
            "http://localhost:8080/auth/google/callback/"
        );

        let config = minimal()
            .redirect_url("https://uploader.example.com/callback")
            .build()
            .unwrap();
        assert_eq!(config.oauth.redirect_url, "https://uploader.example.com/callback");
    }

    #[test]
    fn test_missing_client_id_is_actionable() {
        let err = UploaderConfig::builder()
            .client_secret("secret")
            .credential_path("/tmp/c.json")
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("GOOGLE_CLIENT_ID"));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(minimal().server_port(0).build().is_err());
        assert!(minimal().max_retry(101).build().is_err());
        assert!(minimal()
            .retry_delay(Duration::from_secs(61))
            .build()
            .is_err());
        assert!(minimal().client_secret("  ").build().is_err());
        assert!(minimal().redirect_url("localhost:3000").build().is_err());
    }

    #[test]
    fn test_zero_delay_is_allowed() {
        let config = minimal()
            .max_retry(0)
            .retry_delay(Duration::ZERO)
            .build()
            .unwrap();
        assert_eq!(config.retry.max_retry, 0);
        assert_eq!(config.retry.retry_delay, Duration::ZERO);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = minimal().build().unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("\"secret\""));
        assert!(debug.contains("[REDACTED]"));
    }
}
