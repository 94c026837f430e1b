//! Upload pipeline configuration.

use core_runtime::config::{RetrySettings, UploaderConfig};
use std::time::Duration;

pub use core_runtime::config::DEFAULT_MEDIA_EXTENSIONS;

/// Upload orchestrator and discovery configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Retries after the first attempt, per file and per album
    pub max_retry: u32,

    /// Pause after every failed attempt
    pub retry_delay: Duration,

    /// Lowercase extensions (without the dot) that count as media
    pub media_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        let retry = RetrySettings::default();
        Self {
            max_retry: retry.max_retry,
            retry_delay: retry.retry_delay,
            media_extensions: DEFAULT_MEDIA_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl From<&UploaderConfig> for UploadConfig {
    fn from(config: &UploaderConfig) -> Self {
        Self {
            max_retry: config.retry.max_retry,
            retry_delay: config.retry.retry_delay,
            media_extensions: config.media_extensions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UploadConfig::default();
        assert_eq!(config.max_retry, 10);
        assert_eq!(config.retry_delay, Duration::from_millis(3000));
        assert_eq!(config.media_extensions.len(), 6);
        assert!(config.media_extensions.iter().all(|e| e == &e.to_lowercase()));
    }

    #[test]
    fn test_follows_uploader_config() {
        let uploader = UploaderConfig::builder()
            .client_id("client")
            .client_secret("secret")
            .credential_path("/tmp/credentials.json")
            .max_retry(2)
            .media_extensions(["heic"])
            .build()
            .unwrap();

        let config = UploadConfig::from(&uploader);
        assert_eq!(config.max_retry, 2);
        assert_eq!(config.media_extensions, vec!["heic"]);
    }
}
