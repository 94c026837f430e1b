//! Durable refresh-credential storage
//!
//! Persists the single long-lived refresh token through a [`SecureStore`].
//! Atomicity comes from the store: `set_secret` either lands completely or
//! leaves the previous value readable.
//!
//! ```ignore
//! use core_auth::CredentialStore;
//!
//! let store = CredentialStore::new(secure_store);
//! store.save("1//0g...").await?;
//! assert_eq!(store.load().await?.as_deref(), Some("1//0g..."));
//! ```

use crate::error::{AuthError, Result};
use bridge_traits::storage::SecureStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const REFRESH_TOKEN_KEY: &str = "refresh_token";

#[derive(Serialize, Deserialize)]
struct StoredCredential {
    refresh_token: String,
    saved_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CredentialStore {
    secure_store: Arc<dyn SecureStore>,
}

impl CredentialStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self { secure_store }
    }

    /// Persist `refresh_token`, replacing any previous one.
    pub async fn save(&self, refresh_token: &str) -> Result<()> {
        if refresh_token.is_empty() {
            return Err(AuthError::Persistence(
                "Refusing to persist an empty refresh token".to_string(),
            ));
        }

        let stored = StoredCredential {
            refresh_token: refresh_token.to_string(),
            saved_at: Utc::now(),
        };
        let json = serde_json::to_vec(&stored).map_err(|e| {
            AuthError::Persistence(format!("Failed to encode credential: {}", e))
        })?;

        self.secure_store
            .set_secret(REFRESH_TOKEN_KEY, &json)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to persist refresh token");
                AuthError::Persistence(e.to_string())
            })?;

        info!("Refresh token persisted");
        Ok(())
    }

    /// Load the persisted refresh token; `None` when nothing was saved yet.
    pub async fn load(&self) -> Result<Option<String>> {
        let data = self
            .secure_store
            .get_secret(REFRESH_TOKEN_KEY)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to read refresh token");
                AuthError::Persistence(e.to_string())
            })?;

        let Some(data) = data else {
            debug!("No refresh token stored");
            return Ok(None);
        };

        let stored: StoredCredential = serde_json::from_slice(&data).map_err(|e| {
            warn!(error = %e, "Stored credential record is unreadable");
            AuthError::Persistence(format!("Stored credential record is unreadable: {}", e))
        })?;

        debug!(saved_at = %stored.saved_at, "Loaded refresh token");
        Ok(Some(stored.refresh_token))
    }

    /// Remove the persisted refresh token. Only explicit sign-out calls this.
    pub async fn clear(&self) -> Result<()> {
        self.secure_store
            .delete_secret(REFRESH_TOKEN_KEY)
            .await
            .map_err(|e| AuthError::Persistence(e.to_string()))?;
        info!("Refresh token removed");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// In-memory secure store shared by the crate's tests.
    #[derive(Default)]
    pub(crate) struct MemorySecureStore {
        data: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemorySecureStore {
        pub(crate) async fn raw(&self, key: &str) -> Option<Vec<u8>> {
            self.data.lock().await.get(key).cloned()
        }

        pub(crate) async fn put_raw(&self, key: &str, value: &[u8]) {
            self.data
                .lock()
                .await
                .insert(key.to_string(), value.to_vec());
        }
    }

    #[async_trait]
    impl SecureStore for MemorySecureStore {
        async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
            self.put_raw(key, value).await;
            Ok(())
        }

        async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
            Ok(self.raw(key).await)
        }

        async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
            self.data.lock().await.remove(key);
            Ok(())
        }
    }

    /// Secure store whose every operation fails.
    pub(crate) struct BrokenSecureStore;

    #[async_trait]
    impl SecureStore for BrokenSecureStore {
        async fn set_secret(&self, _key: &str, _value: &[u8]) -> BridgeResult<()> {
            Err(BridgeError::OperationFailed("disk full".to_string()))
        }

        async fn get_secret(&self, _key: &str) -> BridgeResult<Option<Vec<u8>>> {
            Err(BridgeError::OperationFailed("permission denied".to_string()))
        }

        async fn delete_secret(&self, _key: &str) -> BridgeResult<()> {
            Err(BridgeError::OperationFailed("permission denied".to_string()))
        }
    }

    #[tokio::test]
    async fn test_load_absent_is_none() {
        let store = CredentialStore::new(Arc::new(MemorySecureStore::default()));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_overwrites_previous() {
        let store = CredentialStore::new(Arc::new(MemorySecureStore::default()));
        store.save("1//first").await.unwrap();
        store.save("1//second").await.unwrap();

        assert_eq!(store.load().await.unwrap().as_deref(), Some("1//second"));
    }

    #[tokio::test]
    async fn test_clear_removes_token() {
        let store = CredentialStore::new(Arc::new(MemorySecureStore::default()));
        store.save("1//token").await.unwrap();
        store.clear().await.unwrap();

        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreadable_record_is_persistence_failure() {
        let secure = Arc::new(MemorySecureStore::default());
        secure.put_raw(REFRESH_TOKEN_KEY, b"{truncated").await;
        let store = CredentialStore::new(secure.clone());

        let err = store.load().await.unwrap_err();
        assert!(err.is_persistence_failure());
        assert!(secure.raw(REFRESH_TOKEN_KEY).await.is_some());
    }

    #[tokio::test]
    async fn test_io_failures_surface() {
        let store = CredentialStore::new(Arc::new(BrokenSecureStore));

        assert!(store.save("1//token").await.unwrap_err().is_persistence_failure());
        assert!(store.load().await.unwrap_err().is_persistence_failure());
    }

    #[tokio::test]
    async fn test_empty_token_rejected() {
        let store = CredentialStore::new(Arc::new(MemorySecureStore::default()));
        assert!(store.save("").await.is_err());
    }

    #[tokio::test]
    async fn test_round_trip_survives_interrupted_write() {
        use bridge_desktop::FileSecureStore;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        let store = CredentialStore::new(Arc::new(FileSecureStore::new(&path)));
        store.save("1//before-crash").await.unwrap();

        std::fs::write(dir.path().join("credentials.json.tmp"), b"{\"vers").unwrap();

        let reopened = CredentialStore::new(Arc::new(FileSecureStore::new(&path)));
        assert_eq!(
            reopened.load().await.unwrap().as_deref(),
            Some("1//before-crash")
        );

        reopened.save("1//after-crash").await.unwrap();
        let again = CredentialStore::new(Arc::new(FileSecureStore::new(&path)));
        assert_eq!(again.load().await.unwrap().as_deref(), Some("1//after-crash"));
    }
}
