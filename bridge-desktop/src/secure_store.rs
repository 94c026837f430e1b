//! Secure Credential Storage backed by a single JSON file
//!
//! Secrets are kept as base64 strings in one JSON document. Every write
//! replaces the whole document through a temp file and an atomic rename, so
//! a crash mid-write leaves the previous document intact.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

const APP_DIR: &str = "photo-album-uploader";
const CREDENTIALS_FILE: &str = "credentials.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SecretDocument {
    version: u32,
    #[serde(default)]
    secrets: BTreeMap<String, String>,
}

/// File-based secure storage implementation
///
/// On Unix the document is created with mode `0600`.
pub struct FileSecureStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSecureStore {
    /// Create a store persisting to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Per-user default location, e.g. `~/.config/photo-album-uploader/credentials.json`
    pub fn default_location() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(CREDENTIALS_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| CREDENTIALS_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn read_document(&self) -> Result<SecretDocument> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?self.path, "Credential file not found");
                return Ok(SecretDocument {
                    version: FORMAT_VERSION,
                    secrets: BTreeMap::new(),
                });
            }
            Err(e) => return Err(BridgeError::Io(e)),
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            error!(path = ?self.path, error = %e, "Credential file is unreadable");
            BridgeError::OperationFailed(format!(
                "Credential file {} is corrupted: {}",
                self.path.display(),
                e
            ))
        })
    }

    async fn write_document(&self, document: &SecretDocument) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(document).map_err(|e| {
            BridgeError::OperationFailed(format!("Failed to encode credential file: {}", e))
        })?;

        let temp_path = self.temp_path();
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&temp_path).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        self.sync_parent_directory().await;

        debug!(path = ?self.path, entries = document.secrets.len(), "Persisted credential file");
        Ok(())
    }

    #[cfg(unix)]
    async fn sync_parent_directory(&self) {
        let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return;
        };
        let synced = match fs::File::open(parent).await {
            Ok(dir) => dir.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = synced {
            warn!(path = ?parent, error = %e, "Failed to sync credential directory");
        }
    }

    #[cfg(not(unix))]
    async fn sync_parent_directory(&self) {}

    fn decode(key: &str, encoded: &str) -> Result<Vec<u8>> {
        STANDARD.decode(encoded).map_err(|e| {
            error!(key = key, error = %e, "Failed to decode secret");
            BridgeError::OperationFailed(format!("Failed to decode secret: {}", e))
        })
    }
}

#[async_trait]
impl SecureStore for FileSecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        document.version = FORMAT_VERSION;
        document
            .secrets
            .insert(key.to_string(), STANDARD.encode(value));
        self.write_document(&document).await?;

        debug!(key = key, "Stored secret");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let document = self.read_document().await?;
        match document.secrets.get(key) {
            Some(encoded) => Ok(Some(Self::decode(key, encoded)?)),
            None => {
                debug!(key = key, "Secret not found");
                Ok(None)
            }
        }
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        if document.secrets.remove(key).is_some() {
            self.write_document(&document).await?;
            debug!(key = key, "Deleted secret");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileSecureStore {
        FileSecureStore::new(dir.path().join("nested").join("credentials.json"))
    }

    #[test]
    fn test_default_location() {
        let path = FileSecureStore::default_location();
        assert!(path.ends_with("photo-album-uploader/credentials.json"));
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.get_secret("refresh_token").await.unwrap(), None);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_set_and_get_survive_reopen() {
        let dir = TempDir::new().unwrap();
        store_in(&dir)
            .set_secret("refresh_token", b"1//first")
            .await
            .unwrap();
        store_in(&dir)
            .set_secret("refresh_token", b"1//second")
            .await
            .unwrap();

        let reopened = store_in(&dir);
        assert_eq!(
            reopened.get_secret("refresh_token").await.unwrap(),
            Some(b"1//second".to_vec())
        );
        assert!(!reopened.temp_path().exists());
    }

    #[tokio::test]
    async fn test_interrupted_write_keeps_previous_value() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set_secret("refresh_token", b"1//stable").await.unwrap();

        // A crash after the temp write but before the rename leaves a torn temp file.
        std::fs::write(store.temp_path(), b"{\"version\":1,\"secr").unwrap();

        let reopened = store_in(&dir);
        assert_eq!(
            reopened.get_secret("refresh_token").await.unwrap(),
            Some(b"1//stable".to_vec())
        );

        reopened
            .set_secret("refresh_token", b"1//rotated")
            .await
            .unwrap();
        assert_eq!(
            store_in(&dir).get_secret("refresh_token").await.unwrap(),
            Some(b"1//rotated".to_vec())
        );
        assert!(!reopened.temp_path().exists());
    }

    #[tokio::test]
    async fn test_corrupted_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), b"not json").unwrap();

        let err = store.get_secret("refresh_token").await.unwrap_err();
        assert!(matches!(err, BridgeError::OperationFailed(_)));
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_delete_keeps_other_secrets() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set_secret("a", b"1").await.unwrap();
        store.set_secret("b", b"2").await.unwrap();

        store.delete_secret("a").await.unwrap();
        store.delete_secret("missing").await.unwrap();

        let reopened = store_in(&dir);
        assert_eq!(reopened.get_secret("a").await.unwrap(), None);
        assert_eq!(reopened.get_secret("b").await.unwrap(), Some(b"2".to_vec()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set_secret("refresh_token", b"secret").await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
