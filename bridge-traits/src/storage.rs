//! Storage and File System Abstractions
//!
//! Read-only traversal of the local media tree plus durable secret storage
//! for the long-lived refresh credential.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
///
/// `size` and `is_directory` describe the symlink target when the path
/// itself is a symlink.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub is_directory: bool,
    /// The path itself is a symbolic link
    pub is_symlink: bool,
}

/// File system access trait
///
/// Only the operations needed to walk a media folder and read file contents.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn count_entries(fs: &dyn FileSystemAccess, root: &Path) -> Result<usize> {
///     Ok(fs.list_directory(root).await?.len())
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get metadata for a file or directory, following symlinks
    ///
    /// A symlink whose target is missing or unresolvable yields
    /// [`BridgeError::BrokenLink`](crate::error::BridgeError::BrokenLink).
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// List all entries in a directory
    ///
    /// Entries are returned in the order the platform lists them.
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Durable secret storage trait
///
/// # Durability
///
/// `set_secret` must be atomic with respect to crashes: after a crash the
/// next `get_secret` returns either the previous or the new value, never a
/// torn one.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecureStore;
///
/// async fn store_token(store: &dyn SecureStore, token: &str) -> Result<()> {
///     store.set_secret("refresh_token", token.as_bytes()).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value, replacing any previous value
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret. Deleting a missing key is not an error.
    async fn delete_secret(&self, key: &str) -> Result<()>;
}
