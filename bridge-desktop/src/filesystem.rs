//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{FileMetadata, FileSystemAccess},
};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Tokio-based file system implementation
#[derive(Debug, Clone, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }

    /// Convert std::io::Error to BridgeError
    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let link = fs::symlink_metadata(path)
            .await
            .map_err(Self::map_io_error)?;

        if !link.file_type().is_symlink() {
            return Ok(FileMetadata {
                size: link.len(),
                is_directory: link.is_dir(),
                is_symlink: false,
            });
        }

        let target = fs::metadata(path)
            .await
            .map_err(|e| BridgeError::BrokenLink(format!("{}: {}", path.display(), e)))?;

        Ok(FileMetadata {
            size: target.len(),
            is_directory: target.is_dir(),
            is_symlink: true,
        })
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(path).await.map_err(Self::map_io_error)?;

        while let Some(entry) = dir.next_entry().await.map_err(Self::map_io_error)? {
            entries.push(entry.path());
        }

        debug!(path = ?path, count = entries.len(), "Listed directory");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_file_and_metadata() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("IMG_1.JPG");
        std::fs::write(&file, b"jpeg-bytes").unwrap();

        let fs = TokioFileSystem::new();
        let metadata = fs.metadata(&file).await.unwrap();
        assert_eq!(metadata.size, 10);
        assert!(!metadata.is_directory);

        let data = fs.read_file(&file).await.unwrap();
        assert_eq!(data.as_ref(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn test_list_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("Trip")).unwrap();
        std::fs::write(temp.path().join("notes.txt"), b"").unwrap();

        let fs = TokioFileSystem::new();
        let mut entries = fs.list_directory(temp.path()).await.unwrap();
        entries.sort();

        assert_eq!(
            entries,
            vec![temp.path().join("Trip"), temp.path().join("notes.txt")]
        );
        assert!(fs.metadata(&entries[0]).await.unwrap().is_directory);
    }

    #[tokio::test]
    async fn test_missing_path_is_io_error() {
        let temp = TempDir::new().unwrap();
        let fs = TokioFileSystem::new();

        let err = fs
            .list_directory(&temp.path().join("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));

        let err = fs.metadata(&temp.path().join("missing")).await.unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_are_flagged() {
        let temp = TempDir::new().unwrap();
        let album = temp.path().join("Trip");
        std::fs::create_dir(&album).unwrap();
        std::fs::write(album.join("a.jpg"), b"jpeg").unwrap();
        std::os::unix::fs::symlink(&album, temp.path().join("Alias")).unwrap();
        std::os::unix::fs::symlink(album.join("a.jpg"), temp.path().join("b.jpg")).unwrap();

        let fs = TokioFileSystem::new();

        let plain = fs.metadata(&album).await.unwrap();
        assert!(plain.is_directory);
        assert!(!plain.is_symlink);

        let dir_link = fs.metadata(&temp.path().join("Alias")).await.unwrap();
        assert!(dir_link.is_directory);
        assert!(dir_link.is_symlink);

        let file_link = fs.metadata(&temp.path().join("b.jpg")).await.unwrap();
        assert!(!file_link.is_directory);
        assert!(file_link.is_symlink);
        assert_eq!(file_link.size, 4);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_is_broken_link() {
        let temp = TempDir::new().unwrap();
        let link = temp.path().join("old.jpg");
        std::os::unix::fs::symlink(temp.path().join("gone.jpg"), &link).unwrap();

        let err = TokioFileSystem::new().metadata(&link).await.unwrap_err();
        assert!(matches!(err, BridgeError::BrokenLink(_)));
    }
}
