//! # Media Discovery
//!
//! Walks the media root and groups media files by top-level folder.
//!
//! Every immediate subdirectory of the root becomes one [`FolderGroup`], even
//! when it holds no media. Files are collected recursively beneath it,
//! filtered by extension and sorted by path. Dot-prefixed entries are skipped
//! at every depth.
//!
//! A symlinked top-level folder is walked like any other, but symlinked
//! directories below it are never descended into, so link cycles cannot
//! repeat files. Symlinked files are collected. Broken symlinks anywhere
//! below the root are skipped with a warning.

use crate::config::DEFAULT_MEDIA_EXTENSIONS;
use crate::error::{Result, UploadError};
use crate::slug::slugify_file_name;
use crate::types::{FolderGroup, MediaFile};
use bridge_traits::error::BridgeError;
use bridge_traits::storage::{FileMetadata, FileSystemAccess};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Deepest nesting followed below a top-level folder
const MAX_DEPTH: usize = 32;

pub struct MediaDiscovery {
    fs: Arc<dyn FileSystemAccess>,
    extensions: Vec<String>,
}

impl MediaDiscovery {
    pub fn new(fs: Arc<dyn FileSystemAccess>) -> Self {
        Self {
            fs,
            extensions: DEFAULT_MEDIA_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }

    /// Replace the accepted extensions; a leading dot is ignored.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Whether the path's extension is an accepted media extension.
    pub fn is_media_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|accepted| *accepted == ext)
            })
            .unwrap_or(false)
    }

    /// Build one group per top-level folder of `root`, in listing order.
    ///
    /// A missing or unreadable root, or any unreadable entry beneath it,
    /// fails the whole discovery. Broken symlinks are not unreadable entries.
    #[instrument(skip(self), fields(root = %root.display()))]
    pub async fn discover(&self, root: &Path) -> Result<Vec<FolderGroup>> {
        let root_metadata = self.metadata(root).await?;
        if !root_metadata.is_directory {
            return Err(discovery_error(root, "not a directory"));
        }

        let entries = self.list(root).await?;
        let mut groups = Vec::new();

        for entry in entries {
            if is_hidden(&entry) {
                debug!(path = %entry.display(), "Skipping hidden entry");
                continue;
            }

            let Some(metadata) = self.entry_metadata(&entry).await? else {
                continue;
            };
            if !metadata.is_directory {
                debug!(path = %entry.display(), "Skipping file at media root");
                continue;
            }

            let folder_name = match entry.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };

            let files = self.collect_media(&entry).await?;
            debug!(folder = %folder_name, files = files.len(), "Discovered folder");

            groups.push(FolderGroup { folder_name, files });
        }

        info!(
            folders = groups.len(),
            files = groups.iter().map(FolderGroup::file_count).sum::<usize>(),
            "Media discovery complete"
        );
        Ok(groups)
    }

    /// Iterative depth-first walk below one top-level folder.
    async fn collect_media(&self, folder: &Path) -> Result<Vec<MediaFile>> {
        let mut files = Vec::new();
        let mut pending: Vec<(PathBuf, usize)> = vec![(folder.to_path_buf(), 0)];

        while let Some((dir, depth)) = pending.pop() {
            for entry in self.list(&dir).await? {
                if is_hidden(&entry) {
                    continue;
                }

                let Some(metadata) = self.entry_metadata(&entry).await? else {
                    continue;
                };

                if metadata.is_directory {
                    if metadata.is_symlink {
                        warn!(path = %entry.display(), "Not following symlinked directory");
                        continue;
                    }
                    if depth + 1 > MAX_DEPTH {
                        warn!(path = %entry.display(), max_depth = MAX_DEPTH, "Directory nesting too deep, skipping");
                        continue;
                    }
                    pending.push((entry, depth + 1));
                } else if self.is_media_file(&entry) {
                    let base_name = entry
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    files.push(MediaFile {
                        normalized_name: slugify_file_name(&base_name),
                        source_path: entry,
                    });
                }
            }
        }

        files.sort_by(|a, b| a.source_path.cmp(&b.source_path));
        Ok(files)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        self.fs
            .metadata(path)
            .await
            .map_err(|e| bridge_discovery_error(path, e))
    }

    /// Metadata of a listed entry; `None` for a broken symlink.
    async fn entry_metadata(&self, entry: &Path) -> Result<Option<FileMetadata>> {
        match self.fs.metadata(entry).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(BridgeError::BrokenLink(reason)) => {
                warn!(path = %entry.display(), reason = %reason, "Skipping broken symlink");
                Ok(None)
            }
            Err(e) => Err(bridge_discovery_error(entry, e)),
        }
    }

    async fn list(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.fs
            .list_directory(path)
            .await
            .map_err(|e| bridge_discovery_error(path, e))
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn discovery_error(path: &Path, reason: impl Into<String>) -> UploadError {
    UploadError::Discovery {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

fn bridge_discovery_error(path: &Path, e: BridgeError) -> UploadError {
    warn!(path = %path.display(), error = %e, "Media tree unreadable");
    discovery_error(path, e.to_string())
}
