//! Fakes shared by the upload integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::album::{AlbumService, RemoteAlbum};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::storage::{FileMetadata, FileSystemAccess};
use bytes::Bytes;
use core_auth::{AccessTokenProvider, AuthError};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory tree that lists children in insertion order.
#[derive(Default)]
pub struct MemoryFs {
    dirs: HashMap<PathBuf, Vec<PathBuf>>,
    files: HashMap<PathBuf, Bytes>,
}

impl MemoryFs {
    pub fn dir(mut self, path: &str, children: &[&str]) -> Self {
        let path = PathBuf::from(path);
        let children = children.iter().map(|c| path.join(c)).collect();
        self.dirs.insert(path, children);
        self
    }

    pub fn file(mut self, path: impl Into<PathBuf>, content: &'static [u8]) -> Self {
        self.files.insert(path.into(), Bytes::from_static(content));
        self
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFs {
    async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata> {
        if self.dirs.contains_key(path) {
            return Ok(FileMetadata {
                size: 0,
                is_directory: true,
                is_symlink: false,
            });
        }
        match self.files.get(path) {
            Some(content) => Ok(FileMetadata {
                size: content.len() as u64,
                is_directory: false,
                is_symlink: false,
            }),
            None => Err(BridgeError::OperationFailed(format!(
                "no such entry: {}",
                path.display()
            ))),
        }
    }

    async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| BridgeError::OperationFailed(format!("unreadable: {}", path.display())))
    }

    async fn list_directory(&self, path: &Path) -> BridgeResult<Vec<PathBuf>> {
        self.dirs
            .get(path)
            .cloned()
            .ok_or_else(|| BridgeError::OperationFailed(format!("not a directory: {}", path.display())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fail {
    Unauthorized,
    Transient,
}

impl Fail {
    fn into_error(self) -> BridgeError {
        match self {
            Fail::Unauthorized => BridgeError::Unauthorized("token expired".to_string()),
            Fail::Transient => BridgeError::OperationFailed("503 backend unavailable".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCall {
    pub token: String,
    pub album_id: String,
    pub file_name: String,
    pub size: usize,
}

/// Album service answering from scripted failures, then succeeding.
#[derive(Default)]
pub struct ScriptedAlbumService {
    create_failures: Mutex<VecDeque<Fail>>,
    create_always_fails: bool,
    upload_failures: Mutex<VecDeque<Fail>>,
    /// Uploads of this file name always fail transiently
    poisoned_file: Option<String>,
    pub create_calls: AtomicUsize,
    pub upload_calls: Mutex<Vec<UploadCall>>,
}

impl ScriptedAlbumService {
    pub fn failing_uploads(failures: &[Fail]) -> Self {
        Self {
            upload_failures: Mutex::new(failures.iter().copied().collect()),
            ..Default::default()
        }
    }

    pub fn poisoned(file_name: &str) -> Self {
        Self {
            poisoned_file: Some(file_name.to_string()),
            ..Default::default()
        }
    }

    pub fn broken_albums() -> Self {
        Self {
            create_always_fails: true,
            ..Default::default()
        }
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<UploadCall> {
        self.upload_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlbumService for ScriptedAlbumService {
    async fn create_album(&self, _access_token: &str, title: &str) -> BridgeResult<RemoteAlbum> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.create_always_fails {
            return Err(Fail::Transient.into_error());
        }
        if let Some(fail) = self.create_failures.lock().unwrap().pop_front() {
            return Err(fail.into_error());
        }
        Ok(RemoteAlbum {
            id: format!("album-{}", n),
            title: title.to_string(),
        })
    }

    async fn upload_media(
        &self,
        access_token: &str,
        album_id: &str,
        file_name: &str,
        content: Bytes,
    ) -> BridgeResult<String> {
        let call_index = {
            let mut calls = self.upload_calls.lock().unwrap();
            calls.push(UploadCall {
                token: access_token.to_string(),
                album_id: album_id.to_string(),
                file_name: file_name.to_string(),
                size: content.len(),
            });
            calls.len()
        };

        if self.poisoned_file.as_deref() == Some(file_name) {
            return Err(Fail::Transient.into_error());
        }
        if let Some(fail) = self.upload_failures.lock().unwrap().pop_front() {
            return Err(fail.into_error());
        }
        Ok(format!("item-{}", call_index))
    }
}

/// Token source that counts refreshes and hands out generation-tagged tokens.
#[derive(Default)]
pub struct CountingTokens {
    generation: AtomicUsize,
    refreshes: AtomicUsize,
    refresh_error: Mutex<Option<AuthError>>,
}

impl CountingTokens {
    pub fn failing_refresh(error: AuthError) -> Self {
        Self {
            refresh_error: Mutex::new(Some(error)),
            ..Default::default()
        }
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessTokenProvider for CountingTokens {
    async fn access_token(&self) -> core_auth::Result<String> {
        Ok(format!("token-{}", self.generation.load(Ordering::SeqCst)))
    }

    async fn refresh(&self) -> core_auth::Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.refresh_error.lock().unwrap().clone() {
            return Err(e);
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
