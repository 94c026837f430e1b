//! # Upload Orchestrator
//!
//! Creates one album per [`FolderGroup`] and uploads its files sequentially.
//!
//! ## Retry
//!
//! Every remote call (album creation and each file upload) runs in a bounded
//! loop. A failed attempt is classified: an unauthorized answer triggers a
//! token refresh, anything else is transient. Either way the loop waits the
//! configured delay, then retries until `max_retry` retries are spent, for
//! `max_retry + 1` attempts in total. A file that exhausts its attempts is
//! recorded as failed and the run moves on.
//!
//! A credential persistence failure during refresh aborts the run; the store
//! and the provider can no longer be trusted to agree.
//!
//! ## Usage
//!
//! ```ignore
//! use core_upload::{UploadConfig, UploadOrchestrator};
//!
//! let orchestrator = UploadOrchestrator::new(album_service, tokens, fs, UploadConfig::default(), event_bus);
//! let results = orchestrator.run(&groups).await?;
//! ```

use crate::config::UploadConfig;
use crate::error::Result;
use crate::types::{FolderGroup, UploadResult};
use bridge_traits::album::{AlbumService, RemoteAlbum};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::storage::FileSystemAccess;
use core_auth::{AccessTokenProvider, AuthError};
use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// How a failed attempt is handled before the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Access token rejected; refresh before retrying
    Unauthorized,
    /// Anything else; retry as is
    Transient,
}

impl FailureKind {
    pub fn classify(error: &BridgeError) -> Self {
        if error.is_unauthorized() {
            FailureKind::Unauthorized
        } else {
            FailureKind::Transient
        }
    }
}

/// Why a single attempt failed.
enum AttemptFailure {
    /// No access token could be obtained
    Token(AuthError),
    Remote(BridgeError),
}

impl AttemptFailure {
    fn kind(&self) -> FailureKind {
        match self {
            AttemptFailure::Token(_) => FailureKind::Transient,
            AttemptFailure::Remote(e) => FailureKind::classify(e),
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Token(e) => write!(f, "{}", e),
            AttemptFailure::Remote(e) => write!(f, "{}", e),
        }
    }
}

/// Result of a bounded retry loop.
enum RetryOutcome<T> {
    Succeeded { value: T, retries: u32 },
    Exhausted { attempts: u32, last_error: String },
    Cancelled,
}

/// Sequential album-per-folder uploader.
pub struct UploadOrchestrator {
    album_service: Arc<dyn AlbumService>,
    tokens: Arc<dyn AccessTokenProvider>,
    fs: Arc<dyn FileSystemAccess>,
    config: UploadConfig,
    event_bus: EventBus,
}

impl UploadOrchestrator {
    pub fn new(
        album_service: Arc<dyn AlbumService>,
        tokens: Arc<dyn AccessTokenProvider>,
        fs: Arc<dyn FileSystemAccess>,
        config: UploadConfig,
        event_bus: EventBus,
    ) -> Self {
        Self {
            album_service,
            tokens,
            fs,
            config,
            event_bus,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Upload every group, one result per group in input order.
    pub async fn run(&self, groups: &[FolderGroup]) -> Result<Vec<UploadResult>> {
        self.run_with_cancellation(groups, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), stopping early when `cancel` fires.
    ///
    /// Cancellation returns the results gathered so far, including a partial
    /// result for the folder in progress.
    #[instrument(skip(self, groups, cancel), fields(folders = groups.len()))]
    pub async fn run_with_cancellation(
        &self,
        groups: &[FolderGroup],
        cancel: CancellationToken,
    ) -> Result<Vec<UploadResult>> {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let total_files: usize = groups.iter().map(FolderGroup::file_count).sum();

        info!(run_id = %run_id, files = total_files, "Starting upload run");
        self.emit(UploadEvent::RunStarted {
            run_id: run_id.clone(),
            folders: groups.len() as u64,
            files: total_files as u64,
        });

        let mut results = Vec::with_capacity(groups.len());

        for group in groups {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(&run_id, results));
            }

            let (result, cancelled) = self.upload_group(&run_id, group, &cancel).await?;
            results.push(result);

            if cancelled {
                return Ok(self.cancelled(&run_id, results));
            }
        }

        let uploaded: usize = results.iter().map(|r| r.uploaded_count).sum();
        let failed: usize = results.iter().map(|r| r.failed_files.len()).sum();

        info!(
            run_id = %run_id,
            albums = results.len(),
            uploaded,
            failed,
            "Upload run complete"
        );
        self.emit(UploadEvent::RunCompleted {
            run_id,
            albums: results.len() as u64,
            uploaded: uploaded as u64,
            failed: failed as u64,
            duration_secs: started.elapsed().as_secs(),
        });

        Ok(results)
    }

    /// Create the album and upload the group's files. The flag reports
    /// whether the run was cancelled midway.
    #[instrument(skip(self, group, cancel), fields(album = %group.folder_name, files = group.files.len()))]
    async fn upload_group(
        &self,
        run_id: &str,
        group: &FolderGroup,
        cancel: &CancellationToken,
    ) -> Result<(UploadResult, bool)> {
        let title = group.folder_name.as_str();
        let mut result = UploadResult::new(title);

        let album: RemoteAlbum = match self
            .with_retry(cancel, |token| async move {
                self.album_service.create_album(&token, title).await
            })
            .await?
        {
            RetryOutcome::Succeeded { value, .. } => value,
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                error!(attempts, error = %last_error, "Album creation failed, skipping folder");
                result.failed_files = group
                    .files
                    .iter()
                    .map(|f| f.normalized_name.clone())
                    .collect();
                self.emit(UploadEvent::AlbumFailed {
                    run_id: run_id.to_string(),
                    title: title.to_string(),
                    message: last_error,
                });
                return Ok((result, false));
            }
            RetryOutcome::Cancelled => return Ok((result, true)),
        };

        info!(album_id = %album.id, "Album created");
        result.album_id = Some(album.id.clone());
        self.emit(UploadEvent::AlbumCreated {
            run_id: run_id.to_string(),
            album_id: album.id.clone(),
            title: title.to_string(),
        });

        let album_id = album.id.as_str();

        for file in &group.files {
            let file_name = file.normalized_name.as_str();

            let content = match self.fs.read_file(&file.source_path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(file = %file_name, error = %e, "Cannot read media file");
                    result.failed_files.push(file_name.to_string());
                    self.emit(UploadEvent::FileFailed {
                        run_id: run_id.to_string(),
                        album_title: title.to_string(),
                        file_name: file_name.to_string(),
                        attempts: 0,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let outcome = self
                .with_retry(cancel, |token| {
                    let content = content.clone();
                    async move {
                        self.album_service
                            .upload_media(&token, album_id, file_name, content)
                            .await
                    }
                })
                .await?;

            match outcome {
                RetryOutcome::Succeeded { value, retries } => {
                    debug!(file = %file_name, media_item_id = %value, retries, "File uploaded");
                    result.uploaded_count += 1;
                    self.emit(UploadEvent::FileUploaded {
                        run_id: run_id.to_string(),
                        album_title: title.to_string(),
                        file_name: file_name.to_string(),
                        retries,
                    });
                }
                RetryOutcome::Exhausted {
                    attempts,
                    last_error,
                } => {
                    warn!(file = %file_name, attempts, error = %last_error, "Giving up on file");
                    result.failed_files.push(file_name.to_string());
                    self.emit(UploadEvent::FileFailed {
                        run_id: run_id.to_string(),
                        album_title: title.to_string(),
                        file_name: file_name.to_string(),
                        attempts,
                        message: last_error,
                    });
                }
                RetryOutcome::Cancelled => return Ok((result, true)),
            }
        }

        info!(
            uploaded = result.uploaded_count,
            failed = result.failed_files.len(),
            "Album complete"
        );
        self.emit(UploadEvent::AlbumCompleted {
            run_id: run_id.to_string(),
            title: title.to_string(),
            uploaded: result.uploaded_count as u64,
            failed: result.failed_files.len() as u64,
        });

        Ok((result, false))
    }

    /// Run `call` with a fresh access token until it succeeds, retries run
    /// out, or `cancel` fires.
    ///
    /// The delay follows every failure, including the last one.
    async fn with_retry<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<RetryOutcome<T>>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = BridgeResult<T>>,
    {
        let mut retry_count: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Ok(RetryOutcome::Cancelled);
            }

            let attempt = match self.tokens.access_token().await {
                Ok(token) => call(token).await.map_err(AttemptFailure::Remote),
                Err(e) if e.is_persistence_failure() => return Err(e.into()),
                Err(e) => Err(AttemptFailure::Token(e)),
            };

            let failure = match attempt {
                Ok(value) => {
                    return Ok(RetryOutcome::Succeeded {
                        value,
                        retries: retry_count,
                    })
                }
                Err(failure) => failure,
            };

            let kind = failure.kind();
            warn!(attempt = retry_count + 1, ?kind, error = %failure, "Attempt failed");

            if kind == FailureKind::Unauthorized {
                if let Err(e) = self.tokens.refresh().await {
                    if e.is_persistence_failure() {
                        error!(error = %e, "Credential persistence failed, aborting run");
                        return Err(e.into());
                    }
                    warn!(error = %e, "Token refresh failed");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(RetryOutcome::Cancelled),
                _ = sleep(self.config.retry_delay) => {}
            }

            if retry_count >= self.config.max_retry {
                return Ok(RetryOutcome::Exhausted {
                    attempts: retry_count + 1,
                    last_error: failure.to_string(),
                });
            }
            retry_count += 1;
        }
    }

    fn cancelled(&self, run_id: &str, results: Vec<UploadResult>) -> Vec<UploadResult> {
        let uploaded: usize = results.iter().map(|r| r.uploaded_count).sum();
        warn!(run_id = %run_id, uploaded, "Upload run cancelled");
        self.emit(UploadEvent::RunCancelled {
            run_id: run_id.to_string(),
            uploaded: uploaded as u64,
        });
        results
    }

    fn emit(&self, event: UploadEvent) {
        let _ = self.event_bus.emit(CoreEvent::Upload(event));
    }
}
