//! # Event Bus System
//!
//! Typed progress and authentication events broadcast over
//! `tokio::sync::broadcast`, so the CLI (or any other host) can observe a run
//! without the pipeline knowing who is listening.
//!
//! ```text
//! ┌──────────────┐   emit    ┌───────────┐   subscribe   ┌────────────┐
//! │ core-auth    ├──────────>│           ├──────────────>│ Subscriber │
//! └──────────────┘           │ EventBus  │               └────────────┘
//! ┌──────────────┐   emit    │           │   subscribe   ┌────────────┐
//! │ core-upload  ├──────────>│           ├──────────────>│ Subscriber │
//! └──────────────┘           └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::events::{CoreEvent, EventBus, EventStream};
//!
//! let event_bus = EventBus::new(100);
//! let mut stream = EventStream::new(event_bus.subscribe())
//!     .filter(|event| matches!(event, CoreEvent::Upload(_)));
//!
//! tokio::spawn(async move {
//!     while let Ok(event) = stream.recv().await {
//!         println!("{}", event.description());
//!     }
//! });
//! ```
//!
//! Emitting with no subscribers returns an error that publishers ignore
//! (`let _ = bus.emit(...)`). A slow subscriber sees `RecvError::Lagged(n)`
//! and can keep receiving; `RecvError::Closed` means every sender is gone.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Authentication-related events
    Auth(AuthEvent),
    /// Upload pipeline events
    Upload(UploadEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Upload(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Upload(UploadEvent::FileFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Upload(UploadEvent::AlbumFailed { .. }) => EventSeverity::Error,
            CoreEvent::Upload(UploadEvent::RunCancelled { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedIn { .. }) => EventSeverity::Info,
            CoreEvent::Upload(UploadEvent::RunCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Upload(UploadEvent::AlbumCompleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events related to the credential lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// Stored credential removed by explicit re-authorization.
    SignedOut,
    /// Authorization URL handed out; waiting for the code.
    SigningIn {
        provider: String,
    },
    /// Authorization completed.
    SignedIn {
        provider: String,
        /// Whether the exchange returned a new refresh token
        refresh_token_issued: bool,
    },
    /// Access token is being refreshed.
    TokenRefreshing,
    /// Token refresh completed successfully.
    TokenRefreshed {
        /// Timestamp when the new token expires (Unix epoch seconds).
        expires_at: i64,
        /// Whether the identity provider rotated the refresh token.
        rotated: bool,
    },
    /// Authentication error occurred.
    AuthError {
        message: String,
        /// Whether retrying can succeed without user interaction.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SignedOut => "Signed out",
            AuthEvent::SigningIn { .. } => "Authorization in progress",
            AuthEvent::SignedIn { .. } => "Authorization completed",
            AuthEvent::TokenRefreshing => "Refreshing access token",
            AuthEvent::TokenRefreshed { .. } => "Token refreshed successfully",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Upload Events
// ============================================================================

/// Events emitted while a bulk upload runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum UploadEvent {
    /// A run started over the discovered folders.
    RunStarted {
        run_id: String,
        folders: u64,
        files: u64,
    },
    /// Remote album created for a folder.
    AlbumCreated {
        run_id: String,
        album_id: String,
        title: String,
    },
    /// Album creation exhausted its retries; the folder is skipped.
    AlbumFailed {
        run_id: String,
        title: String,
        message: String,
    },
    /// One file landed in its album.
    FileUploaded {
        run_id: String,
        album_title: String,
        file_name: String,
        /// Retries needed before success
        retries: u32,
    },
    /// One file exhausted its retries.
    FileFailed {
        run_id: String,
        album_title: String,
        file_name: String,
        attempts: u32,
        message: String,
    },
    /// All files of a folder were processed.
    AlbumCompleted {
        run_id: String,
        title: String,
        uploaded: u64,
        failed: u64,
    },
    /// The run finished.
    RunCompleted {
        run_id: String,
        albums: u64,
        uploaded: u64,
        failed: u64,
        duration_secs: u64,
    },
    /// The run was cancelled; partial results were returned.
    RunCancelled {
        run_id: String,
        uploaded: u64,
    },
}

impl UploadEvent {
    fn description(&self) -> &str {
        match self {
            UploadEvent::RunStarted { .. } => "Upload run started",
            UploadEvent::AlbumCreated { .. } => "Album created",
            UploadEvent::AlbumFailed { .. } => "Album creation failed",
            UploadEvent::FileUploaded { .. } => "File uploaded",
            UploadEvent::FileFailed { .. } => "File upload failed",
            UploadEvent::AlbumCompleted { .. } => "Album completed",
            UploadEvent::RunCompleted { .. } => "Upload run completed",
            UploadEvent::RunCancelled { .. } => "Upload run cancelled",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for [`CoreEvent`]s.
///
/// Cloning the bus clones the sender; all clones feed the same subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus holding at most `capacity` undelivered events
    /// per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emits an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received it, or an error when
    /// there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Subscribes to events emitted after this call.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver wrapper that skips events rejected by a predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only yield events for which `predicate` returns true.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next matching event.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
