//! Google Photos Library API connector implementation
//!
//! Implements the `AlbumService` trait for the Library API v1.

use async_trait::async_trait;
use bridge_traits::album::{AlbumService, RemoteAlbum};
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::GooglePhotosError;
use crate::types::{
    AlbumResource, BatchCreateRequest, BatchCreateResponse, CreateAlbumRequest, NewAlbum,
    NewMediaItem, SimpleMediaItem,
};

/// Google Photos Library API base URL
pub const PHOTOS_API_BASE: &str = "https://photoslibrary.googleapis.com";

/// Uploads carry whole video files
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Seconds to wait on a 429 without a `Retry-After` header
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// MIME type for an accepted media extension, by extension, case-insensitive.
pub fn mime_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

/// Google Photos API connector
///
/// Uploading a file is a two-step exchange: the bytes go to `/v1/uploads`
/// with the raw protocol and yield an upload token, which is then attached
/// to the album through `/v1/mediaItems:batchCreate`.
///
/// # Example
///
/// ```ignore
/// use provider_google_photos::GooglePhotosConnector;
/// use bridge_traits::album::AlbumService;
///
/// let connector = GooglePhotosConnector::new(http_client);
/// let album = connector.create_album(&access_token, "Trip").await?;
/// connector.upload_media(&access_token, &album.id, "img-1.jpg", bytes).await?;
/// ```
pub struct GooglePhotosConnector {
    http_client: Arc<dyn HttpClient>,
    api_base: String,
}

impl GooglePhotosConnector {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self::with_base_url(http_client, PHOTOS_API_BASE)
    }

    /// Point the connector at another endpoint (test servers, proxies).
    pub fn with_base_url(http_client: Arc<dyn HttpClient>, api_base: impl Into<String>) -> Self {
        Self {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Send a request and turn non-2xx answers into typed errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.http_client.execute(request).await?;

        if response.is_success() {
            debug!(status = response.status, "API request succeeded");
            return Ok(response);
        }

        let status = response.status;
        let message = String::from_utf8_lossy(&response.body).to_string();

        let error = match status {
            401 => GooglePhotosError::Unauthorized(message),
            429 => GooglePhotosError::RateLimitExceeded {
                retry_after_seconds: response
                    .retry_after()
                    .map(|delay| delay.as_secs())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            },
            _ => GooglePhotosError::ApiError {
                status_code: status,
                message,
            },
        };

        warn!(status, error = %error, "API request failed");
        Err(error.into())
    }

    #[instrument(skip(self, access_token, content), fields(file = %file_name, bytes = content.len()))]
    async fn upload_bytes(&self, access_token: &str, file_name: &str, content: Bytes) -> Result<String> {
        let request = HttpRequest::post(self.url("/v1/uploads"))
            .bearer_token(access_token)
            .header("X-Goog-Upload-Content-Type", mime_type_for(file_name))
            .header("X-Goog-Upload-Protocol", "raw")
            .header("X-Goog-Upload-File-Name", file_name)
            .octet_stream(content)
            .timeout(UPLOAD_TIMEOUT);

        let response = self.send(request).await?;
        let upload_token = String::from_utf8_lossy(&response.body).trim().to_string();

        if upload_token.is_empty() {
            return Err(GooglePhotosError::ParseError("Empty upload token".to_string()).into());
        }

        Ok(upload_token)
    }
}

#[async_trait]
impl AlbumService for GooglePhotosConnector {
    #[instrument(skip(self, access_token), fields(album = %title))]
    async fn create_album(&self, access_token: &str, title: &str) -> Result<RemoteAlbum> {
        let body = CreateAlbumRequest {
            album: NewAlbum {
                title: title.to_string(),
            },
        };
        let request = HttpRequest::post(self.url("/v1/albums"))
            .bearer_token(access_token)
            .json(&body)?
            .timeout(API_TIMEOUT);

        let response = self.send(request).await?;

        let album: AlbumResource = serde_json::from_slice(&response.body).map_err(|e| {
            GooglePhotosError::ParseError(format!("Failed to parse album resource: {}", e))
        })?;

        info!(album_id = %album.id, "Created album");

        Ok(RemoteAlbum {
            id: album.id,
            title: if album.title.is_empty() {
                title.to_string()
            } else {
                album.title
            },
        })
    }

    #[instrument(skip(self, access_token, content), fields(album_id = %album_id, file = %file_name))]
    async fn upload_media(
        &self,
        access_token: &str,
        album_id: &str,
        file_name: &str,
        content: Bytes,
    ) -> Result<String> {
        let upload_token = self.upload_bytes(access_token, file_name, content).await?;

        let body = BatchCreateRequest {
            album_id: album_id.to_string(),
            new_media_items: vec![NewMediaItem {
                description: String::new(),
                simple_media_item: SimpleMediaItem {
                    upload_token,
                    file_name: file_name.to_string(),
                },
            }],
        };
        let request = HttpRequest::post(self.url("/v1/mediaItems:batchCreate"))
            .bearer_token(access_token)
            .json(&body)?
            .timeout(API_TIMEOUT);

        let response = self.send(request).await?;

        let batch: BatchCreateResponse = serde_json::from_slice(&response.body).map_err(|e| {
            GooglePhotosError::ParseError(format!("Failed to parse batchCreate response: {}", e))
        })?;

        let result = batch.new_media_item_results.into_iter().next().ok_or_else(|| {
            GooglePhotosError::ParseError("batchCreate returned no results".to_string())
        })?;

        if !result.is_ok() {
            let message = result
                .status
                .and_then(|s| s.message)
                .unwrap_or_else(|| "no media item returned".to_string());
            return Err(GooglePhotosError::MediaItemRejected {
                file_name: file_name.to_string(),
                message,
            }
            .into());
        }

        let media_item_id = result
            .media_item
            .map(|item| item.id)
            .ok_or_else(|| GooglePhotosError::ParseError("Missing media item".to_string()))?;

        info!(media_item_id = %media_item_id, "Uploaded media item");
        Ok(media_item_id)
    }
}
