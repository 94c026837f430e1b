//! Google Photos Library API request and response types
//!
//! See: https://developers.google.com/photos/library/reference/rest

use serde::{Deserialize, Serialize};

/// albums.create request body
#[derive(Debug, Serialize)]
pub struct CreateAlbumRequest {
    pub album: NewAlbum,
}

#[derive(Debug, Serialize)]
pub struct NewAlbum {
    pub title: String,
}

/// Album resource
///
/// See: https://developers.google.com/photos/library/reference/rest/v1/albums#Album
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumResource {
    pub id: String,

    /// Omitted by the API for untitled albums
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub product_url: Option<String>,

    #[serde(default)]
    pub is_writeable: Option<bool>,
}

/// mediaItems.batchCreate request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateRequest {
    pub album_id: String,
    pub new_media_items: Vec<NewMediaItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMediaItem {
    pub description: String,
    pub simple_media_item: SimpleMediaItem,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleMediaItem {
    /// Token returned by the raw byte upload
    pub upload_token: String,
    pub file_name: String,
}

/// mediaItems.batchCreate response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateResponse {
    #[serde(default)]
    pub new_media_item_results: Vec<NewMediaItemResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMediaItemResult {
    #[serde(default)]
    pub upload_token: Option<String>,

    #[serde(default)]
    pub status: Option<Status>,

    #[serde(default)]
    pub media_item: Option<MediaItem>,
}

impl NewMediaItemResult {
    /// A missing status or code 0 means the item was created.
    pub fn is_ok(&self) -> bool {
        self.status
            .as_ref()
            .map_or(true, |status| status.code.unwrap_or(0) == 0)
            && self.media_item.is_some()
    }
}

/// google.rpc.Status
#[derive(Debug, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: Option<i32>,

    #[serde(default)]
    pub message: Option<String>,
}

/// Media item resource
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,

    #[serde(default)]
    pub product_url: Option<String>,

    #[serde(default)]
    pub mime_type: Option<String>,

    #[serde(default)]
    pub filename: Option<String>,
}
