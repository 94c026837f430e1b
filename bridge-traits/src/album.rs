//! Remote Album Service Abstraction
//!
//! The capability the upload pipeline needs from a photo-album backend:
//! create an album and put media bytes into it.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Album created on the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAlbum {
    pub id: String,
    pub title: String,
}

/// Photo-album backend
///
/// Every call takes the access token explicitly; the caller owns the
/// credential lifecycle. A rejected token must surface as
/// [`BridgeError::Unauthorized`](crate::error::BridgeError::Unauthorized) so
/// callers can refresh and retry. Other failures use the remaining variants.
#[async_trait]
pub trait AlbumService: Send + Sync {
    /// Create a new album. Titles are not deduplicated.
    async fn create_album(&self, access_token: &str, title: &str) -> Result<RemoteAlbum>;

    /// Upload one media file into an album, returning the remote media item id
    async fn upload_media(
        &self,
        access_token: &str,
        album_id: &str,
        file_name: &str,
        content: Bytes,
    ) -> Result<String>;
}
