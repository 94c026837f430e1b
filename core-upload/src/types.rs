//! Discovery and upload result types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A media file selected for upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    /// Slugified base name sent to the remote service
    pub normalized_name: String,
    pub source_path: PathBuf,
}

/// One top-level folder and the media found beneath it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderGroup {
    /// Folder name, used verbatim as the album title
    pub folder_name: String,
    pub files: Vec<MediaFile>,
}

impl FolderGroup {
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// Outcome for one folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub album_title: String,
    pub uploaded_count: usize,

    /// `None` when the album could not be created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,

    /// Normalized names of files that exhausted their retries
    #[serde(default)]
    pub failed_files: Vec<String>,
}

impl UploadResult {
    pub(crate) fn new(album_title: impl Into<String>) -> Self {
        Self {
            album_title: album_title.into(),
            uploaded_count: 0,
            album_id: None,
            failed_files: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_result_json_shape() {
        let result = UploadResult {
            album_title: "Trip".to_string(),
            uploaded_count: 2,
            album_id: Some("album1".to_string()),
            failed_files: vec![],
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["albumTitle"], "Trip");
        assert_eq!(json["uploadedCount"], 2);
        assert_eq!(json["albumId"], "album1");
    }

    #[test]
    fn test_missing_album_id_is_omitted() {
        let json = serde_json::to_value(UploadResult::new("Empty")).unwrap();
        assert!(json.get("albumId").is_none());
        assert_eq!(json["uploadedCount"], 0);
    }
}
