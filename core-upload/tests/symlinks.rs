//! Discovery over a real directory tree containing symlinks.

#![cfg(unix)]

use bridge_desktop::TokioFileSystem;
use core_upload::{MediaDiscovery, UploadError};
use std::os::unix::fs::symlink;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn discovery() -> MediaDiscovery {
    MediaDiscovery::new(Arc::new(TokioFileSystem::new()))
}

#[tokio::test]
async fn test_directory_cycle_lists_each_file_once() {
    let root = TempDir::new().unwrap();
    let trip = root.path().join("Trip");
    std::fs::create_dir(&trip).unwrap();
    std::fs::write(trip.join("a.jpg"), b"jpeg").unwrap();
    symlink(&trip, trip.join("loop")).unwrap();

    let groups = discovery().discover(root.path()).await.unwrap();

    assert_eq!(groups.len(), 1);
    let paths: Vec<PathBuf> = groups[0].files.iter().map(|f| f.source_path.clone()).collect();
    assert_eq!(paths, vec![trip.join("a.jpg")]);
}

#[tokio::test]
async fn test_dangling_link_does_not_fail_discovery() {
    let root = TempDir::new().unwrap();
    let trip = root.path().join("Trip");
    std::fs::create_dir(&trip).unwrap();
    std::fs::write(trip.join("a.jpg"), b"jpeg").unwrap();
    symlink(root.path().join("deleted.jpg"), trip.join("old.jpg")).unwrap();
    symlink(root.path().join("deleted"), root.path().join("Gone")).unwrap();

    let groups = discovery().discover(root.path()).await.unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].folder_name, "Trip");
    assert_eq!(groups[0].files.len(), 1);
    assert_eq!(groups[0].files[0].normalized_name, "a.jpg");
}

#[tokio::test]
async fn test_symlinked_album_folder_is_walked() {
    let root = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    std::fs::write(elsewhere.path().join("Beach.JPG"), b"jpeg").unwrap();
    symlink(elsewhere.path(), root.path().join("Holiday")).unwrap();

    let groups = discovery().discover(root.path()).await.unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].folder_name, "Holiday");
    assert_eq!(groups[0].files[0].normalized_name, "beach.jpg");
}

#[tokio::test]
async fn test_missing_root_still_fails() {
    let root = TempDir::new().unwrap();
    let err = discovery()
        .discover(&root.path().join("PHOTOS"))
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Discovery { .. }));
}
