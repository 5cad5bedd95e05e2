//! Local image storage for detection snapshots.
//!
//! Images arrive as base64 payloads (optionally with a `data:` URI
//! prefix), are written under the configured storage root, and are
//! referred to by `/storage/<file>` paths that the HTTP server maps back
//! to the same directory.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::{Path, PathBuf};

pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create storage directory: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Decode a base64 image and write it as `<report_id>_<kind>.jpg`.
    /// Returns the `/storage/...` path recorded in the report.
    pub fn store_image(&self, base64_data: &str, report_id: &str, kind: &str) -> Result<String> {
        // Strip a data-URI prefix ("data:image/jpeg;base64,...") if present.
        let payload = match base64_data.split_once(";base64,") {
            Some((_, rest)) => rest,
            None => base64_data,
        };

        let bytes = BASE64
            .decode(payload.trim())
            .context("Invalid base64 image data")?;

        let filename = format!("{}_{}.jpg", report_id, kind);
        let path = self.root.join(&filename);
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write image: {}", path.display()))?;

        Ok(format!("/storage/{}", filename))
    }

    /// Resolve a `/storage/...` path back to the file on disk, if it
    /// exists. Rejects paths that escape the storage root.
    pub fn file_path(&self, storage_path: &str) -> Option<PathBuf> {
        let name = storage_path.strip_prefix("/storage/")?;
        if name.contains("..") || name.contains('/') {
            return None;
        }
        let path = self.root.join(name);
        path.exists().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 black JPEG, enough to exercise the decode/write path.
    const TINY_JPEG_B64: &str = "/9j/4AAQSkZJRgABAQAAAQABAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/wAALCAABAAEBAREA/8QAFAABAAAAAAAAAAAAAAAAAAAACf/EABQQAQAAAAAAAAAAAAAAAAAAAAD/2gAIAQEAAD8AVN//2Q==";

    #[test]
    fn test_store_and_resolve_image() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();

        let url = storage
            .store_image(TINY_JPEG_B64, "MIR-20251024-0001", "original")
            .unwrap();
        assert_eq!(url, "/storage/MIR-20251024-0001_original.jpg");

        let path = storage.file_path(&url).unwrap();
        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_data_uri_prefix_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();

        let with_prefix = format!("data:image/jpeg;base64,{}", TINY_JPEG_B64);
        let url = storage
            .store_image(&with_prefix, "MIR-20251024-0002", "segmented")
            .unwrap();
        assert_eq!(url, "/storage/MIR-20251024-0002_segmented.jpg");
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        assert!(storage
            .store_image("not base64 at all!!!", "MIR-20251024-0003", "original")
            .is_err());
    }

    #[test]
    fn test_path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        assert!(storage.file_path("/storage/../etc/passwd").is_none());
        assert!(storage.file_path("/elsewhere/file.jpg").is_none());
    }

    #[test]
    fn test_missing_file_resolves_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        assert!(storage.file_path("/storage/absent.jpg").is_none());
    }
}
