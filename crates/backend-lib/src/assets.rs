// ============================
// crates/backend-lib/src/assets.rs
// ============================
//! Asset storage abstraction with a flat-file implementation.

use std::{
    fs,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::fs as tokio_fs;

use crate::error::ContestError;

/// Where downloaded track audio ends up.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Persist audio bytes under `name` and return the locator clients
    /// can play it from.
    async fn persist(&self, bytes: &[u8], name: &str) -> Result<String, ContestError>;

    /// Remove a previously persisted asset, e.g. after the submission
    /// it belonged to failed its commit.
    async fn remove(&self, name: &str) -> Result<(), ContestError>;
}

/// Flat-file implementation serving out of the uploads directory.
#[derive(Clone)]
pub struct FlatFileAssets {
    root: PathBuf,
}

impl FlatFileAssets {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, ContestError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(FlatFileAssets { root })
    }
}

#[async_trait]
impl AssetStore for FlatFileAssets {
    async fn persist(&self, bytes: &[u8], name: &str) -> Result<String, ContestError> {
        let filename = format!("{name}.mp3");
        let path = self.root.join(&filename);
        tokio_fs::write(&path, bytes)
            .await
            .map_err(|e| ContestError::AssetPersistFailed(e.to_string()))?;
        Ok(format!("/uploads/{filename}"))
    }

    async fn remove(&self, name: &str) -> Result<(), ContestError> {
        let path = self.root.join(format!("{name}.mp3"));
        tokio_fs::remove_file(&path)
            .await
            .map_err(|e| ContestError::AssetPersistFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_persist_writes_and_returns_locator() {
        let temp_dir = TempDir::new().unwrap();
        let store = FlatFileAssets::new(temp_dir.path()).unwrap();

        let audio_ref = store.persist(b"fake mp3 bytes", "my-track").await.unwrap();
        assert_eq!(audio_ref, "/uploads/my-track.mp3");

        let on_disk = tokio_fs::read(temp_dir.path().join("my-track.mp3"))
            .await
            .unwrap();
        assert_eq!(on_disk, b"fake mp3 bytes");
    }

    #[tokio::test]
    async fn test_persist_overwrites_same_name() {
        let temp_dir = TempDir::new().unwrap();
        let store = FlatFileAssets::new(temp_dir.path()).unwrap();

        store.persist(b"one", "track").await.unwrap();
        store.persist(b"two", "track").await.unwrap();

        let on_disk = tokio_fs::read(temp_dir.path().join("track.mp3")).await.unwrap();
        assert_eq!(on_disk, b"two");
    }

    #[tokio::test]
    async fn test_remove_deletes_persisted_asset() {
        let temp_dir = TempDir::new().unwrap();
        let store = FlatFileAssets::new(temp_dir.path()).unwrap();

        store.persist(b"bytes", "track").await.unwrap();
        store.remove("track").await.unwrap();
        assert!(!temp_dir.path().join("track.mp3").exists());

        // removing an unknown asset reports the miss
        assert!(store.remove("track").await.is_err());
    }
}
