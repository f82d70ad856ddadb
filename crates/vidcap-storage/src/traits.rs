//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Number of concurrent deletes issued by [`Storage::delete_prefix`].
const DELETE_CONCURRENCY: usize = 16;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("Failed to delete {} object(s): {}", failed.len(), failed.join("; "))]
    PartialDelete {
        /// One `"{key}: {reason}"` entry per key that could not be deleted
        failed: Vec<String>,
    },

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) implement this trait, so the orchestrator
/// and the batch repository work against any backend. Implementations do not retry;
/// every failure is returned to the caller.
///
/// **Key format:** see the crate root documentation.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` at `storage_key`, replacing any existing object.
    /// Returns the public URL of the object.
    async fn upload(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Download an object by its storage key
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// List every key under `prefix`, following pagination until exhausted.
    /// Keys are returned in lexical order.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Delete an object. Deleting a key that does not exist succeeds.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Generate a presigned/temporary URL for direct access (GET)
    async fn get_presigned_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Check if an object exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;

    /// Delete every object under `prefix` and return how many were deleted.
    ///
    /// All keys are attempted. Failures are accumulated into a single
    /// [`StorageError::PartialDelete`] that names every key that could not be deleted.
    async fn delete_prefix(&self, prefix: &str) -> StorageResult<usize> {
        let keys = self.list(prefix).await?;
        let total = keys.len();

        let results: Vec<(String, StorageResult<()>)> = futures::stream::iter(keys)
            .map(|key| async move {
                let result = self.delete(&key).await;
                (key, result)
            })
            .buffer_unordered(DELETE_CONCURRENCY)
            .collect()
            .await;

        let mut failed: Vec<String> = results
            .into_iter()
            .filter_map(|(key, result)| result.err().map(|e| format!("{}: {}", key, e)))
            .collect();

        if failed.is_empty() {
            tracing::info!(prefix = %prefix, deleted = total, "Deleted objects under prefix");
            Ok(total)
        } else {
            failed.sort();
            tracing::error!(
                prefix = %prefix,
                failed = failed.len(),
                total = total,
                "Prefix delete partially failed"
            );
            Err(StorageError::PartialDelete { failed })
        }
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use crate::LocalStorage;
    use tempfile::tempdir;

    /// Local storage that refuses to delete keys containing `marker`.
    struct FlakyStorage {
        inner: LocalStorage,
        marker: &'static str,
    }

    #[async_trait]
    impl Storage for FlakyStorage {
        async fn upload(&self, key: &str, data: Vec<u8>, ct: &str) -> StorageResult<String> {
            self.inner.upload(key, data, ct).await
        }

        async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
            self.inner.download(key).await
        }

        async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
            self.inner.list(prefix).await
        }

        async fn delete(&self, key: &str) -> StorageResult<()> {
            if key.contains(self.marker) {
                return Err(StorageError::DeleteFailed("access denied".to_string()));
            }
            self.inner.delete(key).await
        }

        async fn get_presigned_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
            self.inner.get_presigned_url(key, ttl).await
        }

        async fn exists(&self, key: &str) -> StorageResult<bool> {
            self.inner.exists(key).await
        }

        fn backend_type(&self) -> StorageBackend {
            self.inner.backend_type()
        }
    }

    #[tokio::test]
    async fn delete_prefix_reports_every_failed_key() {
        let dir = tempdir().unwrap();
        let inner = LocalStorage::new(dir.path(), "http://localhost:3000/media".to_string())
            .await
            .unwrap();
        let storage = FlakyStorage {
            inner,
            marker: "locked",
        };

        for key in [
            "uploads/b/video/cam_1.ts",
            "uploads/b/video/locked_2.ts",
            "uploads/b/background/locked_1.png",
            "uploads/b/calibration/calibration.json",
        ] {
            storage.upload(key, b"x".to_vec(), "application/octet-stream").await.unwrap();
        }

        let err = storage.delete_prefix("uploads/b").await.unwrap_err();
        match err {
            StorageError::PartialDelete { failed } => {
                assert_eq!(failed.len(), 2);
                assert!(failed[0].starts_with("uploads/b/background/locked_1.png"));
                assert!(failed[1].starts_with("uploads/b/video/locked_2.ts"));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Non-failing keys were still deleted.
        assert!(!storage.exists("uploads/b/video/cam_1.ts").await.unwrap());
        assert!(!storage
            .exists("uploads/b/calibration/calibration.json")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn delete_prefix_of_empty_prefix_is_zero() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:3000/media".to_string())
            .await
            .unwrap();

        assert_eq!(storage.delete_prefix("uploads/nothing").await.unwrap(), 0);
    }
}
