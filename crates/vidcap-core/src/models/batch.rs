use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use super::file::{DeclaredFile, StoredObject};
use super::video::VideoMetadata;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Uploading,
    Ready,
    Failed,
}

impl BatchStatus {
    /// `Ready` and `Failed` are terminal; a terminal batch is never modified again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Ready | BatchStatus::Failed)
    }
}

impl Display for BatchStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            BatchStatus::Uploading => write!(f, "uploading"),
            BatchStatus::Ready => write!(f, "ready"),
            BatchStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Descriptive metadata supplied by the client for a capture batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchMetadata {
    pub studio: String,
    pub producer: String,
    pub production: String,
    pub action: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BatchStateError {
    #[error("batch {id} is already {status} and cannot change")]
    Terminal { id: Uuid, status: BatchStatus },
}

/// One client-initiated ingestion request and its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadBatch {
    pub id: Uuid,
    pub metadata: BatchMetadata,
    pub camera_count: u32,
    pub status: BatchStatus,
    /// `<configured-prefix>/<batch-uuid>`
    pub storage_prefix: String,
    pub declared_files: Vec<DeclaredFile>,
    #[serde(default)]
    pub stored_objects: Vec<StoredObject>,
    #[serde(default)]
    pub video_metadata: Option<VideoMetadata>,
    #[serde(default)]
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadBatch {
    pub fn new(
        id: Uuid,
        metadata: BatchMetadata,
        camera_count: u32,
        storage_prefix: String,
        declared_files: Vec<DeclaredFile>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            metadata,
            camera_count,
            status: BatchStatus::Uploading,
            storage_prefix,
            declared_files,
            stored_objects: Vec::new(),
            video_metadata: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move the batch to `next`. Fails once the batch is terminal.
    pub fn transition(&mut self, next: BatchStatus) -> Result<(), BatchStateError> {
        if self.status.is_terminal() {
            return Err(BatchStateError::Terminal {
                id: self.id,
                status: self.status,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the batch failed with a summary of what went wrong.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), BatchStateError> {
        self.transition(BatchStatus::Failed)?;
        self.failure = Some(reason.into());
        Ok(())
    }

    pub fn record_stored(&mut self, objects: impl IntoIterator<Item = StoredObject>) {
        self.stored_objects.extend(objects);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> UploadBatch {
        UploadBatch::new(
            Uuid::new_v4(),
            BatchMetadata::default(),
            2,
            "uploads/x".to_string(),
            Vec::new(),
        )
    }

    #[test]
    fn new_batch_is_uploading() {
        let batch = batch();
        assert_eq!(batch.status, BatchStatus::Uploading);
        assert!(batch.stored_objects.is_empty());
        assert!(!batch.status.is_terminal());
    }

    #[test]
    fn terminal_batch_is_immutable() {
        let mut batch = batch();
        batch.transition(BatchStatus::Ready).unwrap();

        let err = batch.transition(BatchStatus::Failed).unwrap_err();
        assert_eq!(
            err,
            BatchStateError::Terminal {
                id: batch.id,
                status: BatchStatus::Ready
            }
        );
        assert_eq!(batch.status, BatchStatus::Ready);
    }

    #[test]
    fn fail_records_reason() {
        let mut batch = batch();
        batch.fail("remux exited with status 1").unwrap();
        assert_eq!(batch.status, BatchStatus::Failed);
        assert_eq!(batch.failure.as_deref(), Some("remux exited with status 1"));
        assert!(batch.fail("again").is_err());
    }

    #[test]
    fn status_display_matches_stored_form() {
        for status in [BatchStatus::Uploading, BatchStatus::Ready, BatchStatus::Failed] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
    }
}
