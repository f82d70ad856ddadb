//! Ingestion errors
//!
//! Per-file failures are collected into [`FileFailure`] values that name the file, its
//! category and the failing stage, and carry the tool's own diagnostic text.

use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use thiserror::Error;
use uuid::Uuid;
use vidcap_core::models::{BatchStateError, FileCategory};
use vidcap_core::{ErrorMetadata, LogLevel, ToolStage};
use vidcap_storage::StorageError;

use crate::batch_store::RepositoryError;
use crate::video::{ExtractionError, TranscodeError};

/// Where a single file's transform-and-upload unit failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "stage")]
pub enum FailureStage {
    Tool(ToolStage),
    Upload,
}

impl Display for FailureStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FailureStage::Tool(stage) => write!(f, "{}", stage),
            FailureStage::Upload => write!(f, "upload"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub category: FileCategory,
    pub filename: String,
    pub stage: FailureStage,
    pub message: String,
    /// Raw diagnostic output of the external tool, when it produced any.
    pub diagnostic: Option<String>,
}

impl FileFailure {
    pub fn transcode(filename: &str, err: &TranscodeError) -> Self {
        let diagnostic = match err {
            TranscodeError::Remux(tool) => tool.diagnostic(),
            TranscodeError::Scan(crate::gop::ScanError::Tool(tool)) => tool.diagnostic(),
            _ => None,
        };
        Self {
            category: FileCategory::Video,
            filename: filename.to_string(),
            stage: FailureStage::Tool(err.stage()),
            message: err.to_string(),
            diagnostic: diagnostic.map(String::from),
        }
    }

    pub fn extraction(filename: &str, err: &ExtractionError) -> Self {
        let diagnostic = match err {
            ExtractionError::Tool(tool) => tool.diagnostic(),
            _ => None,
        };
        Self {
            category: FileCategory::Background,
            filename: filename.to_string(),
            stage: FailureStage::Tool(ToolStage::FrameExtract),
            message: err.to_string(),
            diagnostic: diagnostic.map(String::from),
        }
    }

    pub fn upload(category: FileCategory, filename: &str, err: &StorageError) -> Self {
        Self {
            category,
            filename: filename.to_string(),
            stage: FailureStage::Upload,
            message: err.to_string(),
            diagnostic: None,
        }
    }

    pub fn is_storage(&self) -> bool {
        self.stage == FailureStage::Upload
    }
}

impl Display for FileFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{} file {} failed at {}: {}",
            self.category, self.filename, self.stage, self.message
        )
    }
}

fn join_failures(failures: &[FileFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unsupported format for {category} file {filename}: {reason}")]
    UnsupportedFormat {
        category: FileCategory,
        filename: String,
        reason: String,
    },

    #[error("Invalid upload request: {0}")]
    InvalidRequest(String),

    #[error("Batch {0} not found")]
    NotFound(Uuid),

    #[error("Batch {batch_id} failed with {} file failure(s): {}", failures.len(), join_failures(failures))]
    Batch {
        batch_id: Uuid,
        failures: Vec<FileFailure>,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    State(#[from] BatchStateError),
}

impl ErrorMetadata for IngestError {
    fn http_status_code(&self) -> u16 {
        match self {
            IngestError::UnsupportedFormat { .. } => 415,
            IngestError::InvalidRequest(_) => 400,
            IngestError::NotFound(_) => 404,
            IngestError::State(_) => 409,
            IngestError::Repository(RepositoryError::Terminal(_)) => 409,
            IngestError::Repository(RepositoryError::AlreadyExists(_)) => 409,
            IngestError::Repository(RepositoryError::NotFound(_)) => 404,
            IngestError::Batch { failures, .. } => {
                if failures.iter().any(FileFailure::is_storage) {
                    502
                } else {
                    500
                }
            }
            IngestError::Storage(_) | IngestError::Repository(_) => 502,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            IngestError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            IngestError::InvalidRequest(_) => "INVALID_REQUEST",
            IngestError::NotFound(_) => "BATCH_NOT_FOUND",
            IngestError::State(_) => "BATCH_TERMINAL",
            IngestError::Batch { failures, .. } => {
                if failures.iter().any(FileFailure::is_storage) {
                    "STORAGE_ERROR"
                } else {
                    "PROCESSING_FAILED"
                }
            }
            IngestError::Storage(_) => "STORAGE_ERROR",
            IngestError::Repository(RepositoryError::Terminal(_)) => "BATCH_TERMINAL",
            IngestError::Repository(RepositoryError::NotFound(_)) => "BATCH_NOT_FOUND",
            IngestError::Repository(_) => "BATCH_STORE_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            IngestError::Storage(_) => true,
            IngestError::Repository(RepositoryError::Storage(_)) => true,
            IngestError::Batch { failures, .. } => failures.iter().all(FileFailure::is_storage),
            _ => false,
        }
    }

    fn client_message(&self) -> String {
        match self {
            IngestError::Storage(_) => "Object storage is unavailable".to_string(),
            IngestError::Repository(RepositoryError::Storage(_))
            | IngestError::Repository(RepositoryError::Serialization(_)) => {
                "Batch record could not be read or written".to_string()
            }
            other => other.to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self.http_status_code() {
            400..=499 => LogLevel::Debug,
            _ if self.is_recoverable() => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolError;

    #[test]
    fn unsupported_format_is_client_error() {
        let err = IngestError::UnsupportedFormat {
            category: FileCategory::Video,
            filename: "cam_1.avi".to_string(),
            reason: "expected .mp4 or .ts".to_string(),
        };
        assert_eq!(err.http_status_code(), 415);
        assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
        assert!(!err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Debug);
        assert!(err.client_message().contains("cam_1.avi"));
    }

    #[test]
    fn tool_failure_names_file_stage_and_diagnostic() {
        let err = TranscodeError::Remux(ToolError::Exit {
            program: "ffmpeg".to_string(),
            status: "status 1".to_string(),
            stderr: "source.mp4: Invalid data found when processing input".to_string(),
        });
        let failure = FileFailure::transcode("cam_b.mp4", &err);

        assert_eq!(failure.stage, FailureStage::Tool(ToolStage::Remux));
        assert_eq!(
            failure.diagnostic.as_deref(),
            Some("source.mp4: Invalid data found when processing input")
        );

        let text = failure.to_string();
        assert!(text.starts_with("video file cam_b.mp4 failed at remux"));
        assert!(text.contains("Invalid data found"));

        let batch = IngestError::Batch {
            batch_id: Uuid::nil(),
            failures: vec![failure],
        };
        assert_eq!(batch.http_status_code(), 500);
        assert_eq!(batch.error_code(), "PROCESSING_FAILED");
        assert_eq!(batch.log_level(), LogLevel::Error);
    }

    #[test]
    fn upload_failures_map_to_bad_gateway() {
        let failure = FileFailure::upload(
            FileCategory::Background,
            "cam_x.png",
            &StorageError::UploadFailed("connection reset".to_string()),
        );
        let batch = IngestError::Batch {
            batch_id: Uuid::nil(),
            failures: vec![failure],
        };
        assert_eq!(batch.http_status_code(), 502);
        assert!(batch.is_recoverable());
        assert_eq!(batch.log_level(), LogLevel::Warn);
    }

    #[test]
    fn mixed_failures_are_not_recoverable() {
        let upload = FileFailure::upload(
            FileCategory::Video,
            "cam_1.ts",
            &StorageError::UploadFailed("timeout".to_string()),
        );
        let remux = FileFailure::transcode(
            "cam_2.mp4",
            &TranscodeError::Remux(ToolError::Exit {
                program: "ffmpeg".to_string(),
                status: "status 1".to_string(),
                stderr: "moov atom not found".to_string(),
            }),
        );
        let batch = IngestError::Batch {
            batch_id: Uuid::nil(),
            failures: vec![upload, remux],
        };
        assert!(!batch.is_recoverable());
        assert_eq!(batch.log_level(), LogLevel::Error);
    }
}
