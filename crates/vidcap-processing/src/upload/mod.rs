//! Batch ingestion: request types, classification and the orchestrator.

pub mod classify;
pub mod orchestrator;
pub mod types;

pub use classify::{
    classify, content_type_for, plan_calibration, plan_shards, Classification, PlannedFile,
    ShardAction, CALIBRATION_FILENAME,
};
pub use orchestrator::{compute_worker_count, ObjectUrl, OrchestratorConfig, UploadOrchestrator};
pub use types::{SourceFile, UploadRequest};
