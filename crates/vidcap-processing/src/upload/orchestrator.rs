//! Upload orchestration: plan → transform under a worker cap → upload → finalize the batch.
//!
//! Groups run one after another (video, then background, then calibration). Inside a
//! group every file is an independent task; a failing task never cancels its siblings,
//! and the group's failures are reported together once all of them have finished.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;
use vidcap_core::models::{BatchStatus, FileCategory, StoredObject, UploadBatch, VideoMetadata};
use vidcap_core::{Config, ToolStage};
use vidcap_storage::keys::{batch_prefix, object_key};
use vidcap_storage::Storage;

use super::classify::{plan_calibration, plan_shards, PlannedFile, ShardAction};
use super::types::UploadRequest;
use crate::batch_store::BatchRepository;
use crate::error::{FailureStage, FileFailure, IngestError};
use crate::traits::MediaToolchain;

/// Worker cap: `max(1, floor(parallelism * fraction))`.
pub fn compute_worker_count(parallelism: usize, fraction: f64) -> usize {
    ((parallelism as f64 * fraction).floor() as usize).max(1)
}

/// Config for upload orchestration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub storage_prefix: String,
    /// Explicit worker cap; computed from host parallelism when `None`.
    pub max_workers: Option<usize>,
    pub worker_fraction: f64,
    pub max_source_file_size_bytes: u64,
    pub presigned_url_expiry: Duration,
}

impl OrchestratorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            storage_prefix: config.storage_prefix.clone(),
            max_workers: config.max_concurrent_transforms,
            worker_fraction: config.transform_worker_fraction,
            max_source_file_size_bytes: config.max_source_file_size_bytes as u64,
            presigned_url_expiry: config.presigned_url_expiry(),
        }
    }

    /// Number of transform permits for one batch.
    pub fn worker_count(&self) -> usize {
        match self.max_workers {
            Some(n) => n.max(1),
            None => {
                let parallelism = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1);
                compute_worker_count(parallelism, self.worker_fraction)
            }
        }
    }
}

/// Presigned download link for one stored object.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectUrl {
    pub key: String,
    pub url: String,
}

/// Result of one file's transform-and-upload task.
struct FileOutcome {
    stored: StoredObject,
    metadata: Option<VideoMetadata>,
}

struct GroupOutcome {
    stored: Vec<StoredObject>,
    metadata: Option<VideoMetadata>,
    failures: Vec<FileFailure>,
}

/// Orchestrates batch ingestion against injected storage, batch records and toolchain.
pub struct UploadOrchestrator {
    storage: Arc<dyn Storage>,
    batches: Arc<dyn BatchRepository>,
    toolchain: Arc<dyn MediaToolchain>,
    config: OrchestratorConfig,
}

impl UploadOrchestrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        batches: Arc<dyn BatchRepository>,
        toolchain: Arc<dyn MediaToolchain>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            storage,
            batches,
            toolchain,
            config,
        }
    }

    /// Allocate a batch for `request` and persist it as `uploading`.
    pub async fn begin(&self, request: &UploadRequest) -> Result<UploadBatch, IngestError> {
        let id = Uuid::new_v4();
        let camera_count = request
            .camera_count
            .unwrap_or(request.videos.len() as u32);

        let batch = UploadBatch::new(
            id,
            request.metadata.clone(),
            camera_count,
            batch_prefix(&self.config.storage_prefix, id),
            request.declared_files(),
        );
        self.batches.insert(&batch).await?;

        tracing::info!(
            batch_id = %id,
            camera_count = camera_count,
            videos = request.videos.len(),
            backgrounds = request.backgrounds.len(),
            studio = %request.metadata.studio,
            production = %request.metadata.production,
            "Upload batch created"
        );

        Ok(batch)
    }

    /// Transform and store every file of `request` into `batch`.
    ///
    /// Returns the `ready` batch, or the error that moved it to `failed`.
    pub async fn run(
        &self,
        mut batch: UploadBatch,
        request: UploadRequest,
    ) -> Result<UploadBatch, IngestError> {
        let start = std::time::Instant::now();

        match self.process(&mut batch, request).await {
            Ok(()) => {
                batch.transition(BatchStatus::Ready)?;
                self.batches.update(&batch).await?;
                tracing::info!(
                    batch_id = %batch.id,
                    objects = batch.stored_objects.len(),
                    duration_ms = start.elapsed().as_millis(),
                    "Upload batch ready"
                );
                Ok(batch)
            }
            Err(err) => {
                tracing::error!(
                    batch_id = %batch.id,
                    error = %err,
                    duration_ms = start.elapsed().as_millis(),
                    "Upload batch failed"
                );
                if batch.fail(err.to_string()).is_ok() {
                    if let Err(persist_err) = self.batches.update(&batch).await {
                        tracing::error!(
                            batch_id = %batch.id,
                            error = %persist_err,
                            "Failed to persist failed batch status"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// [`begin`](Self::begin) followed by [`run`](Self::run).
    pub async fn ingest(&self, request: UploadRequest) -> Result<UploadBatch, IngestError> {
        let batch = self.begin(&request).await?;
        self.run(batch, request).await
    }

    fn validate(&self, batch: &UploadBatch, request: &UploadRequest) -> Result<(), IngestError> {
        if batch.camera_count == 0 {
            return Err(IngestError::InvalidRequest(
                "at least one camera is required".to_string(),
            ));
        }

        for (category, count) in [
            (FileCategory::Video, request.videos.len()),
            (FileCategory::Background, request.backgrounds.len()),
        ] {
            if count != batch.camera_count as usize {
                return Err(IngestError::InvalidRequest(format!(
                    "expected {} {} file(s) for {} camera(s), got {}",
                    batch.camera_count, category, batch.camera_count, count
                )));
            }
        }

        let limit = self.config.max_source_file_size_bytes;
        for file in request
            .videos
            .iter()
            .chain(request.backgrounds.iter())
            .chain(std::iter::once(&request.calibration))
        {
            if file.data.is_empty() {
                return Err(IngestError::InvalidRequest(format!(
                    "{} is empty",
                    file.filename
                )));
            }
            if file.size() > limit {
                return Err(IngestError::InvalidRequest(format!(
                    "{} is {} bytes, above the {} byte limit",
                    file.filename,
                    file.size(),
                    limit
                )));
            }
        }

        Ok(())
    }

    async fn process(
        &self,
        batch: &mut UploadBatch,
        request: UploadRequest,
    ) -> Result<(), IngestError> {
        self.validate(batch, &request)?;

        // Everything is planned before the first process is spawned.
        let videos = plan_shards(FileCategory::Video, request.videos)?;
        let backgrounds = plan_shards(FileCategory::Background, request.backgrounds)?;
        let calibration = plan_calibration(request.calibration)?;

        let worker_count = self.config.worker_count();
        let workers = Arc::new(Semaphore::new(worker_count));
        tracing::debug!(batch_id = %batch.id, worker_count = worker_count, "Transform workers allocated");

        for (category, plan) in [
            (FileCategory::Video, videos),
            (FileCategory::Background, backgrounds),
        ] {
            let outcome = self.run_group(batch.id, plan, &workers).await;
            batch.record_stored(outcome.stored);
            if outcome.metadata.is_some() {
                batch.video_metadata = outcome.metadata;
            }

            if !outcome.failures.is_empty() {
                return Err(IngestError::Batch {
                    batch_id: batch.id,
                    failures: outcome.failures,
                });
            }

            self.batches.update(batch).await?;
            tracing::info!(batch_id = %batch.id, category = %category, "Group stored");
        }

        let key = object_key(
            &self.config.storage_prefix,
            batch.id,
            FileCategory::Calibration,
            &calibration.target_filename,
        );
        let outcome = process_file(
            self.storage.clone(),
            self.toolchain.clone(),
            workers,
            key,
            calibration,
        )
        .await
        .map_err(|failure| IngestError::Batch {
            batch_id: batch.id,
            failures: vec![failure],
        })?;
        batch.record_stored([outcome.stored]);

        Ok(())
    }

    /// Run every file of one group concurrently and wait for all of them.
    async fn run_group(
        &self,
        batch_id: Uuid,
        plan: Vec<PlannedFile>,
        workers: &Arc<Semaphore>,
    ) -> GroupOutcome {
        let mut labels = Vec::with_capacity(plan.len());
        let mut handles = Vec::with_capacity(plan.len());

        for planned in plan {
            let key = object_key(
                &self.config.storage_prefix,
                batch_id,
                planned.category,
                &planned.target_filename,
            );
            labels.push((
                planned.category,
                planned.source.filename.clone(),
                planned.action,
            ));
            handles.push(tokio::spawn(process_file(
                self.storage.clone(),
                self.toolchain.clone(),
                workers.clone(),
                key,
                planned,
            )));
        }

        let mut outcome = GroupOutcome {
            stored: Vec::new(),
            metadata: None,
            failures: Vec::new(),
        };

        let results = futures::future::join_all(handles).await;
        for ((category, filename, action), joined) in labels.into_iter().zip(results) {
            match joined {
                Ok(Ok(done)) => {
                    if done.metadata.is_some() {
                        outcome.metadata = done.metadata;
                    }
                    outcome.stored.push(done.stored);
                }
                Ok(Err(failure)) => {
                    tracing::warn!(batch_id = %batch_id, failure = %failure, "File failed");
                    outcome.failures.push(failure);
                }
                Err(join_err) => {
                    tracing::error!(batch_id = %batch_id, filename = %filename, error = %join_err, "File task aborted");
                    outcome.failures.push(FileFailure {
                        category,
                        filename,
                        stage: stage_of(action),
                        message: format!("worker task aborted: {}", join_err),
                        diagnostic: None,
                    });
                }
            }
        }

        outcome.stored.sort_by_key(|s| s.camera_index);
        outcome
    }

    pub async fn batch(&self, id: Uuid) -> Result<UploadBatch, IngestError> {
        self.batches
            .get(id)
            .await?
            .ok_or(IngestError::NotFound(id))
    }

    /// Every object key stored under the batch prefix.
    pub async fn list_objects(&self, id: Uuid) -> Result<Vec<String>, IngestError> {
        let batch = self.batch(id).await?;
        Ok(self.storage.list(&batch.storage_prefix).await?)
    }

    /// Time-limited download URLs for every object the batch stored.
    pub async fn presigned_urls(&self, id: Uuid) -> Result<Vec<ObjectUrl>, IngestError> {
        let batch = self.batch(id).await?;
        let mut urls = Vec::with_capacity(batch.stored_objects.len());
        for object in &batch.stored_objects {
            let url = self
                .storage
                .get_presigned_url(&object.key, self.config.presigned_url_expiry)
                .await?;
            urls.push(ObjectUrl {
                key: object.key.clone(),
                url,
            });
        }
        Ok(urls)
    }

    /// Delete every object under the batch prefix, then the batch record.
    pub async fn discard(&self, id: Uuid) -> Result<usize, IngestError> {
        let batch = self.batch(id).await?;
        if batch.status == BatchStatus::Uploading {
            tracing::warn!(batch_id = %id, "Discarding a batch that never reached a terminal status");
        }

        let deleted = self.storage.delete_prefix(&batch.storage_prefix).await?;
        self.batches.delete(id).await?;

        tracing::info!(batch_id = %id, deleted = deleted, "Batch discarded");
        Ok(deleted)
    }
}

fn stage_of(action: ShardAction) -> FailureStage {
    match action {
        ShardAction::Transcode => FailureStage::Tool(ToolStage::Remux),
        ShardAction::ExtractFrame => FailureStage::Tool(ToolStage::FrameExtract),
        ShardAction::PassThrough => FailureStage::Upload,
    }
}

async fn acquire(
    workers: &Arc<Semaphore>,
    planned: &PlannedFile,
) -> Result<tokio::sync::OwnedSemaphorePermit, FileFailure> {
    workers
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| FileFailure {
            category: planned.category,
            filename: planned.source.filename.clone(),
            stage: stage_of(planned.action),
            message: format!("worker pool closed: {}", e),
            diagnostic: None,
        })
}

/// Transform one file (holding a worker permit only for the external process) and
/// upload the result.
async fn process_file(
    storage: Arc<dyn Storage>,
    toolchain: Arc<dyn MediaToolchain>,
    workers: Arc<Semaphore>,
    key: String,
    planned: PlannedFile,
) -> Result<FileOutcome, FileFailure> {
    let start = std::time::Instant::now();
    let source = &planned.source;

    let output = match planned.action {
        ShardAction::PassThrough => source.data.clone(),
        ShardAction::Transcode => {
            let _permit = acquire(&workers, &planned).await?;
            toolchain
                .transcode(&source.data, &source.filename)
                .await
                .map_err(|e| FileFailure::transcode(&source.filename, &e))?
        }
        ShardAction::ExtractFrame => {
            let _permit = acquire(&workers, &planned).await?;
            toolchain
                .extract_frame(&source.data, &source.filename, 0.0)
                .await
                .map_err(|e| FileFailure::extraction(&source.filename, &e))?
        }
    };

    // Camera 1's source video stands in for the batch's stream metadata.
    let metadata = if planned.category == FileCategory::Video && planned.camera_index == Some(1)
    {
        let _permit = acquire(&workers, &planned).await?;
        match toolchain.probe(&source.data, &source.filename).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!(
                    filename = %source.filename,
                    stage = %ToolStage::Probe,
                    error = %e,
                    "Video probe failed, continuing without metadata"
                );
                None
            }
        }
    } else {
        None
    };

    let size_bytes = output.len() as u64;
    storage
        .upload(&key, Vec::from(output), planned.content_type)
        .await
        .map_err(|e| FileFailure::upload(planned.category, &source.filename, &e))?;

    tracing::info!(
        category = %planned.category,
        camera_index = ?planned.camera_index,
        original_filename = %source.filename,
        key = %key,
        size_bytes = size_bytes,
        duration_ms = start.elapsed().as_millis(),
        "File stored"
    );

    Ok(FileOutcome {
        stored: StoredObject {
            category: planned.category,
            camera_index: planned.camera_index,
            original_filename: source.filename.clone(),
            filename: planned.target_filename.clone(),
            key,
            content_type: planned.content_type.to_string(),
            size_bytes,
        },
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_formula() {
        assert_eq!(compute_worker_count(1, 0.8), 1);
        assert_eq!(compute_worker_count(2, 0.8), 1);
        assert_eq!(compute_worker_count(5, 0.8), 4);
        assert_eq!(compute_worker_count(16, 0.8), 12);
        assert_eq!(compute_worker_count(0, 0.8), 1);
    }

    #[test]
    fn explicit_override_wins() {
        let config = OrchestratorConfig {
            storage_prefix: "uploads".to_string(),
            max_workers: Some(3),
            worker_fraction: 0.8,
            max_source_file_size_bytes: 1024,
            presigned_url_expiry: Duration::from_secs(60),
        };
        assert_eq!(config.worker_count(), 3);

        let computed = OrchestratorConfig {
            max_workers: None,
            ..config
        };
        assert!(computed.worker_count() >= 1);
    }

    #[test]
    fn uniquely_owned_output_becomes_the_upload_body_without_copying() {
        let segment = bytes::Bytes::from(vec![0x47u8; 4096]);
        let ptr = segment.as_ptr();

        let body = Vec::from(segment);
        assert_eq!(body.as_ptr(), ptr);
        assert_eq!(body.len(), 4096);
    }
}
