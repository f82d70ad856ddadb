pub mod fixtures;

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use vidcap_core::models::VideoMetadata;
use vidcap_processing::{
    build_indexed_segment, ExtractionError, GopEntry, GopIndex, MediaToolchain,
    OrchestratorConfig, ProbeError, StorageBatchRepository, ToolError, TranscodeError,
    UploadOrchestrator,
};
use vidcap_storage::{LocalStorage, Storage};

pub const BASE_URL: &str = "http://localhost:3000/media";

/// Toolchain double that records calls and the peak number of concurrent transforms.
#[derive(Default)]
pub struct MockToolchain {
    pub delay: Duration,
    pub failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockToolchain {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, filename: &str) -> Self {
        self.failing.insert(filename.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn work(&self, call: String) {
        self.calls.lock().unwrap().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn tool_failure(&self, filename: &str) -> Option<ToolError> {
        self.failing.contains(filename).then(|| ToolError::Exit {
            program: "ffmpeg".to_string(),
            status: "status 1".to_string(),
            stderr: "source.mp4: Invalid data found when processing input".to_string(),
        })
    }
}

#[async_trait]
impl MediaToolchain for MockToolchain {
    async fn transcode(&self, data: &[u8], filename: &str) -> Result<Bytes, TranscodeError> {
        self.work(format!("transcode:{}", filename)).await;
        if let Some(err) = self.tool_failure(filename) {
            return Err(TranscodeError::Remux(err));
        }
        let index = GopIndex {
            entries: vec![GopEntry {
                frame_index: 0,
                offset: 0,
            }],
            frame_count: 1,
        };
        Ok(Bytes::from(build_indexed_segment(data, &index)?))
    }

    async fn extract_frame(
        &self,
        _data: &[u8],
        filename: &str,
        _timestamp: f64,
    ) -> Result<Bytes, ExtractionError> {
        self.work(format!("extract:{}", filename)).await;
        if let Some(err) = self.tool_failure(filename) {
            return Err(ExtractionError::Tool(err));
        }
        Ok(Bytes::from(fixtures::png_for(filename)))
    }

    async fn probe(&self, _data: &[u8], filename: &str) -> Result<VideoMetadata, ProbeError> {
        self.calls.lock().unwrap().push(format!("probe:{}", filename));
        Ok(VideoMetadata {
            duration: 10.0,
            width: 1920,
            height: 1080,
            frame_rate: 30.0,
            frame_count: 300,
            format: "mov".to_string(),
        })
    }
}

pub struct TestEnv {
    _dir: TempDir,
    pub storage: Arc<LocalStorage>,
    pub toolchain: Arc<MockToolchain>,
    pub orchestrator: UploadOrchestrator,
}

pub async fn setup(toolchain: MockToolchain, max_workers: usize) -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(
        LocalStorage::new(dir.path(), BASE_URL.to_string())
            .await
            .unwrap(),
    );
    let toolchain = Arc::new(toolchain);
    let storage_dyn: Arc<dyn Storage> = storage.clone();

    let orchestrator = UploadOrchestrator::new(
        storage_dyn.clone(),
        Arc::new(StorageBatchRepository::new(storage_dyn, "uploads")),
        toolchain.clone(),
        OrchestratorConfig {
            storage_prefix: "uploads".to_string(),
            max_workers: Some(max_workers),
            worker_fraction: 0.8,
            max_source_file_size_bytes: 1024 * 1024,
            presigned_url_expiry: Duration::from_secs(600),
        },
    );

    TestEnv {
        _dir: dir,
        storage,
        toolchain,
        orchestrator,
    }
}
