//! Vidcap Processing Library
//!
//! This crate turns multi-camera capture uploads into stored, indexed artifacts: the GOP
//! index scanner and indexed-TS container, the ffmpeg-backed transcoder, frame extractor
//! and probe, and the upload orchestrator that drives them under a worker cap.

pub mod batch_store;
pub mod error;
pub mod gop;
pub mod indexed_ts;
pub mod tool;
pub mod traits;
pub mod upload;
pub mod video;

// Re-export commonly used types
pub use batch_store::{
    BatchRepository, InMemoryBatchRepository, RepositoryError, StorageBatchRepository,
};
pub use error::{FailureStage, FileFailure, IngestError};
pub use gop::{parse_frame_listing, GopEntry, GopIndex, GopScanner, ScanError};
pub use indexed_ts::{build_indexed_segment, encode_header, HeaderError, IndexedSegmentHeader};
pub use tool::ToolError;
pub use traits::{FfmpegToolchain, MediaToolchain};
pub use upload::{
    classify, content_type_for, Classification, ObjectUrl, OrchestratorConfig, SourceFile,
    UploadOrchestrator, UploadRequest,
};
pub use video::{
    ExtractionError, FrameExtractor, MediaTranscoder, ProbeError, TranscodeError, VideoProbe,
};
