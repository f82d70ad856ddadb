//! Core traits for media processing
//!
//! The orchestrator depends on [`MediaToolchain`] rather than on ffmpeg directly, so the
//! scheduling and failure handling can be exercised without the external tools.

use async_trait::async_trait;
use bytes::Bytes;
use vidcap_core::models::VideoMetadata;
use vidcap_core::Config;

use crate::gop::GopScanner;
use crate::tool::ToolError;
use crate::video::{
    ExtractionError, FrameExtractor, MediaTranscoder, ProbeError, TranscodeError, VideoProbe,
};

/// External-process backed media operations used during ingestion.
#[async_trait]
pub trait MediaToolchain: Send + Sync {
    /// Remux an mp4/ts upload into an indexed transport stream.
    async fn transcode(&self, data: &[u8], filename: &str) -> Result<Bytes, TranscodeError>;

    /// Rasterize the frame at `timestamp` seconds to PNG.
    async fn extract_frame(
        &self,
        data: &[u8],
        filename: &str,
        timestamp: f64,
    ) -> Result<Bytes, ExtractionError>;

    /// Read stream metadata.
    async fn probe(&self, data: &[u8], filename: &str) -> Result<VideoMetadata, ProbeError>;
}

/// ffmpeg/ffprobe implementation of [`MediaToolchain`].
#[derive(Debug, Clone)]
pub struct FfmpegToolchain {
    transcoder: MediaTranscoder,
    extractor: FrameExtractor,
    probe: VideoProbe,
}

impl FfmpegToolchain {
    pub fn new(transcoder: MediaTranscoder, extractor: FrameExtractor, probe: VideoProbe) -> Self {
        Self {
            transcoder,
            extractor,
            probe,
        }
    }

    /// Build from tool paths, timeouts and the scratch root in `config`.
    pub fn from_config(config: &Config) -> Result<Self, ToolError> {
        // The frame scan runs under the remux timeout.
        let scanner = GopScanner::new(config.ffprobe_path.clone(), config.remux_timeout())?;
        let mut transcoder =
            MediaTranscoder::new(config.ffmpeg_path.clone(), scanner, config.remux_timeout())?;
        let mut extractor =
            FrameExtractor::new(config.ffmpeg_path.clone(), config.extract_timeout())?;
        let mut probe = VideoProbe::new(config.ffprobe_path.clone(), config.probe_timeout())?;

        if let Some(root) = &config.work_dir {
            transcoder = transcoder.with_work_root(root);
            extractor = extractor.with_work_root(root);
            probe = probe.with_work_root(root);
        }

        Ok(Self::new(transcoder, extractor, probe))
    }
}

#[async_trait]
impl MediaToolchain for FfmpegToolchain {
    async fn transcode(&self, data: &[u8], filename: &str) -> Result<Bytes, TranscodeError> {
        self.transcoder.transcode(data, filename).await
    }

    async fn extract_frame(
        &self,
        data: &[u8],
        filename: &str,
        timestamp: f64,
    ) -> Result<Bytes, ExtractionError> {
        self.extractor.extract(data, filename, timestamp).await
    }

    async fn probe(&self, data: &[u8], filename: &str) -> Result<VideoMetadata, ProbeError> {
        self.probe.probe(data, filename).await
    }
}
