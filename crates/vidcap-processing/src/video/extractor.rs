//! Frame extractor: decode one frame of any codec ffmpeg understands into a PNG.

use crate::tool::{resolve_program, run_tool, scratch_dir, ToolError};
use bytes::Bytes;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::extension_of;

const FRAME_OUTPUT: &str = "frame.png";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Invalid timestamp {0}: must be a finite number of seconds >= 0")]
    InvalidTimestamp(f64),

    #[error("Failed to prepare temporary files: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame extraction failed: {0}")]
    Tool(#[from] ToolError),

    #[error("Decoder exited successfully but produced no frame")]
    MissingOutput,
}

#[derive(Debug, Clone)]
pub struct FrameExtractor {
    ffmpeg_path: String,
    timeout: Duration,
    work_root: Option<PathBuf>,
}

impl FrameExtractor {
    pub fn new(ffmpeg_path: String, timeout: Duration) -> Result<Self, ToolError> {
        Ok(Self {
            ffmpeg_path: resolve_program(&ffmpeg_path)?,
            timeout,
            work_root: None,
        })
    }

    /// Create scratch directories under `root` instead of the system temp dir.
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    /// Rasterize the frame at `timestamp` seconds of `data` into PNG bytes.
    #[tracing::instrument(skip(self, data), fields(
        process.executable.name = "ffmpeg",
        ffmpeg.operation = "frame-extract",
        size_bytes = data.len()
    ))]
    pub async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        timestamp: f64,
    ) -> Result<Bytes, ExtractionError> {
        if !timestamp.is_finite() || timestamp < 0.0 {
            return Err(ExtractionError::InvalidTimestamp(timestamp));
        }

        let start = std::time::Instant::now();
        let workdir = scratch_dir(self.work_root.as_deref())?;
        let source_name = format!(
            "source.{}",
            extension_of(filename).unwrap_or_else(|| "mp4".to_string())
        );
        tokio::fs::write(workdir.path().join(&source_name), data).await?;

        let seek = format!("{:.3}", timestamp);
        run_tool(
            &self.ffmpeg_path,
            &[
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-ss",
                &seek,
                "-i",
                &source_name,
                "-frames:v",
                "1",
                "-q:v",
                "2",
                FRAME_OUTPUT,
            ],
            workdir.path(),
            Some(self.timeout),
        )
        .await?;

        let frame = match tokio::fs::read(workdir.path().join(FRAME_OUTPUT)).await {
            Ok(frame) if !frame.is_empty() => frame,
            Ok(_) => return Err(ExtractionError::MissingOutput),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExtractionError::MissingOutput)
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            timestamp = timestamp,
            output_bytes = frame.len(),
            duration_ms = start.elapsed().as_millis(),
            "Frame extracted"
        );

        Ok(Bytes::from(frame))
    }
}
