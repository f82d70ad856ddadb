//! Media transcoder: remux into MPEG-TS without re-encoding, then prepend the GOP index.

use crate::gop::{GopScanner, ScanError};
use crate::indexed_ts::{build_indexed_segment, HeaderError};
use crate::tool::{program_name, resolve_program, run_tool, scratch_dir, ToolError};
use bytes::Bytes;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use vidcap_core::ToolStage;

use super::extension_of;

/// Source container extensions the remux path accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "ts"];

const REMUX_OUTPUT: &str = "remux.ts";

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Unsupported source format {0:?}: only .mp4 and .ts can be remuxed")]
    UnsupportedFormat(String),

    #[error("Failed to prepare intermediate files: {0}")]
    Io(#[from] std::io::Error),

    #[error("Remux failed: {0}")]
    Remux(#[source] ToolError),

    #[error("Indexing failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Index header failed: {0}")]
    Header(#[from] HeaderError),
}

impl TranscodeError {
    /// Tool stage that failed, for diagnostics.
    pub fn stage(&self) -> ToolStage {
        match self {
            TranscodeError::UnsupportedFormat(_)
            | TranscodeError::Io(_)
            | TranscodeError::Remux(_) => ToolStage::Remux,
            TranscodeError::Scan(_) => ToolStage::FrameScan,
            TranscodeError::Header(_) => ToolStage::IndexHeader,
        }
    }
}

/// Converts mp4/ts uploads into indexed transport streams.
#[derive(Debug, Clone)]
pub struct MediaTranscoder {
    ffmpeg_path: String,
    scanner: GopScanner,
    remux_timeout: Option<Duration>,
    work_root: Option<PathBuf>,
}

impl MediaTranscoder {
    pub fn new(
        ffmpeg_path: String,
        scanner: GopScanner,
        remux_timeout: Option<Duration>,
    ) -> Result<Self, ToolError> {
        Ok(Self {
            ffmpeg_path: resolve_program(&ffmpeg_path)?,
            scanner,
            remux_timeout,
            work_root: None,
        })
    }

    /// Create scratch directories under `root` instead of the system temp dir.
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    /// Remux `data` (named `filename`) and return the indexed segment bytes.
    ///
    /// The extension check happens before any file is written or process spawned. All
    /// intermediate files live in a temporary directory removed on every return path.
    /// A remux that exits cleanly but writes to stderr is treated as failed.
    #[tracing::instrument(skip(self, data), fields(
        process.executable.name = "ffmpeg",
        ffmpeg.operation = "remux",
        size_bytes = data.len()
    ))]
    pub async fn transcode(&self, data: &[u8], filename: &str) -> Result<Bytes, TranscodeError> {
        let extension = extension_of(filename)
            .filter(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| TranscodeError::UnsupportedFormat(filename.to_string()))?;

        let start = std::time::Instant::now();
        let workdir = scratch_dir(self.work_root.as_deref())?;
        let source_name = format!("source.{}", extension);
        tokio::fs::write(workdir.path().join(&source_name), data).await?;

        let remux = run_tool(
            &self.ffmpeg_path,
            &[
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-i",
                &source_name,
                "-c",
                "copy",
                "-f",
                "mpegts",
                REMUX_OUTPUT,
            ],
            workdir.path(),
            self.remux_timeout,
        )
        .await
        .map_err(TranscodeError::Remux)?;
        if !remux.stderr.is_empty() {
            return Err(TranscodeError::Remux(ToolError::Diagnostics {
                program: program_name(&self.ffmpeg_path),
                stderr: remux.stderr,
            }));
        }

        let remux_path = workdir.path().join(REMUX_OUTPUT);
        let index = self.scanner.scan(&remux_path).await?;
        let payload = tokio::fs::read(&remux_path).await?;
        let segment = build_indexed_segment(&payload, &index)?;

        tracing::info!(
            input_bytes = data.len(),
            payload_bytes = payload.len(),
            output_bytes = segment.len(),
            iframes = index.entries.len(),
            frame_count = index.frame_count,
            duration_ms = start.elapsed().as_millis(),
            "Indexed transport stream built"
        );

        Ok(Bytes::from(segment))
    }
}
