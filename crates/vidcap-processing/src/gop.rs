//! GOP index scanner
//!
//! Runs the frame analysis tool over a transport stream and records where every
//! intra-coded frame starts. Frame numbers count every frame in decode order; only
//! I-frames appear in the resulting table.

use crate::tool::{resolve_program, run_tool, ToolError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// One random-access point: a frame number and the byte offset of its first packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GopEntry {
    pub frame_index: u32,
    pub offset: u64,
}

/// I-frame offsets of a stream, in stream order, plus its total frame count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GopIndex {
    pub entries: Vec<GopEntry>,
    pub frame_count: u32,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Source stream {0} does not exist")]
    SourceMissing(String),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Unparseable frame analysis output at line {line}: {content:?}")]
    Unparseable { line: usize, content: String },

    #[error("Stream has more frames than the index format can address")]
    TooManyFrames,
}

/// Parse `pkt_pos,pict_type` lines (ffprobe `csv=p=0` output) into a [`GopIndex`].
///
/// Blank lines are ignored. The byte position is only required for I-frames; other
/// frames may report `N/A`.
pub fn parse_frame_listing(listing: &str) -> Result<GopIndex, ScanError> {
    let mut entries = Vec::new();
    let mut frame_count: u32 = 0;

    for (line_no, line) in listing.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let unparseable = || ScanError::Unparseable {
            line: line_no + 1,
            content: line.to_string(),
        };

        let mut fields = line.split(',').map(str::trim);
        let pos = fields.next().ok_or_else(unparseable)?;
        let pict_type = fields.next().ok_or_else(unparseable)?;

        if pict_type == "I" {
            let offset = pos.parse::<u64>().map_err(|_| unparseable())?;
            entries.push(GopEntry {
                frame_index: frame_count,
                offset,
            });
        } else if pict_type.is_empty() {
            return Err(unparseable());
        }

        frame_count = frame_count
            .checked_add(1)
            .ok_or(ScanError::TooManyFrames)?;
    }

    Ok(GopIndex {
        entries,
        frame_count,
    })
}

/// ffprobe-backed scanner
#[derive(Debug, Clone)]
pub struct GopScanner {
    ffprobe_path: String,
    timeout: Option<Duration>,
}

impl GopScanner {
    pub fn new(ffprobe_path: String, timeout: Option<Duration>) -> Result<Self, ToolError> {
        Ok(Self {
            ffprobe_path: resolve_program(&ffprobe_path)?,
            timeout,
        })
    }

    /// Scan `stream_path`. The analysis tool runs with the file's directory as its
    /// working directory and sees only the file name.
    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffprobe",
        ffmpeg.operation = "frame-scan"
    ))]
    pub async fn scan(&self, stream_path: &Path) -> Result<GopIndex, ScanError> {
        let file_name = stream_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if file_name.is_empty() || !tokio::fs::try_exists(stream_path).await.unwrap_or(false) {
            return Err(ScanError::SourceMissing(file_name));
        }

        let workdir = stream_path.parent().unwrap_or_else(|| Path::new("."));
        let start = std::time::Instant::now();

        let output = run_tool(
            &self.ffprobe_path,
            &[
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "frame=pkt_pos,pict_type",
                "-of",
                "csv=p=0",
                &file_name,
            ],
            workdir,
            self.timeout,
        )
        .await?;

        let index = parse_frame_listing(&String::from_utf8_lossy(&output.stdout))?;

        tracing::info!(
            frame_count = index.frame_count,
            iframes = index.entries.len(),
            duration_ms = start.elapsed().as_millis(),
            "GOP scan completed"
        );

        Ok(index)
    }
}
