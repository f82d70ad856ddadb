//! Video probe - stream metadata through ffprobe's JSON output

use crate::tool::{resolve_program, run_tool, scratch_dir, ToolError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use vidcap_core::models::VideoMetadata;

use super::extension_of;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Failed to prepare temporary files: {0}")]
    Io(#[from] std::io::Error),

    #[error("Probe failed: {0}")]
    Tool(#[from] ToolError),

    #[error("Could not interpret probe output: {0}")]
    Parse(String),
}

/// Parse `num/den` (or a plain number) into frames per second.
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Interpret `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(stdout: &[u8]) -> Result<VideoMetadata, ProbeError> {
    let probe_data: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| ProbeError::Parse(format!("invalid JSON: {}", e)))?;

    let stream = probe_data["streams"]
        .as_array()
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s["codec_type"].as_str() == Some("video"))
        })
        .ok_or_else(|| ProbeError::Parse("no video stream found".to_string()))?;

    let format = &probe_data["format"];

    let duration = format["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    let width = stream["width"].as_u64().unwrap_or(0) as u32;
    let height = stream["height"].as_u64().unwrap_or(0) as u32;

    let frame_rate = stream["r_frame_rate"]
        .as_str()
        .and_then(parse_rate)
        .or_else(|| stream["avg_frame_rate"].as_str().and_then(parse_rate))
        .unwrap_or(0.0);

    let frame_count = if frame_rate > 0.0 && duration > 0.0 {
        (duration * frame_rate) as u64
    } else {
        0
    };

    let format_name = format["format_name"]
        .as_str()
        .and_then(|f| f.split(',').next())
        .unwrap_or("unknown")
        .to_string();

    Ok(VideoMetadata {
        duration,
        width,
        height,
        frame_rate,
        frame_count,
        format: format_name,
    })
}

#[derive(Debug, Clone)]
pub struct VideoProbe {
    ffprobe_path: String,
    timeout: Duration,
    work_root: Option<PathBuf>,
}

impl VideoProbe {
    pub fn new(ffprobe_path: String, timeout: Duration) -> Result<Self, ToolError> {
        Ok(Self {
            ffprobe_path: resolve_program(&ffprobe_path)?,
            timeout,
            work_root: None,
        })
    }

    /// Create scratch directories under `root` instead of the system temp dir.
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    #[tracing::instrument(skip(self, data), fields(
        process.executable.name = "ffprobe",
        ffmpeg.operation = "probe",
        size_bytes = data.len()
    ))]
    pub async fn probe(&self, data: &[u8], filename: &str) -> Result<VideoMetadata, ProbeError> {
        let start = std::time::Instant::now();
        let workdir = scratch_dir(self.work_root.as_deref())?;
        let source_name = format!(
            "source.{}",
            extension_of(filename).unwrap_or_else(|| "mp4".to_string())
        );
        tokio::fs::write(workdir.path().join(&source_name), data).await?;

        let output = run_tool(
            &self.ffprobe_path,
            &[
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
                &source_name,
            ],
            workdir.path(),
            Some(self.timeout),
        )
        .await?;

        let metadata = parse_probe_output(&output.stdout)?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            video_duration = metadata.duration,
            width = metadata.width,
            height = metadata.height,
            frame_rate = metadata.frame_rate,
            format = %metadata.format,
            "Video probe completed"
        );

        Ok(metadata)
    }
}
