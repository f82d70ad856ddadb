use serde::{Deserialize, Serialize};

/// Stream metadata of a source video, as reported by the probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoMetadata {
    /// Duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    /// Estimated as `duration * frame_rate`; 0 when either is unknown
    pub frame_count: u64,
    /// First container format name reported (e.g. "mov", "mpegts")
    pub format: String,
}
