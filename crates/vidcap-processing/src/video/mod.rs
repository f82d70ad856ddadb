//! ffmpeg-backed video operations: indexed remux, still-frame extraction and probing.

pub mod extractor;
pub mod probe;
pub mod transcoder;

pub use extractor::{ExtractionError, FrameExtractor};
pub use probe::{ProbeError, VideoProbe};
pub use transcoder::{MediaTranscoder, TranscodeError};

use std::path::Path;

/// Lower-cased extension of `filename`, if it is a plain alphanumeric one.
pub(crate) fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
}
