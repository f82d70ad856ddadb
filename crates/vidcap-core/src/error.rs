//! Error vocabulary module
//!
//! Concrete error enums live next to the code that raises them (storage errors in
//! `vidcap-storage`, tool and ingestion errors in `vidcap-processing`). This module holds
//! what they share: the `ErrorMetadata` trait that lets an error describe how it should be
//! presented to a caller, and the `ToolStage` names used in diagnostics.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like rejected input
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP-equivalent response characteristics
pub trait ErrorMetadata {
    /// HTTP-equivalent status code
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "UNSUPPORTED_FORMAT")
    fn error_code(&self) -> &'static str;

    /// Whether retrying the same request may succeed
    fn is_recoverable(&self) -> bool;

    /// Client-facing message
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// External tool stage that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolStage {
    /// Container remux into an elementary transport stream
    Remux,
    /// Per-frame picture type / byte position analysis
    FrameScan,
    /// Serialization of the index header
    IndexHeader,
    /// Decode-and-rasterize of a single still frame
    FrameExtract,
    /// Stream metadata probe
    Probe,
}

impl Display for ToolStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ToolStage::Remux => write!(f, "remux"),
            ToolStage::FrameScan => write!(f, "frame-scan"),
            ToolStage::IndexHeader => write!(f, "index-header"),
            ToolStage::FrameExtract => write!(f, "frame-extract"),
            ToolStage::Probe => write!(f, "probe"),
        }
    }
}
