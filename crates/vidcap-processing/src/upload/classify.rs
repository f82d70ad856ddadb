//! File classification and per-group planning
//!
//! [`classify`] decides a file's category from its name, then its declared MIME type.
//! The `plan_*` functions turn each group into an ordered list of [`PlannedFile`]s:
//! camera indices come from a lexical sort of the original filenames, done
//! independently per group and before any work is dispatched.

use vidcap_core::models::FileCategory;

use super::types::SourceFile;
use crate::error::IngestError;
use crate::video::extension_of;

/// Fixed stored name of the calibration document.
pub const CALIBRATION_FILENAME: &str = "calibration.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Video,
    Background,
    Calibration,
    Rejected(String),
}

/// Category of a file, by filename pattern first and declared MIME type second.
pub fn classify(filename: &str, content_type: Option<&str>) -> Classification {
    if let Some(extension) = extension_of(filename) {
        match extension.as_str() {
            "json" | "txt" => return Classification::Calibration,
            "png" => return Classification::Background,
            "mp4" | "ts" => {
                let name = filename.to_ascii_lowercase();
                return if name.starts_with("bg") || name.starts_with("background") {
                    Classification::Background
                } else {
                    Classification::Video
                };
            }
            _ => {}
        }
    }

    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    match mime.as_deref() {
        Some("application/json") | Some("text/plain") => Classification::Calibration,
        Some("image/png") => Classification::Background,
        Some("video/mp4") | Some("video/mp2t") => Classification::Video,
        other => Classification::Rejected(format!(
            "cannot determine the category of {} (content type {})",
            filename,
            other.unwrap_or("unknown")
        )),
    }
}

/// What happens to a file before it is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardAction {
    /// Remux into an indexed transport stream
    Transcode,
    /// Rasterize the first frame to PNG
    ExtractFrame,
    /// Upload the bytes as they are
    PassThrough,
}

#[derive(Debug, Clone)]
pub struct PlannedFile {
    pub category: FileCategory,
    pub camera_index: Option<u32>,
    pub action: ShardAction,
    pub target_filename: String,
    pub content_type: &'static str,
    pub source: SourceFile,
}

/// Content type stored for a target filename.
pub fn content_type_for(filename: &str) -> &'static str {
    match extension_of(filename).as_deref() {
        Some("ts") => "video/mp2t",
        Some("png") => "image/png",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

fn unsupported(category: FileCategory, filename: &str, accepted: &str) -> IngestError {
    IngestError::UnsupportedFormat {
        category,
        filename: filename.to_string(),
        reason: format!("accepted extensions are {}", accepted),
    }
}

/// Sort a video or background group by filename and assign 1-based camera indices.
pub fn plan_shards(
    category: FileCategory,
    mut files: Vec<SourceFile>,
) -> Result<Vec<PlannedFile>, IngestError> {
    files.sort_by(|a, b| a.filename.cmp(&b.filename));

    if let Some(pair) = files.windows(2).find(|w| w[0].filename == w[1].filename) {
        return Err(IngestError::InvalidRequest(format!(
            "duplicate {} filename {}",
            category, pair[0].filename
        )));
    }

    files
        .into_iter()
        .enumerate()
        .map(|(position, source)| {
            let camera_index = position as u32 + 1;
            let extension = extension_of(&source.filename);

            let (action, target_ext) = match (category, extension.as_deref()) {
                (FileCategory::Video, Some("mp4")) => (ShardAction::Transcode, "ts"),
                (FileCategory::Video, Some("ts")) => (ShardAction::PassThrough, "ts"),
                (FileCategory::Video, _) => {
                    return Err(unsupported(category, &source.filename, ".mp4, .ts"))
                }
                (FileCategory::Background, Some("mp4")) => (ShardAction::ExtractFrame, "png"),
                (FileCategory::Background, Some("png")) => (ShardAction::PassThrough, "png"),
                (FileCategory::Background, _) => {
                    return Err(unsupported(category, &source.filename, ".mp4, .png"))
                }
                (FileCategory::Calibration, _) => {
                    return Err(IngestError::InvalidRequest(
                        "calibration documents are not camera shards".to_string(),
                    ))
                }
            };

            let target_filename = format!("cam_{}.{}", camera_index, target_ext);
            Ok(PlannedFile {
                category,
                camera_index: Some(camera_index),
                action,
                content_type: content_type_for(&target_filename),
                target_filename,
                source,
            })
        })
        .collect()
}

/// The calibration document is stored under [`CALIBRATION_FILENAME`].
pub fn plan_calibration(source: SourceFile) -> Result<PlannedFile, IngestError> {
    match extension_of(&source.filename).as_deref() {
        Some("json") | Some("txt") => Ok(PlannedFile {
            category: FileCategory::Calibration,
            camera_index: None,
            action: ShardAction::PassThrough,
            target_filename: CALIBRATION_FILENAME.to_string(),
            content_type: content_type_for(CALIBRATION_FILENAME),
            source,
        }),
        _ => Err(unsupported(
            FileCategory::Calibration,
            &source.filename,
            ".json, .txt",
        )),
    }
}
