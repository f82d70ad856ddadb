use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Destination category of a source file. Each category maps to exactly one storage
/// sub-path under the batch prefix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Video,
    Background,
    Calibration,
}

impl FileCategory {
    /// Storage sub-path segment for this category.
    pub fn storage_dir(&self) -> &'static str {
        match self {
            FileCategory::Video => "video",
            FileCategory::Background => "background",
            FileCategory::Calibration => "calibration",
        }
    }
}

impl Display for FileCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.storage_dir())
    }
}

/// A file as declared by the client when the batch was created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeclaredFile {
    pub filename: String,
    pub content_type: String,
    pub category: FileCategory,
}

/// A transformed file that has been written to the blob store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredObject {
    pub category: FileCategory,
    /// 1-based camera index; `None` for the calibration document.
    pub camera_index: Option<u32>,
    pub original_filename: String,
    pub filename: String,
    pub key: String,
    pub content_type: String,
    pub size_bytes: u64,
}
