//! Types for the upload pipeline.

use bytes::Bytes;
use std::path::Path;
use vidcap_core::models::{BatchMetadata, DeclaredFile, FileCategory};

use super::classify::{classify, Classification};
use crate::error::IngestError;

/// One client-supplied file. The bytes are only held until the file is transformed.
#[derive(Clone, Debug)]
pub struct SourceFile {
    /// Base name only; any directory components supplied by the client are dropped.
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl SourceFile {
    pub fn new(filename: &str, content_type: Option<String>, data: impl Into<Bytes>) -> Self {
        let filename = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(filename)
            .to_string();
        Self {
            filename,
            content_type: content_type.filter(|ct| !ct.trim().is_empty()),
            data: data.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub(crate) fn declared(&self, category: FileCategory) -> DeclaredFile {
        DeclaredFile {
            filename: self.filename.clone(),
            content_type: self
                .content_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            category,
        }
    }
}

/// A complete ingestion request: metadata plus the three file groups.
#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub metadata: BatchMetadata,
    pub videos: Vec<SourceFile>,
    pub backgrounds: Vec<SourceFile>,
    pub calibration: SourceFile,
    /// Defaults to the number of video shards.
    pub camera_count: Option<u32>,
}

impl UploadRequest {
    /// Group an unsorted list of files by classifying each one.
    ///
    /// Exactly one calibration document is required; an unclassifiable file rejects
    /// the whole request.
    pub fn from_files(
        metadata: BatchMetadata,
        files: Vec<SourceFile>,
        camera_count: Option<u32>,
    ) -> Result<Self, IngestError> {
        let mut videos = Vec::new();
        let mut backgrounds = Vec::new();
        let mut calibrations = Vec::new();

        for file in files {
            match classify(&file.filename, file.content_type.as_deref()) {
                Classification::Video => videos.push(file),
                Classification::Background => backgrounds.push(file),
                Classification::Calibration => calibrations.push(file),
                Classification::Rejected(reason) => {
                    return Err(IngestError::InvalidRequest(reason));
                }
            }
        }

        if calibrations.len() != 1 {
            return Err(IngestError::InvalidRequest(format!(
                "exactly one calibration document is required, found {}",
                calibrations.len()
            )));
        }
        let calibration = calibrations.remove(0);

        Ok(Self {
            metadata,
            videos,
            backgrounds,
            calibration,
            camera_count,
        })
    }

    pub(crate) fn declared_files(&self) -> Vec<DeclaredFile> {
        self.videos
            .iter()
            .map(|f| f.declared(FileCategory::Video))
            .chain(
                self.backgrounds
                    .iter()
                    .map(|f| f.declared(FileCategory::Background)),
            )
            .chain(std::iter::once(
                self.calibration.declared(FileCategory::Calibration),
            ))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> SourceFile {
        SourceFile::new(name, None, b"x".to_vec())
    }

    #[test]
    fn source_file_keeps_only_base_name() {
        assert_eq!(file("../../etc/cam_1.mp4").filename, "cam_1.mp4");
        assert_eq!(file("shoot/day1/cam_2.mp4").filename, "cam_2.mp4");
    }

    #[test]
    fn groups_files_by_classification() {
        let request = UploadRequest::from_files(
            BatchMetadata::default(),
            vec![
                file("cam_1.mp4"),
                file("bg_1.mp4"),
                file("cam_2.ts"),
                file("cam_1.png"),
                file("rig.json"),
            ],
            None,
        )
        .unwrap();

        let names = |files: &[SourceFile]| {
            files
                .iter()
                .map(|f| f.filename.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&request.videos), vec!["cam_1.mp4", "cam_2.ts"]);
        assert_eq!(names(&request.backgrounds), vec!["bg_1.mp4", "cam_1.png"]);
        assert_eq!(request.calibration.filename, "rig.json");
        assert_eq!(request.declared_files().len(), 5);
    }

    #[test]
    fn requires_exactly_one_calibration() {
        let none = UploadRequest::from_files(BatchMetadata::default(), vec![file("a.mp4")], None);
        assert!(matches!(none, Err(IngestError::InvalidRequest(_))));

        let two = UploadRequest::from_files(
            BatchMetadata::default(),
            vec![file("a.json"), file("b.txt")],
            None,
        );
        assert!(matches!(two, Err(IngestError::InvalidRequest(_))));
    }

    #[test]
    fn unclassifiable_file_rejects_request() {
        let result = UploadRequest::from_files(
            BatchMetadata::default(),
            vec![file("notes.docx"), file("rig.json")],
            None,
        );
        assert!(matches!(result, Err(IngestError::InvalidRequest(r)) if r.contains("notes.docx")));
    }
}
