use vidcap_core::models::BatchMetadata;
use vidcap_processing::{SourceFile, UploadRequest};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Fake PNG bytes that identify the file they were "extracted" from.
pub fn png_for(filename: &str) -> Vec<u8> {
    let mut png = PNG_SIGNATURE.to_vec();
    png.extend_from_slice(filename.as_bytes());
    png
}

/// Source file whose content is its own name, so stored bytes can be traced back.
pub fn source(filename: &str) -> SourceFile {
    SourceFile::new(filename, None, format!("content of {}", filename).into_bytes())
}

pub fn metadata() -> BatchMetadata {
    BatchMetadata {
        studio: "north-stage".to_string(),
        producer: "kim".to_string(),
        production: "pilot".to_string(),
        action: "take-3".to_string(),
    }
}

pub fn request(videos: &[&str], backgrounds: &[&str], calibration: &str) -> UploadRequest {
    UploadRequest {
        metadata: metadata(),
        videos: videos.iter().map(|n| source(n)).collect(),
        backgrounds: backgrounds.iter().map(|n| source(n)).collect(),
        calibration: source(calibration),
        camera_count: None,
    }
}
