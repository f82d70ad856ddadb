use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use vidcap_core::{ErrorMetadata, LogLevel};
use vidcap_processing::{content_type_for, FileFailure, IngestError, SourceFile};

/// Initialize tracing for CLI binaries. `LOG_FORMAT=json` selects the JSON formatter.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Machine-readable form of a failed command, printed to stdout.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub error_code: &'static str,
    pub status: u16,
    pub message: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FileFailure>,
}

impl ErrorReport {
    pub fn from_error(err: &IngestError) -> Self {
        let (batch_id, failures) = match err {
            IngestError::Batch { batch_id, failures } => (Some(*batch_id), failures.clone()),
            _ => (None, Vec::new()),
        };
        Self {
            error_code: err.error_code(),
            status: err.http_status_code(),
            message: err.client_message(),
            recoverable: err.is_recoverable(),
            batch_id,
            failures,
        }
    }
}

/// Log an ingest error at the level its metadata asks for.
pub fn log_error(err: &IngestError) {
    let code = err.error_code();
    let recoverable = err.is_recoverable();
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(error = %err, error_code = code, "Request rejected"),
        LogLevel::Warn => tracing::warn!(
            error = %err,
            error_code = code,
            recoverable,
            "Command failed, retry may succeed"
        ),
        LogLevel::Error => tracing::error!(error = %err, error_code = code, "Command failed"),
    }
}

/// Replace each directory with the regular files directly inside it, sorted by name.
/// Plain file arguments are kept in the order given. Hidden entries are skipped.
pub fn expand_paths(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let meta = std::fs::metadata(path)
            .with_context(|| format!("Cannot access {}", path.display()))?;
        if !meta.is_dir() {
            files.push(path.clone());
            continue;
        }

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)
            .with_context(|| format!("Cannot read directory {}", path.display()))?
        {
            let entry = entry?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !hidden && entry.file_type()?.is_file() {
                entries.push(entry.path());
            }
        }
        entries.sort();
        files.extend(entries);
    }
    Ok(files)
}

/// Read a local file into a [`SourceFile`], guessing its content type from the extension.
pub fn load_source(path: &Path) -> anyhow::Result<SourceFile> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?;
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let content_type = match content_type_for(filename) {
        "application/octet-stream" => None,
        known => Some(known.to_string()),
    };
    Ok(SourceFile::new(filename, content_type, data))
}

/// Load every file named by `paths`, expanding directories.
pub fn load_sources(paths: &[PathBuf]) -> anyhow::Result<Vec<SourceFile>> {
    expand_paths(paths)?
        .iter()
        .map(|p| load_source(p))
        .collect()
}
