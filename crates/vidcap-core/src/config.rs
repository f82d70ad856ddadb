//! Configuration module
//!
//! Ingestion configuration is read once at process start from the environment (with
//! `.env` support), validated, and then passed by reference to the storage factory and
//! the orchestrator.

use std::env;
use std::time::Duration;

use crate::storage_types::StorageBackend;

const STORAGE_PREFIX: &str = "uploads";
const TRANSFORM_WORKER_FRACTION: f64 = 0.8;
const REMUX_TIMEOUT_SECS: u64 = 1800;
const EXTRACT_TIMEOUT_SECS: u64 = 60;
const PROBE_TIMEOUT_SECS: u64 = 30;
const MAX_SOURCE_FILE_SIZE_MB: usize = 8192;
const PRESIGNED_URL_EXPIRY_SECS: u64 = 3600;

/// Ingestion service configuration
#[derive(Clone, Debug)]
pub struct Config {
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    /// Leading segment of every object key: `<prefix>/<batch-uuid>/<category>/<filename>`
    pub storage_prefix: String,
    // External toolchain
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Parent of the per-task scratch directories; the system temp dir when unset.
    pub work_dir: Option<String>,
    // Transform scheduling
    pub max_concurrent_transforms: Option<usize>,
    pub transform_worker_fraction: f64,
    /// 0 disables the remux timeout.
    pub remux_timeout_secs: u64,
    pub extract_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub max_source_file_size_bytes: usize,
    pub presigned_url_expiry_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::S3,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            local_storage_path: None,
            local_storage_base_url: None,
            storage_prefix: STORAGE_PREFIX.to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            work_dir: None,
            max_concurrent_transforms: None,
            transform_worker_fraction: TRANSFORM_WORKER_FRACTION,
            remux_timeout_secs: REMUX_TIMEOUT_SECS,
            extract_timeout_secs: EXTRACT_TIMEOUT_SECS,
            probe_timeout_secs: PROBE_TIMEOUT_SECS,
            max_source_file_size_bytes: MAX_SOURCE_FILE_SIZE_MB * 1024 * 1024,
            presigned_url_expiry_secs: PRESIGNED_URL_EXPIRY_SECS,
        }
    }
}

/// `None` when the byte count does not fit in `usize`.
fn megabytes_to_bytes(mb: usize) -> Option<usize> {
    mb.checked_mul(1024 * 1024)
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(s) => s.parse::<StorageBackend>()?,
            Err(_) => StorageBackend::S3,
        };

        let max_source_file_size_mb = env::var("MAX_SOURCE_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_SOURCE_FILE_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_SOURCE_FILE_SIZE_MB);
        let max_source_file_size_bytes = megabytes_to_bytes(max_source_file_size_mb)
            .ok_or_else(|| anyhow::anyhow!("MAX_SOURCE_FILE_SIZE_MB is too large"))?;

        let max_concurrent_transforms = match env::var("MAX_CONCURRENT_TRANSFORMS") {
            Ok(s) if !s.trim().is_empty() => Some(s.trim().parse::<usize>().map_err(|_| {
                anyhow::anyhow!("MAX_CONCURRENT_TRANSFORMS must be a positive integer")
            })?),
            _ => None,
        };

        let config = Config {
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok().filter(|s| !s.is_empty()),
            s3_region: env::var("S3_REGION").ok().filter(|s| !s.is_empty()),
            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            aws_region: env::var("AWS_REGION").ok().filter(|s| !s.is_empty()),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            storage_prefix: env::var("STORAGE_PREFIX")
                .unwrap_or_else(|_| STORAGE_PREFIX.to_string())
                .trim_matches('/')
                .to_string(),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
            work_dir: env::var("WORK_DIR").ok().filter(|s| !s.trim().is_empty()),
            max_concurrent_transforms,
            transform_worker_fraction: env::var("TRANSFORM_WORKER_FRACTION")
                .unwrap_or_else(|_| TRANSFORM_WORKER_FRACTION.to_string())
                .parse()
                .unwrap_or(TRANSFORM_WORKER_FRACTION),
            remux_timeout_secs: env::var("REMUX_TIMEOUT_SECS")
                .unwrap_or_else(|_| REMUX_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(REMUX_TIMEOUT_SECS),
            extract_timeout_secs: env::var("EXTRACT_TIMEOUT_SECS")
                .unwrap_or_else(|_| EXTRACT_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(EXTRACT_TIMEOUT_SECS),
            probe_timeout_secs: env::var("PROBE_TIMEOUT_SECS")
                .unwrap_or_else(|_| PROBE_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(PROBE_TIMEOUT_SECS),
            max_source_file_size_bytes,
            presigned_url_expiry_secs: env::var("PRESIGNED_URL_EXPIRY_SECS")
                .unwrap_or_else(|_| PRESIGNED_URL_EXPIRY_SECS.to_string())
                .parse()
                .unwrap_or(PRESIGNED_URL_EXPIRY_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn remux_timeout(&self) -> Option<Duration> {
        (self.remux_timeout_secs > 0).then(|| Duration::from_secs(self.remux_timeout_secs))
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.extract_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn presigned_url_expiry(&self) -> Duration {
        Duration::from_secs(self.presigned_url_expiry_secs)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.storage_prefix.is_empty() || self.storage_prefix.contains("..") {
            return Err(anyhow::anyhow!(
                "STORAGE_PREFIX must be a non-empty key prefix without '..'"
            ));
        }

        if !(self.transform_worker_fraction > 0.0 && self.transform_worker_fraction <= 1.0) {
            return Err(anyhow::anyhow!(
                "TRANSFORM_WORKER_FRACTION must be in the range (0, 1]"
            ));
        }

        if self.max_concurrent_transforms == Some(0) {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_TRANSFORMS must be at least 1 when set"
            ));
        }

        if self.extract_timeout_secs == 0 {
            return Err(anyhow::anyhow!("EXTRACT_TIMEOUT_SECS must be at least 1"));
        }

        if self.max_source_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_SOURCE_FILE_SIZE_MB must be at least 1"));
        }

        if self.ffmpeg_path.trim().is_empty() || self.ffprobe_path.trim().is_empty() {
            return Err(anyhow::anyhow!("FFMPEG_PATH and FFPROBE_PATH must not be empty"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}
