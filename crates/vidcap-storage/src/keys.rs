//! Shared key generation for storage backends.
//!
//! Key format: `{prefix}/{batch_id}/{category}/{filename}` for transformed files and
//! `{prefix}/{batch_id}/batch.json` for the batch record.

use uuid::Uuid;
use vidcap_core::models::FileCategory;

use crate::traits::{StorageError, StorageResult};

/// Filename of the persisted batch record inside the batch prefix.
pub const BATCH_RECORD_FILENAME: &str = "batch.json";

/// Reject keys that could escape the bucket or base directory.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid characters: {}",
            key
        )));
    }
    Ok(())
}

/// `{prefix}/{batch_id}`
pub fn batch_prefix(prefix: &str, batch_id: Uuid) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), batch_id)
}

/// `{prefix}/{batch_id}/{category}/{filename}`
pub fn object_key(prefix: &str, batch_id: Uuid, category: FileCategory, filename: &str) -> String {
    format!(
        "{}/{}/{}",
        batch_prefix(prefix, batch_id),
        category.storage_dir(),
        filename
    )
}

/// `{prefix}/{batch_id}/batch.json`
pub fn batch_record_key(prefix: &str, batch_id: Uuid) -> String {
    format!("{}/{}", batch_prefix(prefix, batch_id), BATCH_RECORD_FILENAME)
}
