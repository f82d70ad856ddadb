//! Vidcap Storage Library
//!
//! This crate provides the blob-store abstraction used by the ingestion pipeline and its
//! implementations for S3-compatible object stores and the local filesystem.
//!
//! # Storage key format
//!
//! Every object written for a batch lives under the batch prefix:
//!
//! - **Transformed files**: `{prefix}/{batch_id}/{category}/{filename}`
//! - **Batch record**: `{prefix}/{batch_id}/batch.json`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
pub use vidcap_core::StorageBackend;
