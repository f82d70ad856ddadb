//! Data models for the ingestion pipeline
//!
//! Each sub-module represents one concern: the upload batch and its lifecycle, the
//! files a batch is made of, and the stream metadata recorded for a batch.

mod batch;
mod file;
mod video;

// Re-export all models for convenient imports
pub use batch::*;
pub use file::*;
pub use video::*;
