//! Vidcap CLI: ingest multi-camera captures from local files and manage stored batches.
//!
//! Storage and tool paths come from the environment (see `Config::from_env`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;
use vidcap_cli::{init_tracing, load_source, load_sources, log_error, ErrorReport};
use vidcap_core::models::BatchMetadata;
use vidcap_core::Config;
use vidcap_processing::{
    FfmpegToolchain, IndexedSegmentHeader, IngestError, OrchestratorConfig, StorageBatchRepository,
    UploadOrchestrator, UploadRequest,
};
use vidcap_storage::create_storage;

#[derive(Parser)]
#[command(name = "vidcap", about = "Multi-camera capture ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one take: camera videos, background plates and a calibration file
    Ingest {
        /// Video shard files or directories of them
        #[arg(long, required = true, num_args = 1..)]
        video: Vec<PathBuf>,
        /// Background files or directories of them
        #[arg(long, required = true, num_args = 1..)]
        background: Vec<PathBuf>,
        /// Calibration document
        #[arg(long)]
        calibration: PathBuf,
        #[arg(long)]
        studio: String,
        #[arg(long)]
        producer: String,
        #[arg(long)]
        production: String,
        #[arg(long)]
        action: String,
        /// Expected number of cameras (defaults to the number of video shards)
        #[arg(long)]
        camera_count: Option<u32>,
    },
    /// Show a batch record
    Status {
        /// Batch UUID
        id: Uuid,
    },
    /// List stored object keys of a batch
    List {
        /// Batch UUID
        id: Uuid,
    },
    /// Print presigned download URLs for a batch's objects
    Urls {
        /// Batch UUID
        id: Uuid,
    },
    /// Delete a batch's objects and record
    Discard {
        /// Batch UUID
        id: Uuid,
    },
    /// Decode the index header of an indexed transport stream
    Inspect {
        /// Path to a .ts file produced by ingest
        file: PathBuf,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Print the machine-readable error, then hand it back for a non-zero exit.
fn report(err: IngestError) -> anyhow::Error {
    log_error(&err);
    if let Err(e) = print_json(&ErrorReport::from_error(&err)) {
        tracing::error!(error = %e, "Failed to print error report");
    }
    anyhow::Error::new(err)
}

async fn build_orchestrator() -> anyhow::Result<UploadOrchestrator> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let storage = create_storage(&config)
        .await
        .context("Failed to initialize storage backend")?;
    let batches = Arc::new(StorageBatchRepository::new(
        storage.clone(),
        config.storage_prefix.clone(),
    ));
    let toolchain =
        Arc::new(FfmpegToolchain::from_config(&config).context("Invalid ffmpeg configuration")?);

    Ok(UploadOrchestrator::new(
        storage,
        batches,
        toolchain,
        OrchestratorConfig::from_config(&config),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let header = IndexedSegmentHeader::parse(&bytes)
                .with_context(|| format!("{} is not an indexed segment", file.display()))?;
            print_json(&header)?;
        }
        Commands::Ingest {
            video,
            background,
            calibration,
            studio,
            producer,
            production,
            action,
            camera_count,
        } => {
            let request = UploadRequest {
                metadata: BatchMetadata {
                    studio,
                    producer,
                    production,
                    action,
                },
                videos: load_sources(&video)?,
                backgrounds: load_sources(&background)?,
                calibration: load_source(&calibration)?,
                camera_count,
            };

            let orchestrator = build_orchestrator().await?;
            let batch = orchestrator.begin(&request).await.map_err(report)?;
            tracing::info!(batch_id = %batch.id, "Batch created");

            let batch = orchestrator.run(batch, request).await.map_err(report)?;
            print_json(&batch)?;
        }
        Commands::Status { id } => {
            let orchestrator = build_orchestrator().await?;
            print_json(&orchestrator.batch(id).await.map_err(report)?)?;
        }
        Commands::List { id } => {
            let orchestrator = build_orchestrator().await?;
            print_json(&orchestrator.list_objects(id).await.map_err(report)?)?;
        }
        Commands::Urls { id } => {
            let orchestrator = build_orchestrator().await?;
            print_json(&orchestrator.presigned_urls(id).await.map_err(report)?)?;
        }
        Commands::Discard { id } => {
            let orchestrator = build_orchestrator().await?;
            let deleted = orchestrator.discard(id).await.map_err(report)?;
            print_json(&serde_json::json!({ "batch_id": id, "deleted_objects": deleted }))?;
        }
    }

    Ok(())
}
