//! # strata-ingest
//!
//! Runs one ingestion invocation: reads a stream-trigger payload, publishes
//! the resulting Parquet artifact and prints the handler response.
//!
//! ## Usage
//!
//! ```bash
//! # Payload from a file
//! STRATA_STORAGE_BUCKET=s3://events-raw strata-ingest --event trigger.json
//!
//! # Payload from stdin, staged on local disk, JSON logs
//! cat trigger.json | strata-ingest --storage-bucket file:///data/lake \
//!     --staging-dir /tmp --log-format json
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use tokio::io::AsyncReadExt as _;

use strata_core::observability::{LogFormat, init_logging};
use strata_core::storage::{ObjectStoreBackend, StorageBackend};
use strata_ingest::partition::DEFAULT_KEY_PREFIX;
use strata_ingest::{IngestConfig, IngestPipeline, TriggerEvent, metrics};

/// Stream-trigger to Parquet ingestion.
#[derive(Debug, Parser)]
#[command(name = "strata-ingest")]
#[command(about = "Publishes one trigger batch as a partitioned Parquet artifact")]
#[command(version)]
struct Args {
    /// Object storage bucket (e.g. `events-raw`, `s3://events-raw`, `gs://events-raw`, `file:///data`).
    #[arg(long, env = "STRATA_STORAGE_BUCKET")]
    storage_bucket: String,

    /// Top-level key prefix for artifacts.
    #[arg(long, env = "STRATA_KEY_PREFIX", default_value = DEFAULT_KEY_PREFIX)]
    key_prefix: String,

    /// Directory for staging the artifact on disk (defaults to memory).
    #[arg(long, env = "STRATA_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Log output format (`json` or `pretty`).
    #[arg(long, env = "STRATA_LOG_FORMAT", default_value = "pretty")]
    log_format: String,

    /// Trigger payload file; reads stdin when omitted or `-`.
    #[arg(long, short)]
    event: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> IngestConfig {
        let config =
            IngestConfig::new(self.storage_bucket.clone()).with_key_prefix(self.key_prefix.clone());
        match &self.staging_dir {
            Some(dir) => config.with_staging_dir(dir.clone()),
            None => config,
        }
    }
}

async fn read_event(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read trigger payload {}", path.display())),
        _ => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("failed to read trigger payload from stdin")?;
            Ok(buf)
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(LogFormat::from_name(&args.log_format));
    metrics::register_metrics();

    let config = args.config();
    config.validate()?;

    let backend = ObjectStoreBackend::from_bucket(&config.bucket)?;
    tracing::info!(location = backend.location(), "storage backend ready");
    let backend: Arc<dyn StorageBackend> = Arc::new(backend);

    let payload = read_event(args.event.as_deref()).await?;
    let event = TriggerEvent::from_slice(&payload).context("invalid trigger payload")?;

    let pipeline = IngestPipeline::new(config, backend);
    let outcome = pipeline.run(&event).await;

    println!("{}", serde_json::to_string(&outcome.to_response())?);

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
