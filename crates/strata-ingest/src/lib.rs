//! # strata-ingest
//!
//! Streaming-to-batch ingestion: one stream-trigger invocation's records are
//! decoded, normalized, encoded into a single Parquet file and published to
//! object storage under a wall-clock partition key.
//!
//! ## Stages
//!
//! - [`decoder`]: base64 + JSON object decode, per record, never fatal
//! - [`batch`]: ordered working set of decoded records
//! - [`normalize`]: batch-wide derived fields (`created_at`, `created_datetime`,
//!   `event_type`/`event_subtype`, `year`/`month`/`day`)
//! - [`encoder`]: Parquet artifact, staged in memory or a temporary file
//! - [`partition`]: `events/year=Y/month=M/day=D/YYYYMMDDHHMMSS.parquet`
//! - [`publisher`]: single unconditional put to the storage backend
//! - [`pipeline`]: sequencing and the terminal outcome
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata_core::MemoryBackend;
//! use strata_ingest::{IngestConfig, IngestPipeline, TriggerEvent};
//!
//! # async fn run(payload: &[u8]) -> serde_json::Result<()> {
//! let pipeline = IngestPipeline::new(
//!     IngestConfig::new("memory://"),
//!     Arc::new(MemoryBackend::new()),
//! );
//! let event = TriggerEvent::from_slice(payload)?;
//! let outcome = pipeline.run(&event).await;
//! println!("{} {}", outcome.status_code(), outcome.message());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod batch;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod partition;
pub mod pipeline;
pub mod publisher;
pub mod staging;
pub mod trigger;

pub use batch::{Batch, DecodedRecord, assemble};
pub use config::IngestConfig;
pub use decoder::{DecodeReport, RawPayload, decode, decode_all};
pub use encoder::{Artifact, ColumnarEncoder};
pub use error::{
    DecodeError, DecodeErrorKind, EncodingError, NormalizationError, PipelineError, PublishError,
};
pub use normalize::{EventParts, normalize, split_event_name};
pub use partition::{PartitionKey, PartitionRouter, route};
pub use pipeline::{IngestPipeline, InvocationResponse, Outcome, OutcomeKind};
pub use publisher::{ArtifactPublisher, PublishedArtifact};
pub use staging::StagingArea;
pub use trigger::{StreamRecord, TriggerEvent, TriggerRecord};
