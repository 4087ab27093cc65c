//! Pipeline orchestration.
//!
//! ```text
//! decode all ─► empty? ─► NoData
//!                 │
//!                 ▼
//!            normalize ─► encode ─► route ─► publish ─► Success
//!                 └──────────┴──────────────────┴─────► ProcessingFailed / UploadFailed
//! ```
//!
//! Every stage failure is caught here and turned into a terminal [`Outcome`];
//! no stage is retried and nothing is published unless every stage succeeds.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use strata_core::observability::ingest_span;
use strata_core::{Clock, StorageBackend, SystemClock};
use tracing::Instrument as _;
use ulid::Ulid;

use crate::batch::{Batch, assemble};
use crate::config::IngestConfig;
use crate::decoder::decode_all;
use crate::encoder::ColumnarEncoder;
use crate::error::PipelineError;
use crate::metrics;
use crate::normalize::normalize;
use crate::partition::PartitionRouter;
use crate::publisher::{ArtifactPublisher, PublishedArtifact};
use crate::trigger::TriggerEvent;

/// Terminal state of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// Nothing decoded; no downstream stage ran.
    NoData,
    /// Artifact published.
    Success,
    /// Normalization or encoding failed.
    ProcessingFailed,
    /// Publishing failed.
    UploadFailed,
}

impl OutcomeKind {
    /// HTTP-style status code.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::NoData | Self::Success => 200,
            Self::ProcessingFailed | Self::UploadFailed => 500,
        }
    }

    /// Human-readable message returned to the caller.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NoData => "No data to process.",
            Self::Success => "Success!",
            Self::ProcessingFailed => "Error processing DataFrame.",
            Self::UploadFailed => "Error uploading file to S3.",
        }
    }

    /// Metric label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NoData => "no_data",
            Self::Success => "success",
            Self::ProcessingFailed => "processing_failed",
            Self::UploadFailed => "upload_failed",
        }
    }
}

impl From<&PipelineError> for OutcomeKind {
    fn from(err: &PipelineError) -> Self {
        match err {
            PipelineError::Normalization(_) | PipelineError::Encoding(_) => {
                Self::ProcessingFailed
            }
            PipelineError::Publish(_) => Self::UploadFailed,
        }
    }
}

/// Result of one invocation.
#[derive(Debug)]
pub struct Outcome {
    kind: OutcomeKind,
    decode_failures: usize,
    published: Option<PublishedArtifact>,
    failure: Option<PipelineError>,
}

impl Outcome {
    fn no_data(decode_failures: usize) -> Self {
        Self {
            kind: OutcomeKind::NoData,
            decode_failures,
            published: None,
            failure: None,
        }
    }

    fn success(decode_failures: usize, published: PublishedArtifact) -> Self {
        Self {
            kind: OutcomeKind::Success,
            decode_failures,
            published: Some(published),
            failure: None,
        }
    }

    fn failed(decode_failures: usize, failure: PipelineError) -> Self {
        Self {
            kind: OutcomeKind::from(&failure),
            decode_failures,
            published: None,
            failure: Some(failure),
        }
    }

    /// Terminal state.
    #[must_use]
    pub fn kind(&self) -> OutcomeKind {
        self.kind
    }

    /// Status code (200 or 500).
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    /// Caller-facing message.
    #[must_use]
    pub fn message(&self) -> &'static str {
        self.kind.message()
    }

    /// True for both 200 outcomes.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code() == 200
    }

    /// Number of records dropped by the decoder.
    #[must_use]
    pub fn decode_failures(&self) -> usize {
        self.decode_failures
    }

    /// The published artifact, on success.
    #[must_use]
    pub fn published(&self) -> Option<&PublishedArtifact> {
        self.published.as_ref()
    }

    /// The stage failure, on a 500 outcome.
    #[must_use]
    pub fn failure(&self) -> Option<&PipelineError> {
        self.failure.as_ref()
    }

    /// Renders the handler response envelope.
    #[must_use]
    pub fn to_response(&self) -> InvocationResponse {
        InvocationResponse {
            status_code: self.status_code(),
            body: serde_json::Value::from(self.message()).to_string(),
        }
    }
}

/// Response envelope: `{"statusCode": 200, "body": "\"Success!\""}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationResponse {
    /// Status code.
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// JSON-encoded message string.
    pub body: String,
}

/// The record-batch transform pipeline.
#[derive(Clone)]
pub struct IngestPipeline {
    config: IngestConfig,
    encoder: ColumnarEncoder,
    router: PartitionRouter,
    publisher: ArtifactPublisher,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for IngestPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestPipeline")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl IngestPipeline {
    /// Creates a pipeline publishing to `backend` with the system clock.
    #[must_use]
    pub fn new(config: IngestConfig, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            encoder: ColumnarEncoder::new(config.staging.clone()),
            router: PartitionRouter::new(&config.key_prefix),
            publisher: ArtifactPublisher::new(backend),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replaces the clock used for partition routing.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Runs one invocation to a terminal outcome. Never panics on bad input.
    pub async fn run(&self, event: &TriggerEvent) -> Outcome {
        let invocation_id = Ulid::new().to_string();
        let span = ingest_span(&invocation_id, event.len());
        let started = Instant::now();

        let outcome = self.run_stages(event).instrument(span).await;

        metrics::record_outcome(outcome.kind().label(), started.elapsed().as_secs_f64());
        outcome
    }

    async fn run_stages(&self, event: &TriggerEvent) -> Outcome {
        let report = decode_all(event);
        let decode_failures = report.failures.len();

        let batch = assemble(report.records);
        if batch.is_empty() {
            tracing::info!("No data to process.");
            return Outcome::no_data(decode_failures);
        }

        match self.process(batch).await {
            Ok(published) => {
                metrics::record_artifact(published.size_bytes);
                tracing::info!(
                    bucket = %self.config.bucket,
                    key = %published.key,
                    rows = published.row_count,
                    size_bytes = published.size_bytes,
                    "successfully uploaded to storage"
                );
                Outcome::success(decode_failures, published)
            }
            Err(err) => {
                match &err {
                    PipelineError::Publish(_) => {
                        tracing::error!(bucket = %self.config.bucket, error = %err, "Error uploading file to storage");
                    }
                    _ => tracing::error!(error = %err, "Error processing batch"),
                }
                Outcome::failed(decode_failures, err)
            }
        }
    }

    async fn process(&self, batch: Batch) -> Result<PublishedArtifact, PipelineError> {
        let batch = normalize(batch)?;
        let artifact = self.encoder.encode(&batch)?;
        tracing::info!(
            rows = artifact.row_count(),
            size_bytes = artifact.size_bytes(),
            "successfully converted to parquet"
        );

        let key = self.router.route(self.clock.now());
        let published = self.publisher.publish(&artifact, &key).await?;
        Ok(published)
    }
}
