//! Error types for each pipeline boundary.
//!
//! `DecodeError` is per-record and never fatal. The remaining errors are
//! batch-fatal and end the invocation; see [`PipelineError`].

use thiserror::Error;

/// Why a single payload could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeErrorKind {
    /// The payload is not valid base64.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The unwrapped bytes are not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON document is valid but not an object.
    #[error("expected a JSON object, found {found}")]
    NotAnObject {
        /// JSON type that was found instead.
        found: &'static str,
    },
}

/// A payload that was dropped from the batch.
#[derive(Debug, Error)]
#[error("record {position} ({}): {kind}", .record_id.as_deref().unwrap_or("unidentified"))]
pub struct DecodeError {
    /// Position of the record in the trigger envelope.
    pub position: usize,
    /// Source-assigned record identity, when the envelope carries one.
    pub record_id: Option<String>,
    /// Underlying cause.
    #[source]
    pub kind: DecodeErrorKind,
}

/// Batch-wide derivation of normalized fields failed.
#[derive(Debug, Error)]
pub enum NormalizationError {
    /// A record has no `created_at` field.
    #[error("record {position} has no created_at field")]
    MissingTimestamp {
        /// Position of the record in the batch.
        position: usize,
    },

    /// A record's `created_at` is not a number.
    #[error("record {position} has non-numeric created_at: {found}")]
    NonNumericTimestamp {
        /// Position of the record in the batch.
        position: usize,
        /// Rendering of the offending value.
        found: String,
    },

    /// A record's `created_at` is outside the representable range.
    #[error("record {position} has out-of-range created_at: {value}")]
    TimestampOutOfRange {
        /// Position of the record in the batch.
        position: usize,
        /// Rendering of the offending value.
        value: String,
    },

    /// `event_name` holds only non-text values and cannot be split.
    #[error("event_name column holds no text values and cannot be split")]
    EventNameNotText,
}

/// The normalized batch could not be serialized into a columnar artifact.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// There are no records to encode.
    #[error("cannot encode an empty batch")]
    EmptyBatch,

    /// Records do not form a table (conflicting field shapes).
    #[error("batch is not tabular: {message}")]
    NotTabular {
        /// Description of the conflict.
        message: String,
    },

    /// The Parquet writer failed.
    #[error("parquet error: {message}")]
    Parquet {
        /// Description of the writer failure.
        message: String,
    },

    /// The local staging area could not be used.
    #[error("staging error: {0}")]
    Staging(#[from] std::io::Error),
}

/// The artifact could not be transferred to durable storage.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The staged artifact could not be read back.
    #[error("failed to read staged artifact: {0}")]
    Staging(#[from] std::io::Error),

    /// The storage backend rejected the write.
    #[error("failed to store artifact at {key}: {source}")]
    Storage {
        /// Destination key.
        key: String,
        /// Backend failure.
        #[source]
        source: strata_core::Error,
    },
}

/// A batch-fatal failure that ends the invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Normalization failed.
    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    /// Encoding failed.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Publishing failed.
    #[error(transparent)]
    Publish(#[from] PublishError),
}
