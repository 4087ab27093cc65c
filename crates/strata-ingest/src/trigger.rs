//! Inbound stream-trigger envelope.
//!
//! The event source delivers `{"Records": [{"kinesis": {"data": "<base64>"}}]}`.
//! Only `data` is required; identity fields are kept for error reporting.

use serde::Deserialize;

/// One trigger invocation's payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerEvent {
    /// Records in arrival order.
    #[serde(rename = "Records", default)]
    pub records: Vec<TriggerRecord>,
}

/// A single record wrapper in the envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerRecord {
    /// Source-assigned event identifier.
    #[serde(rename = "eventID", default)]
    pub event_id: Option<String>,
    /// Stream-level record.
    pub kinesis: StreamRecord,
}

/// Stream-level record fields.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamRecord {
    /// Base64-encoded payload.
    pub data: String,
    /// Partition key the producer used.
    #[serde(rename = "partitionKey", default)]
    pub partition_key: Option<String>,
    /// Sequence number within the shard.
    #[serde(rename = "sequenceNumber", default)]
    pub sequence_number: Option<String>,
}

impl TriggerEvent {
    /// Parses an envelope from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid envelope.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Returns the number of records in the envelope.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the envelope carries no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl TriggerRecord {
    /// Identity used when reporting a failure for this record.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.event_id
            .as_deref()
            .or(self.kinesis.sequence_number.as_deref())
    }
}
