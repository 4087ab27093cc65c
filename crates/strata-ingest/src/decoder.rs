//! Record decoding: base64 unwrap, then JSON object parse.
//!
//! Failures are returned as values and never abort the batch.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use crate::batch::DecodedRecord;
use crate::error::{DecodeError, DecodeErrorKind};
use crate::metrics;
use crate::trigger::TriggerEvent;

/// One opaque payload as delivered by the event source.
#[derive(Debug, Clone, Copy)]
pub struct RawPayload<'a> {
    /// Position of the record in the envelope.
    pub position: usize,
    /// Source-assigned identity, if any.
    pub record_id: Option<&'a str>,
    /// Base64 text of the payload.
    pub data: &'a [u8],
}

/// Result of decoding every record in an envelope.
#[derive(Debug, Default)]
pub struct DecodeReport {
    /// Successfully decoded records, in arrival order.
    pub records: Vec<DecodedRecord>,
    /// Records that were dropped.
    pub failures: Vec<DecodeError>,
}

/// Decodes one payload into a record.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the payload is not base64, not JSON, or not a
/// JSON object.
pub fn decode(raw: &RawPayload<'_>) -> Result<DecodedRecord, DecodeError> {
    decode_inner(raw.data).map_err(|kind| DecodeError {
        position: raw.position,
        record_id: raw.record_id.map(str::to_string),
        kind,
    })
}

fn decode_inner(data: &[u8]) -> Result<DecodedRecord, DecodeErrorKind> {
    let bytes = STANDARD.decode(data)?;
    match serde_json::from_slice::<Value>(&bytes)? {
        Value::Object(fields) => Ok(DecodedRecord::new(fields)),
        other => Err(DecodeErrorKind::NotAnObject {
            found: json_type_name(&other),
        }),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Decodes every record in the envelope, logging and dropping failures.
pub fn decode_all(event: &TriggerEvent) -> DecodeReport {
    let mut report = DecodeReport::default();

    for (position, record) in event.records.iter().enumerate() {
        let raw = RawPayload {
            position,
            record_id: record.identity(),
            data: record.kinesis.data.as_bytes(),
        };
        match decode(&raw) {
            Ok(decoded) => {
                tracing::debug!(position, "successfully decoded data");
                report.records.push(decoded);
            }
            Err(err) => {
                tracing::error!(
                    position = err.position,
                    record_id = err.record_id.as_deref().unwrap_or_default(),
                    error = %err.kind,
                    "Error decoding record"
                );
                report.failures.push(err);
            }
        }
    }

    metrics::record_decoded(report.records.len(), report.failures.len());
    tracing::info!(
        decoded = report.records.len(),
        rejected = report.failures.len(),
        "decoded trigger records"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(data: &str) -> RawPayload<'_> {
        RawPayload {
            position: 7,
            record_id: Some("evt-7"),
            data: data.as_bytes(),
        }
    }

    #[test]
    fn decodes_object_payload() {
        let data = STANDARD.encode(r#"{"created_at": 1700000000, "event_name": "user:login"}"#);
        let record = decode(&payload(&data)).expect("decodes");

        assert_eq!(record.get("created_at"), Some(&json!(1_700_000_000)));
        assert_eq!(record.get("event_name"), Some(&json!("user:login")));
    }

    #[test]
    fn rejects_bad_base64() {
        let err = decode(&payload("not base64!!")).unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::Base64(_)));
        assert_eq!(err.position, 7);
        assert_eq!(err.record_id.as_deref(), Some("evt-7"));
    }

    #[test]
    fn rejects_bad_json() {
        let data = STANDARD.encode("{\"created_at\": ");
        let err = decode(&payload(&data)).unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::Json(_)));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let data = STANDARD.encode([0xff, 0xfe, 0x7b]);
        let err = decode(&payload(&data)).unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::Json(_)));
    }

    #[test]
    fn rejects_non_object_json() {
        for (doc, found) in [("[1,2]", "array"), ("42", "number"), ("\"x\"", "string")] {
            let data = STANDARD.encode(doc);
            let err = decode(&payload(&data)).unwrap_err();
            assert!(
                matches!(err.kind, DecodeErrorKind::NotAnObject { found: f } if f == found),
                "{doc} should be rejected as {found}"
            );
        }
    }

    #[test]
    fn decode_all_keeps_order_and_drops_failures() {
        let event: TriggerEvent = serde_json::from_value(json!({
            "Records": [
                {"kinesis": {"data": STANDARD.encode(r#"{"n": 1}"#)}},
                {"eventID": "bad", "kinesis": {"data": "%%%"}},
                {"kinesis": {"data": STANDARD.encode(r#"{"n": 2}"#)}},
            ]
        }))
        .expect("valid envelope");

        let report = decode_all(&event);

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].get("n"), Some(&json!(1)));
        assert_eq!(report.records[1].get("n"), Some(&json!(2)));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].position, 1);
        assert_eq!(report.failures[0].record_id.as_deref(), Some("bad"));
    }
}
