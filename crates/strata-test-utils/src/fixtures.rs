//! Fixture builders for stream-trigger envelopes.
//!
//! Fixtures produce plain JSON so tests exercise the same envelope parsing as
//! production invocations.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

/// Base64-encodes the JSON rendering of `payload`.
pub fn encode_payload(payload: &Value) -> String {
    STANDARD.encode(payload.to_string())
}

/// Builds a single envelope record carrying an already-encoded `data` field.
pub fn raw_record(position: usize, data: &str) -> Value {
    json!({
        "eventID": format!("shardId-000000000000:{position:056}"),
        "eventSource": "aws:kinesis",
        "kinesis": {
            "data": data,
            "partitionKey": format!("pk-{position}"),
            "sequenceNumber": format!("{:056}", 49_590_338_271_490_256_608_559_692_538_361_571_095_u128 + position as u128),
        }
    })
}

/// Builds an envelope with one record per JSON payload.
pub fn trigger_event(payloads: &[Value]) -> Value {
    let records: Vec<Value> = payloads
        .iter()
        .enumerate()
        .map(|(position, payload)| raw_record(position, &encode_payload(payload)))
        .collect();
    json!({ "Records": records })
}

/// Builds an envelope from pre-encoded `data` strings, including invalid ones.
pub fn trigger_event_raw(data: &[&str]) -> Value {
    let records: Vec<Value> = data
        .iter()
        .enumerate()
        .map(|(position, data)| raw_record(position, data))
        .collect();
    json!({ "Records": records })
}
