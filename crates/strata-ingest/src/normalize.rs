//! Batch-wide derivation of timestamp, partition and event-type fields.
//!
//! Every step runs over the whole batch before any record is touched: a
//! missing or non-numeric `created_at` in one record fails the batch. Whether
//! `event_name` is split is decided once for the batch, so records without the
//! field still receive null `event_type`/`event_subtype` when any record has it.

use chrono::{DateTime, Datelike as _, SecondsFormat, Timelike as _, Utc};
use serde_json::{Number, Value};

use crate::batch::{Batch, DecodedRecord};
use crate::error::NormalizationError;

/// Source epoch-seconds field, replaced by the parsed instant.
pub const CREATED_AT: &str = "created_at";
/// ISO-8601 rendering of `created_at`.
pub const CREATED_DATETIME: &str = "created_datetime";
/// Optional compound `type:subtype` field.
pub const EVENT_NAME: &str = "event_name";
/// First part of `event_name`.
pub const EVENT_TYPE: &str = "event_type";
/// Second part of `event_name`.
pub const EVENT_SUBTYPE: &str = "event_subtype";
/// UTC calendar year of `created_at`.
pub const YEAR: &str = "year";
/// UTC calendar month of `created_at`.
pub const MONTH: &str = "month";
/// UTC calendar day of `created_at`.
pub const DAY: &str = "day";

/// `event_name` split on `:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventParts {
    /// Text before the first delimiter (the whole value if there is none).
    pub event_type: String,
    /// Text between the first and second delimiter, if any.
    pub event_subtype: Option<String>,
}

/// Splits an event name into type and subtype.
///
/// Only the first two parts are kept: `"a:b:c"` yields `a` / `b`.
#[must_use]
pub fn split_event_name(name: &str) -> EventParts {
    let mut parts = name.split(':');
    EventParts {
        event_type: parts.next().unwrap_or_default().to_string(),
        event_subtype: parts.next().map(str::to_string),
    }
}

/// Adds the normalized field set to every record.
///
/// # Errors
///
/// Returns [`NormalizationError`] if any record lacks a numeric `created_at`,
/// or if `event_name` is present but holds no text values at all.
pub fn normalize(mut batch: Batch) -> Result<Batch, NormalizationError> {
    let instants = batch
        .records()
        .iter()
        .enumerate()
        .map(|(position, record)| parse_created_at(position, record.get(CREATED_AT)))
        .collect::<Result<Vec<_>, _>>()?;

    let event_parts = if batch.has_field(EVENT_NAME) {
        Some(split_event_names(batch.records())?)
    } else {
        None
    };

    for (position, (record, instant)) in batch
        .records_mut()
        .iter_mut()
        .zip(instants)
        .enumerate()
    {
        record.insert(
            CREATED_AT,
            Value::String(instant.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        record.insert(CREATED_DATETIME, Value::String(iso_datetime(instant)));

        if let Some(parts) = event_parts.as_ref().and_then(|all| all.get(position)) {
            let (event_type, event_subtype) = match parts {
                Some(parts) => (
                    Value::String(parts.event_type.clone()),
                    parts.event_subtype.clone().map_or(Value::Null, Value::String),
                ),
                None => (Value::Null, Value::Null),
            };
            record.insert(EVENT_TYPE, event_type);
            record.insert(EVENT_SUBTYPE, event_subtype);
        }

        record.insert(YEAR, Value::from(instant.year()));
        record.insert(MONTH, Value::from(instant.month()));
        record.insert(DAY, Value::from(instant.day()));
    }

    tracing::debug!(records = batch.len(), "normalized batch");
    Ok(batch)
}

fn parse_created_at(
    position: usize,
    value: Option<&Value>,
) -> Result<DateTime<Utc>, NormalizationError> {
    let value = value.ok_or(NormalizationError::MissingTimestamp { position })?;
    let Value::Number(number) = value else {
        return Err(NormalizationError::NonNumericTimestamp {
            position,
            found: value.to_string(),
        });
    };

    epoch_to_instant(number).ok_or_else(|| NormalizationError::TimestampOutOfRange {
        position,
        value: number.to_string(),
    })
}

fn epoch_to_instant(number: &Number) -> Option<DateTime<Utc>> {
    if let Some(secs) = number.as_i64() {
        return DateTime::from_timestamp(secs, 0);
    }
    if number.is_u64() {
        // Larger than i64::MAX seconds.
        return None;
    }
    let secs = number.as_f64()?;
    let micros = (secs * 1_000_000.0).round();
    if !micros.is_finite() || micros.abs() >= 9.0e18 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let micros = micros as i64;
    DateTime::from_timestamp_micros(micros)
}

/// Renders an instant the way a naive ISO-8601 timestamp prints: fractional
/// seconds appear only when present.
fn iso_datetime(instant: DateTime<Utc>) -> String {
    let naive = instant.naive_utc();
    if naive.nanosecond() == 0 {
        naive.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        naive.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

fn split_event_names(
    records: &[DecodedRecord],
) -> Result<Vec<Option<EventParts>>, NormalizationError> {
    let values: Vec<Option<&Value>> = records.iter().map(|r| r.get(EVENT_NAME)).collect();

    let has_text = values.iter().any(|v| matches!(v, Some(Value::String(_))));
    let has_non_text = values
        .iter()
        .any(|v| v.is_some_and(|v| !v.is_null() && !v.is_string()));
    if has_non_text && !has_text {
        return Err(NormalizationError::EventNameNotText);
    }

    Ok(values
        .into_iter()
        .map(|value| match value {
            Some(Value::String(name)) => Some(split_event_name(name)),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::assemble;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use serde_json::json;

    fn batch_of(values: Vec<Value>) -> Batch {
        assemble(values.into_iter().map(|v| match v {
            Value::Object(map) => DecodedRecord::new(map),
            _ => panic!("fixture must be an object"),
        }))
    }

    #[test]
    fn login_event_is_fully_normalized() {
        let batch = batch_of(vec![
            json!({"created_at": 1_700_000_000, "event_name": "user:login"}),
        ]);
        let batch = normalize(batch).expect("normalizes");
        let record = &batch.records()[0];

        assert_eq!(record.get(CREATED_AT), Some(&json!("2023-11-14T22:13:20.000000Z")));
        assert_eq!(record.get(CREATED_DATETIME), Some(&json!("2023-11-14T22:13:20")));
        assert_eq!(record.get(EVENT_TYPE), Some(&json!("user")));
        assert_eq!(record.get(EVENT_SUBTYPE), Some(&json!("login")));
        assert_eq!(record.get(YEAR), Some(&json!(2023)));
        assert_eq!(record.get(MONTH), Some(&json!(11)));
        assert_eq!(record.get(DAY), Some(&json!(14)));
        assert_eq!(record.get(EVENT_NAME), Some(&json!("user:login")));
    }

    #[test]
    fn name_without_delimiter_has_null_subtype() {
        let batch = batch_of(vec![json!({"created_at": 1_700_000_000, "event_name": "ping"})]);
        let batch = normalize(batch).expect("normalizes");
        let record = &batch.records()[0];

        assert_eq!(record.get(EVENT_TYPE), Some(&json!("ping")));
        assert_eq!(record.get(EVENT_SUBTYPE), Some(&Value::Null));
    }

    #[test]
    fn extra_delimiters_are_dropped() {
        assert_eq!(
            split_event_name("a:b:c"),
            EventParts {
                event_type: "a".to_string(),
                event_subtype: Some("b".to_string()),
            }
        );
        assert_eq!(
            split_event_name("a::c"),
            EventParts {
                event_type: "a".to_string(),
                event_subtype: Some(String::new()),
            }
        );
        assert_eq!(split_event_name("").event_subtype, None);
    }

    #[test]
    fn event_fields_absent_when_no_record_has_event_name() {
        let batch = batch_of(vec![json!({"created_at": 0}), json!({"created_at": 1})]);
        let batch = normalize(batch).expect("normalizes");

        for record in batch.records() {
            assert!(record.get(EVENT_TYPE).is_none());
            assert!(record.get(EVENT_SUBTYPE).is_none());
        }
    }

    #[test]
    fn event_split_applies_batch_wide() {
        let batch = batch_of(vec![
            json!({"created_at": 0, "event_name": "a:b"}),
            json!({"created_at": 0}),
            json!({"created_at": 0, "event_name": 5}),
        ]);
        let batch = normalize(batch).expect("normalizes");

        assert_eq!(batch.records()[0].get(EVENT_TYPE), Some(&json!("a")));
        for record in &batch.records()[1..] {
            assert_eq!(record.get(EVENT_TYPE), Some(&Value::Null));
            assert_eq!(record.get(EVENT_SUBTYPE), Some(&Value::Null));
        }
    }

    #[test]
    fn numeric_only_event_name_fails() {
        let batch = batch_of(vec![json!({"created_at": 0, "event_name": 12})]);
        assert!(matches!(
            normalize(batch),
            Err(NormalizationError::EventNameNotText)
        ));
    }

    #[test]
    fn missing_created_at_fails_the_batch() {
        let batch = batch_of(vec![json!({"created_at": 0}), json!({"other": 1})]);
        assert!(matches!(
            normalize(batch),
            Err(NormalizationError::MissingTimestamp { position: 1 })
        ));
    }

    #[test]
    fn non_numeric_created_at_fails_the_batch() {
        for bad in [json!("1700000000"), Value::Null, json!(true), json!({"s": 1})] {
            let batch = batch_of(vec![json!({"created_at": bad})]);
            assert!(matches!(
                normalize(batch),
                Err(NormalizationError::NonNumericTimestamp { position: 0, .. })
            ));
        }
    }

    #[test]
    fn out_of_range_created_at_fails() {
        let batch = batch_of(vec![json!({"created_at": 1.0e300})]);
        assert!(matches!(
            normalize(batch),
            Err(NormalizationError::TimestampOutOfRange { .. })
        ));

        let batch = batch_of(vec![json!({"created_at": u64::MAX})]);
        assert!(matches!(
            normalize(batch),
            Err(NormalizationError::TimestampOutOfRange { .. })
        ));
    }

    #[test]
    fn fractional_epoch_keeps_microseconds() {
        let batch = batch_of(vec![json!({"created_at": 1_700_000_000.25})]);
        let batch = normalize(batch).expect("normalizes");
        let record = &batch.records()[0];

        assert_eq!(record.get(CREATED_DATETIME), Some(&json!("2023-11-14T22:13:20.250000")));
        assert_eq!(record.get(CREATED_AT), Some(&json!("2023-11-14T22:13:20.250000Z")));
    }

    #[test]
    fn negative_epoch_before_1970() {
        let batch = batch_of(vec![json!({"created_at": -86_400})]);
        let batch = normalize(batch).expect("normalizes");
        let record = &batch.records()[0];

        assert_eq!(record.get(YEAR), Some(&json!(1969)));
        assert_eq!(record.get(MONTH), Some(&json!(12)));
        assert_eq!(record.get(DAY), Some(&json!(31)));
    }

    #[test]
    fn existing_derived_fields_are_overwritten() {
        let batch = batch_of(vec![json!({"created_at": 0, "year": "nineteen seventy"})]);
        let batch = normalize(batch).expect("normalizes");
        assert_eq!(batch.records()[0].get(YEAR), Some(&json!(1970)));
    }

    proptest! {
        #[test]
        fn calendar_fields_match_utc_day(secs in -2_208_988_800_i64..4_102_444_800_i64) {
            let batch = batch_of(vec![json!({"created_at": secs})]);
            let batch = normalize(batch).expect("normalizes");
            let record = &batch.records()[0];

            let year = i32::try_from(record.get(YEAR).and_then(Value::as_i64).unwrap()).unwrap();
            let month = u32::try_from(record.get(MONTH).and_then(Value::as_u64).unwrap()).unwrap();
            let day = u32::try_from(record.get(DAY).and_then(Value::as_u64).unwrap()).unwrap();

            let midnight = NaiveDate::from_ymd_opt(year, month, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .and_utc()
                .timestamp();
            prop_assert!(midnight <= secs && secs < midnight + 86_400);
        }
    }
}
