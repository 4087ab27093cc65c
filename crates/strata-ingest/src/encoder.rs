//! Parquet encoding of a normalized batch.
//!
//! The schema is the union of record fields, inferred from the JSON values,
//! with fixed types for the normalized fields. Records missing a field get a
//! null in that column. Conflicting shapes for one field (e.g. object in one
//! record and number in another) make the batch non-tabular.
//!
//! Columns whose shape contains an empty object are written as JSON text,
//! since Parquet has no field-less struct. `created_at` is built directly as a
//! UTC microsecond timestamp column from the normalized RFC 3339 values.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array as _, ArrayRef, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, FieldRef, Schema, SchemaRef, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow_json::ReaderBuilder;
use arrow_json::reader::infer_json_schema_from_iterator;
use bytes::Bytes;
use chrono::DateTime;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use serde_json::{Map, Value};

use crate::batch::Batch;
use crate::error::EncodingError;
use crate::normalize::{
    CREATED_AT, CREATED_DATETIME, DAY, EVENT_SUBTYPE, EVENT_TYPE, MONTH, YEAR,
};
use crate::staging::{StagedBody, StagedWriter, StagingArea};

/// The encoded columnar file for one invocation.
///
/// Dropping the artifact releases its staging resources.
#[derive(Debug)]
pub struct Artifact {
    body: StagedBody,
    size_bytes: u64,
    row_count: usize,
    schema: SchemaRef,
}

impl Artifact {
    /// Size of the encoded file in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Number of rows (records) in the file.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Arrow schema the file was written with.
    #[must_use]
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Local path of the staged file, when staged on disk.
    #[must_use]
    pub fn staged_path(&self) -> Option<&Path> {
        self.body.path()
    }

    /// Reads the encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a disk-staged file cannot be read.
    pub async fn bytes(&self) -> std::io::Result<Bytes> {
        self.body.read().await
    }
}

/// Serializes normalized batches into Parquet.
#[derive(Debug, Clone, Default)]
pub struct ColumnarEncoder {
    staging: StagingArea,
}

impl ColumnarEncoder {
    /// Creates an encoder that stages artifacts in `staging`.
    #[must_use]
    pub fn new(staging: StagingArea) -> Self {
        Self { staging }
    }

    /// Encodes the batch into a single Parquet artifact.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] if the batch is empty or not tabular, or the
    /// Parquet write or staging fails.
    pub fn encode(&self, batch: &Batch) -> Result<Artifact, EncodingError> {
        if batch.is_empty() {
            return Err(EncodingError::EmptyBatch);
        }

        let schema = batch_schema(batch)?;
        let record_batch = to_record_batch(&schema, batch)?;

        let mut writer = self.staging.create()?;
        write_parquet(&mut writer, &record_batch)?;
        let (body, size_bytes) = writer.finish()?;

        tracing::debug!(
            rows = record_batch.num_rows(),
            columns = schema.fields().len(),
            size_bytes,
            "encoded parquet artifact"
        );

        Ok(Artifact {
            body,
            size_bytes,
            row_count: record_batch.num_rows(),
            schema,
        })
    }
}

/// Timezone recorded on the `created_at` column.
const UTC: &str = "UTC";

/// Fixed column type for a normalized field.
fn normalized_type(name: &str) -> Option<DataType> {
    match name {
        CREATED_AT => Some(DataType::Timestamp(TimeUnit::Microsecond, Some(UTC.into()))),
        CREATED_DATETIME | EVENT_TYPE | EVENT_SUBTYPE => Some(DataType::Utf8),
        YEAR | MONTH | DAY => Some(DataType::Int32),
        _ => None,
    }
}

/// Parquet cannot store a struct without fields, at any nesting depth.
fn has_empty_struct(data_type: &DataType) -> bool {
    match data_type {
        DataType::Struct(fields) => {
            fields.is_empty() || fields.iter().any(|f| has_empty_struct(f.data_type()))
        }
        DataType::List(item) | DataType::LargeList(item) => has_empty_struct(item.data_type()),
        _ => false,
    }
}

fn not_tabular(err: ArrowError) -> EncodingError {
    EncodingError::NotTabular {
        message: err.to_string(),
    }
}

fn field_not_tabular(name: &str, err: impl std::fmt::Display) -> EncodingError {
    EncodingError::NotTabular {
        message: format!("field '{name}': {err}"),
    }
}

/// Infers the Arrow schema of a batch.
///
/// Fields appear in first-seen order. Columns whose shape contains an empty
/// object are stored as JSON text.
///
/// # Errors
///
/// Returns [`EncodingError::NotTabular`] naming the first field whose shapes
/// conflict.
pub fn batch_schema(batch: &Batch) -> Result<SchemaRef, EncodingError> {
    let mut fields: Vec<FieldRef> = Vec::new();

    for name in batch.field_names() {
        let data_type = match normalized_type(name) {
            Some(data_type) => data_type,
            None => {
                let inferred = infer_field_type(batch, name)?;
                if has_empty_struct(&inferred) {
                    DataType::Utf8
                } else {
                    inferred
                }
            }
        };
        fields.push(Arc::new(Field::new(name, data_type, true)));
    }

    Ok(Arc::new(Schema::new(fields)))
}

fn infer_field_type(batch: &Batch, name: &str) -> Result<DataType, EncodingError> {
    let values = batch.records().iter().filter_map(|record| {
        record.get(name).map(|value| {
            let mut row = Map::new();
            row.insert(name.to_string(), value.clone());
            Ok::<_, ArrowError>(Value::Object(row))
        })
    });
    let inferred =
        infer_json_schema_from_iterator(values).map_err(|err| field_not_tabular(name, err))?;

    inferred
        .fields()
        .first()
        .map(|field| field.data_type().clone())
        .ok_or_else(|| field_not_tabular(name, "no values"))
}

fn to_record_batch(schema: &SchemaRef, batch: &Batch) -> Result<RecordBatch, EncodingError> {
    // Timestamps go through the JSON decoder as text and are parsed here.
    let decode_fields: Vec<FieldRef> = schema
        .fields()
        .iter()
        .map(|field| {
            if field.name() == CREATED_AT {
                Arc::new(Field::new(CREATED_AT, DataType::Utf8, true))
            } else {
                Arc::clone(field)
            }
        })
        .collect();
    let text_columns: Vec<&str> = schema
        .fields()
        .iter()
        .filter(|field| field.data_type() == &DataType::Utf8)
        .map(|field| field.name().as_str())
        .collect();

    let rows: Vec<Map<String, Value>> = batch
        .records()
        .iter()
        .map(|record| {
            let mut row = record.fields().clone();
            for name in &text_columns {
                if let Some(value) = row.get_mut(*name) {
                    if value.is_object() || value.is_array() {
                        *value = Value::String(value.to_string());
                    }
                }
            }
            row
        })
        .collect();

    let mut decoder = ReaderBuilder::new(Arc::new(Schema::new(decode_fields)))
        .with_batch_size(batch.len())
        .with_coerce_primitive(true)
        .build_decoder()
        .map_err(not_tabular)?;
    decoder.serialize(&rows).map_err(not_tabular)?;
    let decoded = decoder
        .flush()
        .map_err(not_tabular)?
        .ok_or(EncodingError::EmptyBatch)?;

    let mut columns = decoded.columns().to_vec();
    if let Ok(index) = schema.index_of(CREATED_AT) {
        columns[index] = timestamp_column(&columns[index])?;
    }
    RecordBatch::try_new(Arc::clone(schema), columns).map_err(not_tabular)
}

/// Converts RFC 3339 text into a UTC microsecond timestamp column.
fn timestamp_column(text: &ArrayRef) -> Result<ArrayRef, EncodingError> {
    let text = text
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| field_not_tabular(CREATED_AT, "expected timestamp text"))?;

    let micros = text
        .iter()
        .map(|value| {
            value
                .map(|s| {
                    DateTime::parse_from_rfc3339(s)
                        .map(|instant| instant.timestamp_micros())
                        .map_err(|err| field_not_tabular(CREATED_AT, format!("'{s}': {err}")))
                })
                .transpose()
        })
        .collect::<Result<Vec<Option<i64>>, _>>()?;

    Ok(Arc::new(
        TimestampMicrosecondArray::from(micros).with_timezone(UTC),
    ))
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some(concat!("strata-ingest ", env!("CARGO_PKG_VERSION")).to_string()),
    };
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

fn write_parquet(sink: &mut StagedWriter, batch: &RecordBatch) -> Result<(), EncodingError> {
    let props = writer_properties();
    let mut writer = ArrowWriter::try_new(sink, batch.schema(), Some(props)).map_err(|e| {
        EncodingError::Parquet {
            message: format!("parquet writer init failed: {e}"),
        }
    })?;
    writer.write(batch).map_err(|e| EncodingError::Parquet {
        message: format!("parquet write failed: {e}"),
    })?;
    writer.close().map_err(|e| EncodingError::Parquet {
        message: format!("parquet close failed: {e}"),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{DecodedRecord, assemble};
    use crate::normalize::normalize;
    use arrow::array::{Array as _, Int32Array, Int64Array, StringArray, TimestampMicrosecondArray};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use serde_json::json;

    fn batch_of(values: Vec<Value>) -> Batch {
        assemble(values.into_iter().map(|v| match v {
            Value::Object(map) => DecodedRecord::new(map),
            _ => panic!("fixture must be an object"),
        }))
    }

    fn read_back(bytes: Bytes) -> RecordBatch {
        let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)
            .expect("valid parquet")
            .build()
            .expect("build reader");
        let batches: Vec<RecordBatch> = reader
            .collect::<Result<Vec<_>, _>>()
            .expect("read batches");
        assert_eq!(batches.len(), 1);
        batches.into_iter().next().unwrap()
    }

    fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> &'a T {
        batch
            .column_by_name(name)
            .unwrap_or_else(|| panic!("missing column {name}"))
            .as_any()
            .downcast_ref::<T>()
            .unwrap_or_else(|| panic!("column {name} has unexpected type"))
    }

    #[tokio::test]
    async fn normalized_batch_reads_back() {
        let batch = normalize(batch_of(vec![
            json!({"created_at": 1_700_000_000, "event_name": "user:login", "user_id": 7}),
            json!({"created_at": 1_700_086_400, "event_name": "ping"}),
        ]))
        .expect("normalizes");

        let artifact = ColumnarEncoder::default().encode(&batch).expect("encodes");
        assert_eq!(artifact.row_count(), 2);
        assert!(artifact.staged_path().is_none());

        let bytes = artifact.bytes().await.expect("bytes");
        assert_eq!(artifact.size_bytes(), bytes.len() as u64);
        assert_eq!(&bytes[..4], b"PAR1");

        let read = read_back(bytes);
        assert_eq!(read.num_rows(), 2);

        let created_at: &TimestampMicrosecondArray = column(&read, CREATED_AT);
        assert_eq!(created_at.value(0), 1_700_000_000_000_000);
        assert_eq!(created_at.value(1), 1_700_086_400_000_000);

        let datetimes: &StringArray = column(&read, CREATED_DATETIME);
        assert_eq!(datetimes.value(0), "2023-11-14T22:13:20");

        let types: &StringArray = column(&read, EVENT_TYPE);
        let subtypes: &StringArray = column(&read, EVENT_SUBTYPE);
        assert_eq!(types.value(0), "user");
        assert_eq!(types.value(1), "ping");
        assert_eq!(subtypes.value(0), "login");
        assert!(subtypes.is_null(1));

        let user_ids: &Int64Array = column(&read, "user_id");
        assert_eq!(user_ids.value(0), 7);
        assert!(user_ids.is_null(1));

        let days: &Int32Array = column(&read, DAY);
        assert_eq!(days.value(0), 14);
        assert_eq!(days.value(1), 15);
        let years: &Int32Array = column(&read, YEAR);
        assert_eq!(years.value(1), 2023);
    }

    #[test]
    fn schema_is_field_union_with_normalized_types() {
        let batch = normalize(batch_of(vec![
            json!({"created_at": 0, "source": "web"}),
            json!({"created_at": 1, "source": "ios", "score": 1.5}),
        ]))
        .expect("normalizes");

        let schema = batch_schema(&batch).expect("schema");
        let mut names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names[0], "created_at");
        names.sort_unstable();
        assert_eq!(
            names,
            vec!["created_at", "created_datetime", "day", "month", "score", "source", "year"]
        );

        assert_eq!(
            schema.field_with_name(CREATED_AT).unwrap().data_type(),
            &DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
        );
        assert_eq!(
            schema.field_with_name(YEAR).unwrap().data_type(),
            &DataType::Int32
        );
        assert_eq!(
            schema.field_with_name("score").unwrap().data_type(),
            &DataType::Float64
        );
    }

    #[test]
    fn nested_values_are_encoded() {
        let batch = normalize(batch_of(vec![
            json!({"created_at": 0, "context": {"ip": "10.0.0.1", "port": 443}}),
            json!({"created_at": 0, "context": {"ip": "10.0.0.2"}}),
        ]))
        .expect("normalizes");

        let artifact = ColumnarEncoder::default().encode(&batch).expect("encodes");
        let context = artifact.schema().field_with_name("context").unwrap();
        assert!(matches!(context.data_type(), DataType::Struct(_)));
    }

    #[test]
    fn conflicting_shapes_are_not_tabular() {
        let batch = normalize(batch_of(vec![
            json!({"created_at": 0, "context": {"ip": "10.0.0.1"}}),
            json!({"created_at": 0, "context": 5}),
        ]))
        .expect("normalizes");

        let err = ColumnarEncoder::default().encode(&batch).unwrap_err();
        assert!(
            matches!(&err, EncodingError::NotTabular { message } if message.contains("field 'context'")),
            "{err}"
        );
    }

    #[test]
    fn empty_batch_is_rejected() {
        let err = ColumnarEncoder::default()
            .encode(&Batch::default())
            .unwrap_err();
        assert!(matches!(err, EncodingError::EmptyBatch));
    }

    #[tokio::test]
    async fn directory_staging_is_released_with_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let encoder = ColumnarEncoder::new(StagingArea::Directory(dir.path().to_path_buf()));
        let batch = normalize(batch_of(vec![json!({"created_at": 0})])).expect("normalizes");

        let artifact = encoder.encode(&batch).expect("encodes");
        let path = artifact.staged_path().expect("staged on disk").to_path_buf();
        assert!(path.exists());
        let read = read_back(artifact.bytes().await.expect("bytes"));
        assert_eq!(read.num_rows(), 1);

        drop(artifact);
        assert!(!path.exists());
    }

    #[test]
    fn failed_encode_leaves_staging_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let encoder = ColumnarEncoder::new(StagingArea::Directory(dir.path().to_path_buf()));
        let batch = normalize(batch_of(vec![
            json!({"created_at": 0, "v": {"a": 1}}),
            json!({"created_at": 0, "v": [1, 2]}),
        ]))
        .expect("normalizes");

        match encoder.encode(&batch) {
            Err(EncodingError::NotTabular { message }) => {
                assert!(message.contains("field 'v'"), "{message}");
            }
            other => panic!("expected not tabular, got {other:?}"),
        }
        assert_eq!(std::fs::read_dir(dir.path()).expect("read_dir").count(), 0);
    }

    #[tokio::test]
    async fn created_at_is_a_utc_timestamp_column() {
        let batch = normalize(batch_of(vec![
            json!({"created_at": 1_700_000_000.25}),
            json!({"created_at": -1}),
        ]))
        .expect("normalizes");

        let artifact = ColumnarEncoder::default().encode(&batch).expect("encodes");
        assert_eq!(
            artifact.schema().field_with_name(CREATED_AT).unwrap().data_type(),
            &DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
        );

        let read = read_back(artifact.bytes().await.expect("bytes"));
        let created_at: &TimestampMicrosecondArray = column(&read, CREATED_AT);
        assert_eq!(created_at.value(0), 1_700_000_000_250_000);
        assert_eq!(created_at.value(1), -1_000_000);
        assert_eq!(created_at.timezone(), Some("UTC"));
    }

    #[tokio::test]
    async fn empty_objects_are_stored_as_json_text() {
        let batch = normalize(batch_of(vec![
            json!({"created_at": 0, "meta": {}, "tags": {"inner": {}}}),
            json!({"created_at": 0, "meta": {}}),
        ]))
        .expect("normalizes");

        let artifact = ColumnarEncoder::default().encode(&batch).expect("encodes");
        let schema = artifact.schema();
        assert_eq!(schema.field_with_name("meta").unwrap().data_type(), &DataType::Utf8);
        assert_eq!(schema.field_with_name("tags").unwrap().data_type(), &DataType::Utf8);

        let read = read_back(artifact.bytes().await.expect("bytes"));
        let meta: &StringArray = column(&read, "meta");
        assert_eq!(meta.value(0), "{}");
        let tags: &StringArray = column(&read, "tags");
        assert_eq!(tags.value(0), r#"{"inner":{}}"#);
        assert!(tags.is_null(1));
    }

    #[test]
    fn mixed_scalars_are_coerced_to_text() {
        let batch = normalize(batch_of(vec![
            json!({"created_at": 0, "code": "E1"}),
            json!({"created_at": 0, "code": 404}),
        ]))
        .expect("normalizes");

        let artifact = ColumnarEncoder::default().encode(&batch).expect("encodes");
        assert_eq!(
            artifact.schema().field_with_name("code").unwrap().data_type(),
            &DataType::Utf8
        );
    }
}
