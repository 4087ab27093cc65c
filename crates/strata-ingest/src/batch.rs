//! Decoded records and the batch that groups them.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};

/// One successfully parsed event: field name to dynamically typed value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DecodedRecord {
    fields: Map<String, Value>,
}

impl DecodedRecord {
    /// Wraps a parsed JSON object.
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Sets a field, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Iterates field names in insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Returns the underlying field map.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl From<Map<String, Value>> for DecodedRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

/// Ordered records from one invocation, treated as a single table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    records: Vec<DecodedRecord>,
}

/// Collects decoded records into a batch, preserving arrival order.
pub fn assemble(records: impl IntoIterator<Item = DecodedRecord>) -> Batch {
    Batch {
        records: records.into_iter().collect(),
    }
}

impl Batch {
    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing decoded; the pipeline short-circuits on this.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in arrival order.
    #[must_use]
    pub fn records(&self) -> &[DecodedRecord] {
        &self.records
    }

    /// Mutable access to the records, for in-place enrichment.
    pub fn records_mut(&mut self) -> &mut [DecodedRecord] {
        &mut self.records
    }

    /// The batch schema: union of field names in first-seen order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .flat_map(DecodedRecord::field_names)
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// True if any record in the batch carries `name`.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.get(name).is_some())
    }
}
