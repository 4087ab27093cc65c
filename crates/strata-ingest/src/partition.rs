//! Destination key routing.
//!
//! The key is derived from the invocation's wall-clock time, not from record
//! content, even though records carry their own `year`/`month`/`day`. File
//! names have second granularity, so two invocations in the same second
//! target the same key and the later write replaces the earlier one.

use std::fmt;

use chrono::{DateTime, Datelike as _, Utc};

/// Default top-level prefix for artifacts.
pub const DEFAULT_KEY_PREFIX: &str = "events";

/// Storage path for one artifact:
/// `<prefix>/year=<Y>/month=<M>/day=<D>/<YYYYMMDDHHMMSS>.parquet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionKey {
    prefix: String,
    year: i32,
    month: u32,
    day: u32,
    file_name: String,
}

impl PartitionKey {
    /// Calendar year segment.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Calendar month segment (unpadded).
    #[must_use]
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Calendar day segment (unpadded).
    #[must_use]
    pub fn day(&self) -> u32 {
        self.day
    }

    /// File name component, e.g. `20231114221320.parquet`.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Full storage path.
    #[must_use]
    pub fn path(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.prefix.is_empty() {
            write!(f, "{}/", self.prefix)?;
        }
        write!(
            f,
            "year={}/month={}/day={}/{}",
            self.year, self.month, self.day, self.file_name
        )
    }
}

/// Computes partition keys under a fixed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRouter {
    prefix: String,
}

impl Default for PartitionRouter {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl PartitionRouter {
    /// Creates a router rooted at `prefix` (surrounding slashes are ignored).
    #[must_use]
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: prefix.as_ref().trim_matches('/').to_string(),
        }
    }

    /// Returns the key for an artifact created at `now`.
    #[must_use]
    pub fn route(&self, now: DateTime<Utc>) -> PartitionKey {
        PartitionKey {
            prefix: self.prefix.clone(),
            year: now.year(),
            month: now.month(),
            day: now.day(),
            file_name: format!("{}.parquet", now.format("%Y%m%d%H%M%S")),
        }
    }
}

/// Routes under the default `events` prefix.
#[must_use]
pub fn route(now: DateTime<Utc>) -> PartitionKey {
    PartitionRouter::default().route(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_uses_unpadded_segments_and_compact_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let key = route(now);

        assert_eq!(key.path(), "events/year=2024/month=3/day=5/20240305070809.parquet");
        assert_eq!(key.file_name(), "20240305070809.parquet");
        assert_eq!((key.year(), key.month(), key.day()), (2024, 3, 5));
    }

    #[test]
    fn same_second_collides() {
        let a = Utc.timestamp_opt(1_700_000_000, 1_000).unwrap();
        let b = Utc.timestamp_opt(1_700_000_000, 999_000_000).unwrap();
        assert_eq!(route(a), route(b));
    }

    #[test]
    fn custom_prefix_is_trimmed() {
        let now = Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap();

        let key = PartitionRouter::new("/raw/events/").route(now);
        assert_eq!(
            key.to_string(),
            "raw/events/year=2023/month=11/day=14/20231114221320.parquet"
        );

        let bare = PartitionRouter::new("").route(now);
        assert_eq!(bare.path(), "year=2023/month=11/day=14/20231114221320.parquet");
    }
}
