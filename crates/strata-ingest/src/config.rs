//! Pipeline configuration.
//!
//! Built explicitly by the host and passed to [`crate::IngestPipeline`]; the
//! storage backend itself is injected separately.

use std::path::PathBuf;

use strata_core::{Error, Result};

use crate::partition::DEFAULT_KEY_PREFIX;
use crate::staging::StagingArea;

/// Settings for one pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Bucket reference the artifacts are published to (e.g. `s3://events-raw`).
    pub bucket: String,
    /// Top-level key prefix.
    pub key_prefix: String,
    /// Where artifacts are staged before publishing.
    pub staging: StagingArea,
}

impl IngestConfig {
    /// Creates a configuration with the default prefix and in-memory staging.
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            staging: StagingArea::Memory,
        }
    }

    /// Overrides the key prefix.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Stages artifacts as temporary files in `dir` instead of memory.
    #[must_use]
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging = StagingArea::Directory(dir.into());
        self
    }

    /// Checks the configuration before any work is done.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the bucket is empty or the staging
    /// directory does not exist.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(Error::configuration("storage bucket must not be empty"));
        }
        if let StagingArea::Directory(dir) = &self.staging {
            if !dir.is_dir() {
                return Err(Error::configuration(format!(
                    "staging directory {} does not exist",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}
