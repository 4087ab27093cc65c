//! Transfer of the encoded artifact to durable storage.

use std::fmt;
use std::sync::Arc;

use strata_core::StorageBackend;

use crate::encoder::Artifact;
use crate::error::PublishError;
use crate::partition::PartitionKey;

/// Where and what was published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifact {
    /// Storage key the artifact landed at.
    pub key: String,
    /// Bytes written.
    pub size_bytes: u64,
    /// Rows in the artifact.
    pub row_count: usize,
}

/// Writes artifacts to a storage backend in a single put.
#[derive(Clone)]
pub struct ArtifactPublisher {
    backend: Arc<dyn StorageBackend>,
}

impl fmt::Debug for ArtifactPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactPublisher").finish_non_exhaustive()
    }
}

impl ArtifactPublisher {
    /// Creates a publisher writing to `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Stores the artifact at `key`. No retry is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the staged bytes cannot be read or the
    /// backend rejects the write.
    pub async fn publish(
        &self,
        artifact: &Artifact,
        key: &PartitionKey,
    ) -> Result<PublishedArtifact, PublishError> {
        let path = key.path();
        let bytes = artifact.bytes().await?;
        let size_bytes = bytes.len() as u64;

        self.backend
            .put(&path, bytes)
            .await
            .map_err(|source| PublishError::Storage {
                key: path.clone(),
                source,
            })?;

        Ok(PublishedArtifact {
            key: path,
            size_bytes,
            row_count: artifact.row_count(),
        })
    }
}
