//! Storage backend abstraction for durable object storage (S3, GCS, local).
//!
//! The pipeline treats storage as "store bytes at a key": a write either lands
//! completely or fails. Writes are unconditional, so a second write to the same
//! key replaces the first.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt as _;
use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// Metadata about a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object path (key).
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
    /// Entity tag for cache validation.
    pub etag: Option<String>,
}

/// Storage backend trait for object storage.
///
/// All storage backends (S3, GCS, local filesystem, memory) implement this trait.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads entire object.
    ///
    /// Returns `Error::NotFound` if object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes the whole object, replacing any existing object at `path`.
    async fn put(&self, path: &str, data: Bytes) -> Result<()>;

    /// Deletes an object.
    ///
    /// Succeeds even if object doesn't exist (idempotent).
    async fn delete(&self, path: &str) -> Result<()>;

    /// Lists objects with the given prefix.
    ///
    /// **Ordering**: arbitrary. Callers requiring deterministic order should sort.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Gets object metadata without reading content.
    ///
    /// Returns `None` if object doesn't exist.
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>>;
}

/// In-memory storage backend for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn meta(&self, path: &str) -> ObjectMeta {
        ObjectMeta {
            path: path.to_string(),
            size: self.data.len() as u64,
            last_modified: Some(self.last_modified),
            etag: None,
        }
    }
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> Error {
    Error::Internal {
        message: "lock poisoned".into(),
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| poisoned())?;

        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        self.objects.write().map_err(|_| poisoned())?.insert(
            path.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects.write().map_err(|_| poisoned())?.remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;

        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(path, obj)| obj.meta(path))
            .collect())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        Ok(objects.get(path).map(|obj| obj.meta(path)))
    }
}

/// Storage backend backed by the `object_store` crate.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    location: String,
}

impl ObjectStoreBackend {
    /// Wraps an existing object store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, location: impl Into<String>) -> Self {
        Self {
            store,
            location: location.into(),
        }
    }

    /// Resolves a bucket reference into a backend.
    ///
    /// Accepted forms: `s3://bucket`, `gs://bucket`, `file:///some/dir`,
    /// `memory://`, or a bare `bucket` (treated as S3).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the reference is empty or the
    /// underlying client cannot be built.
    pub fn from_bucket(bucket: &str) -> Result<Self> {
        let bucket = bucket.trim().trim_end_matches('/');
        if bucket.is_empty() {
            return Err(Error::configuration("storage bucket must not be empty"));
        }

        if let Some(name) = bucket.strip_prefix("s3://") {
            Self::s3(name)
        } else if let Some(name) = bucket.strip_prefix("gs://") {
            Self::gcs(name)
        } else if let Some(dir) = bucket.strip_prefix("file://") {
            Self::local(dir)
        } else if bucket == "memory:" || bucket == "memory:/" {
            Ok(Self::new(Arc::new(InMemory::new()), "memory://"))
        } else if bucket.contains("://") {
            Err(Error::configuration(format!(
                "unsupported storage scheme in '{bucket}'"
            )))
        } else {
            Self::s3(bucket)
        }
    }

    /// Creates an S3 backend using credentials and region from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the client cannot be built.
    pub fn s3(bucket: &str) -> Result<Self> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| Error::configuration(format!("s3 client for '{bucket}': {e}")))?;
        Ok(Self::new(Arc::new(store), format!("s3://{bucket}")))
    }

    /// Creates a GCS backend using credentials from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the client cannot be built.
    pub fn gcs(bucket: &str) -> Result<Self> {
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| Error::configuration(format!("gcs client for '{bucket}': {e}")))?;
        Ok(Self::new(Arc::new(store), format!("gs://{bucket}")))
    }

    /// Creates a backend rooted at a local directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the directory cannot be used as a root.
    pub fn local(root: &str) -> Result<Self> {
        let store = LocalFileSystem::new_with_prefix(root)
            .map_err(|e| Error::configuration(format!("local store at '{root}': {e}")))?;
        Ok(Self::new(Arc::new(store), format!("file://{root}")))
    }

    /// Returns a display form of the backing location (e.g. `s3://bucket`).
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }
}

fn map_store_error(op: &str, path: &str, err: object_store::Error) -> Error {
    match err {
        object_store::Error::NotFound { .. } => {
            Error::NotFound(format!("object not found: {path}"))
        }
        other => Error::storage_with_source(format!("{op} {path}"), other),
    }
}

fn convert_meta(meta: object_store::ObjectMeta) -> ObjectMeta {
    ObjectMeta {
        path: meta.location.to_string(),
        size: meta.size as u64,
        last_modified: Some(meta.last_modified),
        etag: meta.e_tag,
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let location = ObjectPath::from(path);
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| map_store_error("get", path, e))?;
        result
            .bytes()
            .await
            .map_err(|e| map_store_error("get", path, e))
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let location = ObjectPath::from(path);
        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| map_store_error("put", path, e))?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let location = ObjectPath::from(path);
        match self.store.delete(&location).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(map_store_error("delete", path, e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let trimmed = prefix.trim_end_matches('/');
        let location = (!trimmed.is_empty()).then(|| ObjectPath::from(trimmed));
        let metas: Vec<object_store::ObjectMeta> = self
            .store
            .list(location.as_ref())
            .try_collect()
            .await
            .map_err(|e| map_store_error("list", prefix, e))?;

        Ok(metas
            .into_iter()
            .map(convert_meta)
            .filter(|meta| meta.path.starts_with(prefix))
            .collect())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let location = ObjectPath::from(path);
        match self.store.head(&location).await {
            Ok(meta) => Ok(Some(convert_meta(meta))),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(map_store_error("head", path, e)),
        }
    }
}
