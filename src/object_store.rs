//! Object store capability consumed by the archive adapter.
//!
//! The production implementation lives in [`crate::s3`]; the in-memory
//! implementation here backs tests and local development.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Errors surfaced by object store implementations.
///
/// `NotFound` is kept distinct from `Backend` so callers can treat a
/// missing object as a normal condition where the protocol allows it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Backend(String),
}

/// Byte stream handed back by [`ObjectStore::get_object`].
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Metadata attached to an object at write time.
#[derive(Debug, Clone, Default)]
pub struct ObjectMetadata {
    /// User metadata key/value pairs.
    pub user: HashMap<String, String>,
    /// Content length in bytes.
    pub content_length: u64,
    /// Last-modified timestamp of the archived content.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Attributes returned by a metadata-only lookup.
#[derive(Debug, Clone, Default)]
pub struct ObjectAttributes {
    /// User metadata recorded when the object was stored.
    pub user_metadata: HashMap<String, String>,
    /// Content length in bytes, when the store reports one.
    pub content_length: Option<u64>,
    /// Last-modified timestamp, when the store reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Abstraction over the object store operations the adapter needs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Metadata-only lookup for a key.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectAttributes, StoreError>;

    /// Store a payload with attached metadata.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        metadata: ObjectMetadata,
    ) -> Result<(), StoreError>;

    /// Open the content stream for a key.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader, StoreError>;

    /// Delete a key unconditionally.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
}

/// In-memory object store for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, (Bytes, ObjectMetadata)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn object_key(bucket: &str, key: &str) -> String {
        format!("{bucket}/{key}")
    }

    /// All stored `bucket/key` entries.
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }

    /// Raw bytes of a stored object.
    pub fn data(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(&Self::object_key(bucket, key))
            .map(|(data, _)| data.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectAttributes, StoreError> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        let (data, metadata) = objects
            .get(&Self::object_key(bucket, key))
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        Ok(ObjectAttributes {
            user_metadata: metadata.user.clone(),
            content_length: Some(data.len() as u64),
            last_modified: metadata.last_modified,
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        metadata: ObjectMetadata,
    ) -> Result<(), StoreError> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        objects.insert(Self::object_key(bucket, key), (body, metadata));
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader, StoreError> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        let (data, _) = objects
            .get(&Self::object_key(bucket, key))
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        Ok(Box::new(Cursor::new(data.to_vec())))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        objects.remove(&Self::object_key(bucket, key));
        Ok(())
    }
}
