//! Archive storage protocol: one-shot initialization and the
//! store / availability / retrieve / delete operations.
//!
//! [`ArchiveStorageAdapter`] holds nothing but the immutable configuration.
//! Initialization consumes it, validates everything that can be validated
//! without touching the network, resolves the execution's base path once,
//! and yields an [`ArchiveStorage`] whose state never changes afterwards.

use crate::config::{ArchiveConfig, ConfigError};
use crate::context::{meta_key, ExecutionContext, KEY_EXECID};
use crate::object_store::{ObjectMetadata, ObjectStore, StoreError};
use crate::s3::{resolve_region, S3ObjectStore};
use crate::template::{expand_path, EXECID_PLACEHOLDER};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, instrument, warn};

/// Errors raised by archive operations after initialization.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The store rejected or failed a request; carries the backend message.
    /// The caller decides whether to retry.
    #[error("storage error: {0}")]
    Storage(String),

    /// A byte copy between a content stream and its peer failed. Distinct
    /// from [`ArchiveError::Storage`] so callers can tell "object not
    /// reachable" from "object reachable but the stream broke".
    #[error("data transfer error: {0}")]
    Transfer(#[from] std::io::Error),
}

impl From<StoreError> for ArchiveError {
    fn from(err: StoreError) -> Self {
        ArchiveError::Storage(err.to_string())
    }
}

/// Configured but not yet initialized adapter.
pub struct ArchiveStorageAdapter {
    config: ArchiveConfig,
}

impl ArchiveStorageAdapter {
    /// Wrap an immutable configuration. No validation happens here.
    pub fn new(config: ArchiveConfig) -> Self {
        Self { config }
    }

    /// Validate the configuration, build the S3 client and resolve the
    /// base path for this execution.
    ///
    /// Consumes the adapter: initialization is one-shot and every failure
    /// leaves nothing behind to misuse.
    pub async fn initialize(
        self,
        context: ExecutionContext,
    ) -> Result<ArchiveStorage, ConfigError> {
        let credentials = self.config.credentials()?;
        let target = validate(&self.config, &context)?;
        let store = S3ObjectStore::connect(&self.config, credentials, target.region).await;
        Ok(self.into_storage(Arc::new(store), context, target.base_path))
    }

    /// Run the same validation sequence against a caller-supplied store.
    ///
    /// This is the injection seam for tests and alternative backends; the
    /// credential and path checks are not skipped.
    pub async fn initialize_with(
        self,
        context: ExecutionContext,
        store: Arc<dyn ObjectStore>,
    ) -> Result<ArchiveStorage, ConfigError> {
        self.config.credentials()?;
        let target = validate(&self.config, &context)?;
        Ok(self.into_storage(store, context, target.base_path))
    }

    fn into_storage(
        self,
        store: Arc<dyn ObjectStore>,
        context: ExecutionContext,
        base_path: String,
    ) -> ArchiveStorage {
        ArchiveStorage {
            store,
            bucket: self.config.bucket,
            base_path,
            context,
            encode_user_metadata: self.config.encode_user_metadata,
        }
    }
}

struct ResolvedTarget {
    region: &'static str,
    base_path: String,
}

fn validate(config: &ArchiveConfig, context: &ExecutionContext) -> Result<ResolvedTarget, ConfigError> {
    if config.use_signature_v2 {
        return Err(ConfigError::SignatureV2Unsupported);
    }

    let region = resolve_region(&config.region)?;

    if config.bucket.trim().is_empty() {
        return Err(ConfigError::BucketNotSet);
    }
    if config.path.trim().is_empty() {
        return Err(ConfigError::PathNotSet);
    }

    let mut template = config.path.clone();
    if !template.contains(EXECID_PLACEHOLDER) {
        if !template.ends_with('/') {
            return Err(ConfigError::PathNotPerExecution);
        }
        // directory-style template: archive one file per execution under it
        template.push_str("/${job.execid}");
    }

    let base_path = expand_path(&template, context, None);
    if base_path.trim().is_empty() {
        return Err(ConfigError::EmptyResolvedPath);
    }
    if base_path.ends_with('/') {
        return Err(ConfigError::ResolvedPathEndsWithSlash);
    }

    Ok(ResolvedTarget { region, base_path })
}

/// Initialized archive storage bound to one execution.
pub struct ArchiveStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    base_path: String,
    context: ExecutionContext,
    encode_user_metadata: bool,
}

impl ArchiveStorage {
    /// Resolved base path for this execution.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    fn resolved_key(&self, file_type: &str) -> String {
        format!("{}.{}", self.base_path, file_type)
    }

    /// Store one file for the execution under its resolved key.
    ///
    /// The source is read to its end and is never closed by the adapter.
    /// Identifying user metadata from the execution context travels with
    /// the object.
    #[instrument(skip(self, source), fields(bucket = %self.bucket))]
    pub async fn store<R>(
        &self,
        file_type: &str,
        source: &mut R,
        length: u64,
        last_modified: DateTime<Utc>,
    ) -> Result<bool, ArchiveError>
    where
        R: AsyncRead + Send + Unpin + ?Sized,
    {
        let key = self.resolved_key(file_type);
        let metadata = ObjectMetadata {
            user: self.context.user_metadata(self.encode_user_metadata),
            content_length: length,
            last_modified: Some(last_modified),
        };

        let mut body = Vec::with_capacity(length as usize);
        source.read_to_end(&mut body).await?;

        debug!(key = %key, size = body.len(), "storing archive content");
        self.store
            .put_object(&self.bucket, &key, Bytes::from(body), metadata)
            .await?;

        Ok(true)
    }

    /// Check whether the file exists in the store.
    ///
    /// A missing object is a normal `false`, never an error. When the
    /// object exists, its recorded execution ID is compared with this
    /// execution's; a mismatch is logged as a warning and the object still
    /// counts as available. The contract is existence, not identity.
    pub async fn is_available(&self, file_type: &str) -> Result<bool, ArchiveError> {
        let key = self.resolved_key(file_type);
        debug!(bucket = %self.bucket, key = %key, "checking archive availability");

        match self.store.head_object(&self.bucket, &key).await {
            Ok(attributes) => {
                if let Some(expected) = self.context.get(KEY_EXECID) {
                    let recorded = attributes
                        .user_metadata
                        .get(&meta_key(KEY_EXECID))
                        .map(String::as_str);
                    if recorded != Some(expected) {
                        warn!(
                            key = %key,
                            expected = %expected,
                            recorded = recorded.unwrap_or(""),
                            "stored execution id does not match this execution"
                        );
                    }
                }
                Ok(true)
            }
            Err(StoreError::NotFound(_)) => {
                debug!(key = %key, "archive object not found");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Copy the stored file into the caller's sink.
    ///
    /// The store-side content stream is released on every exit path. The
    /// sink belongs to the caller and is never shut down here.
    #[instrument(skip(self, sink), fields(bucket = %self.bucket))]
    pub async fn retrieve<W>(&self, file_type: &str, sink: &mut W) -> Result<bool, ArchiveError>
    where
        W: AsyncWrite + Send + Unpin + ?Sized,
    {
        let key = self.resolved_key(file_type);
        let mut content = self.store.get_object(&self.bucket, &key).await?;

        let copied = tokio::io::copy(&mut content, sink).await?;
        debug!(key = %key, bytes = copied, "retrieved archive content");

        Ok(true)
    }

    /// Delete the stored file. No existence check is made first.
    pub async fn delete(&self, file_type: &str) -> Result<bool, ArchiveError> {
        let key = self.resolved_key(file_type);
        debug!(bucket = %self.bucket, key = %key, "deleting archive object");

        self.store.delete_object(&self.bucket, &key).await?;
        Ok(true)
    }

    /// Store a batch of files, one store call per file type.
    ///
    /// A failing file type is recorded in its outcome and does not abort
    /// the remaining entries.
    pub async fn store_multiple(
        &self,
        files: Vec<(String, StorageSource)>,
    ) -> Vec<StoreOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());
        for (file_type, mut file) in files {
            let result = self
                .store(&file_type, &mut file.source, file.length, file.last_modified)
                .await
                .map(|_| ());
            if let Err(err) = &result {
                warn!(file_type = %file_type, error = %err, "batch store failed for file type");
            }
            outcomes.push(StoreOutcome { file_type, result });
        }
        outcomes
    }
}

/// One file offered to [`ArchiveStorage::store_multiple`].
pub struct StorageSource {
    /// Content stream; read to its end, never closed by the adapter.
    pub source: Box<dyn AsyncRead + Send + Unpin>,
    /// Content length in bytes.
    pub length: u64,
    /// Last-modified timestamp of the content.
    pub last_modified: DateTime<Utc>,
}

/// Per-file-type result of a batch store.
#[derive(Debug)]
pub struct StoreOutcome {
    pub file_type: String,
    pub result: Result<(), ArchiveError>,
}
