//! S3-backed object store implementation.
//!
//! Builds an S3 client bound to the configured credentials, region and
//! endpoint, and maps SDK failures onto [`StoreError`], keeping not-found
//! responses distinct from everything else.

use crate::config::{ArchiveConfig, ConfigError, ResolvedCredentials};
use crate::object_store::{ObjectAttributes, ObjectMetadata, ObjectReader, ObjectStore, StoreError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use chrono::DateTime;
use tracing::{debug, info};

/// Region names accepted by the `region` setting.
static KNOWN_REGIONS: [&str; 28] = [
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "af-south-1",
    "ap-east-1",
    "ap-south-1",
    "ap-south-2",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ca-central-1",
    "eu-central-1",
    "eu-central-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-north-1",
    "eu-south-1",
    "eu-south-2",
    "me-south-1",
    "me-central-1",
    "sa-east-1",
    "us-gov-west-1",
];

/// Validate a configured region name against the known region set.
pub fn resolve_region(name: &str) -> Result<&'static str, ConfigError> {
    KNOWN_REGIONS
        .iter()
        .find(|region| **region == name)
        .copied()
        .ok_or_else(|| ConfigError::UnknownRegion(name.to_string()))
}

/// Object store backed by an S3 (or S3-compatible) service.
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    /// Build a client for the configured credentials, region and endpoint.
    ///
    /// An explicit endpoint takes precedence over the region for
    /// addressing; path-style access and signing are per-client settings,
    /// never process-wide state.
    pub async fn connect(
        config: &ArchiveConfig,
        credentials: ResolvedCredentials,
        region: &'static str,
    ) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(aws_config::Region::new(region));

        if let ResolvedCredentials::Static {
            access_key_id,
            secret_access_key,
        } = credentials
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "archive-config",
            ));
        }

        let shared_config = loader.load().await;
        let mut builder = S3ConfigBuilder::from(&shared_config);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if config.path_style {
            builder = builder.force_path_style(true);
        }
        if config.force_signature_v4 {
            // the SDK signs SigV4 unconditionally
            debug!("force_signature_v4 set; v4 signing is already in effect");
        }

        let client = S3Client::from_conf(builder.build());

        info!(
            region = %region,
            endpoint = config.endpoint.as_deref().unwrap_or(""),
            path_style = config.path_style,
            "S3 object store initialized"
        );

        Self { client }
    }

    /// Wrap an existing client. Useful when the caller manages SDK setup.
    pub fn from_client(client: S3Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectAttributes, StoreError> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(ObjectAttributes {
                user_metadata: output.metadata().cloned().unwrap_or_default(),
                content_length: output.content_length().map(|length| length as u64),
                last_modified: output
                    .last_modified()
                    .and_then(|when| DateTime::from_timestamp(when.secs(), when.subsec_nanos())),
            }),
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|service_err| service_err.is_not_found())
                    .unwrap_or(false)
                {
                    Err(StoreError::NotFound(key.to_string()))
                } else {
                    Err(StoreError::Backend(format!("{}", DisplayErrorContext(&err))))
                }
            }
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        metadata: ObjectMetadata,
    ) -> Result<(), StoreError> {
        // S3 records its own Last-Modified; only user metadata and length
        // travel with the request
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .set_metadata(Some(metadata.user))
            .content_length(metadata.content_length as i64)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| StoreError::Backend(format!("{}", DisplayErrorContext(&err))))?;

        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| StoreError::Backend(format!("{}", DisplayErrorContext(&err))))?;

        Ok(Box::new(output.body.into_async_read()))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| StoreError::Backend(format!("{}", DisplayErrorContext(&err))))?;

        Ok(())
    }
}
