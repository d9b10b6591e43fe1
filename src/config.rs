//! Adapter configuration and credential resolution.

use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::template::DEFAULT_PATH_TEMPLATE;

/// Property names expected inside a credentials file.
const CREDENTIALS_ACCESS_KEY: &str = "accessKey";
const CREDENTIALS_SECRET_KEY: &str = "secretKey";

/// Configuration problems detected during initialization.
///
/// All of these are fatal and raised before any request is issued.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("access_key_id and secret_access_key must both be configured")]
    IncompleteKeyPair,

    #[error("static keys and a credentials file were both configured; set only one")]
    AmbiguousCredentials,

    #[error("credentials file does not exist or cannot be read: {0}")]
    CredentialsFileUnreadable(String),

    #[error("credentials file {0} doesn't contain the expected properties 'accessKey' and 'secretKey'")]
    CredentialsFileIncomplete(String),

    #[error("region was not found: {0}")]
    UnknownRegion(String),

    #[error("bucket was not set")]
    BucketNotSet,

    #[error("path was not set")]
    PathNotSet,

    #[error("path must contain ${{job.execid}} or end with /")]
    PathNotPerExecution,

    #[error("expanded value of path was empty")]
    EmptyResolvedPath,

    #[error("expanded value of path must not end with /")]
    ResolvedPathEndsWithSlash,

    #[error("signature v2 is not supported; unset use_signature_v2")]
    SignatureV2Unsupported,
}

/// Archive storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Bucket receiving archived files.
    #[serde(default)]
    pub bucket: String,
    /// Storage path template; supports `${job.*}` placeholders.
    #[serde(default = "default_path")]
    pub path: String,
    /// S3 region name.
    #[serde(default = "default_region")]
    pub region: String,
    /// Endpoint override; takes precedence over the region when set.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Static access key ID; requires `secret_access_key`.
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Static secret access key; requires `access_key_id`.
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Properties file with `accessKey`/`secretKey` entries.
    #[serde(default)]
    pub credentials_file: Option<String>,
    /// Percent-encode user metadata values before storage.
    #[serde(default)]
    pub encode_user_metadata: bool,
    /// Request signature V4 signing. The SDK signs V4 already; accepted for
    /// configuration compatibility.
    #[serde(default)]
    pub force_signature_v4: bool,
    /// Request signature V2 signing. Rejected at initialization.
    #[serde(default)]
    pub use_signature_v2: bool,
    /// Address the endpoint as `endpoint/bucket` instead of `bucket.endpoint`.
    #[serde(default)]
    pub path_style: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            path: default_path(),
            region: default_region(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            credentials_file: None,
            encode_user_metadata: false,
            force_signature_v4: false,
            use_signature_v2: false,
            path_style: false,
        }
    }
}

fn default_path() -> String {
    DEFAULT_PATH_TEMPLATE.to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl ArchiveConfig {
    /// Load configuration from config files and environment variables.
    ///
    /// Later sources override earlier ones:
    /// `config/archive.*`, then `/etc/log-archive/archive.*`, then
    /// `ARCHIVE_*` environment variables (e.g. `ARCHIVE_BUCKET`).
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/archive").required(false))
            .add_source(config::File::with_name("/etc/log-archive/archive").required(false))
            .add_source(
                config::Environment::with_prefix("ARCHIVE")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Resolve the active credential source.
    ///
    /// Exactly one of the static key pair, a credentials file, or the
    /// ambient provider chain may be in play. A partial key pair and a
    /// pair-plus-file combination are both rejected.
    pub fn credentials(&self) -> Result<ResolvedCredentials, ConfigError> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(_), None) | (None, Some(_)) => return Err(ConfigError::IncompleteKeyPair),
            (Some(access_key_id), Some(secret_access_key)) => {
                if self.credentials_file.is_some() {
                    return Err(ConfigError::AmbiguousCredentials);
                }
                return Ok(ResolvedCredentials::Static {
                    access_key_id: access_key_id.clone(),
                    secret_access_key: secret_access_key.clone(),
                });
            }
            (None, None) => {}
        }

        if let Some(file) = &self.credentials_file {
            return read_credentials_file(file);
        }

        Ok(ResolvedCredentials::DefaultChain)
    }
}

/// Resolved credential source handed to the store client constructor.
#[derive(Debug, Clone)]
pub enum ResolvedCredentials {
    /// Explicit key pair from configuration or a credentials file.
    Static {
        access_key_id: String,
        secret_access_key: String,
    },
    /// Ambient provider chain (environment, profile, instance role).
    DefaultChain,
}

/// Read a properties file holding `accessKey` and `secretKey`.
fn read_credentials_file(path: &str) -> Result<ResolvedCredentials, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_| ConfigError::CredentialsFileUnreadable(path.to_string()))?;
    let properties = parse_properties(&contents);
    match (
        properties.get(CREDENTIALS_ACCESS_KEY),
        properties.get(CREDENTIALS_SECRET_KEY),
    ) {
        (Some(access_key_id), Some(secret_access_key)) => Ok(ResolvedCredentials::Static {
            access_key_id: access_key_id.clone(),
            secret_access_key: secret_access_key.clone(),
        }),
        _ => Err(ConfigError::CredentialsFileIncomplete(path.to_string())),
    }
}

/// Minimal properties parser: `key=value` or `key: value` lines, `#` and
/// `!` comment lines.
fn parse_properties(contents: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=').or_else(|| line.split_once(':')) {
            properties.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    properties
}
