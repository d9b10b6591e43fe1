//! Per-execution facts supplied by the host at initialization.
//!
//! The host hands the adapter a read-only key/value mapping describing the
//! job run (execution ID, project, job identity, server identity). A fixed
//! subset of these fields is copied into object user metadata at store time
//! so an archived file can later be matched back to its execution.

use std::collections::HashMap;

/// Context key for the execution ID.
pub const KEY_EXECID: &str = "execid";
/// Context key for the project name.
pub const KEY_PROJECT: &str = "project";
/// Context key for the job UUID.
pub const KEY_JOB_ID: &str = "id";
/// Context key for the job name.
pub const KEY_JOB_NAME: &str = "name";
/// Context key for the job group.
pub const KEY_JOB_GROUP: &str = "group";
/// Context key for the user that started the execution.
pub const KEY_USERNAME: &str = "username";
/// Context key for the execution output URL.
pub const KEY_URL: &str = "url";
/// Context key for the server base URL.
pub const KEY_SERVER_URL: &str = "serverUrl";
/// Context key for the server UUID.
pub const KEY_SERVER_UUID: &str = "serverUUID";

/// Prefix for user metadata keys attached to stored objects.
pub const META_PREFIX: &str = "rundeck.";

/// Context fields copied into object user metadata at store time.
const STORED_META: [&str; 6] = [
    KEY_EXECID,
    KEY_USERNAME,
    KEY_PROJECT,
    KEY_URL,
    KEY_SERVER_URL,
    KEY_SERVER_UUID,
];

/// Immutable key/value facts about one job execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    values: HashMap<String, String>,
}

impl ExecutionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fact, stringifying the value.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.values.insert(key.into(), value.to_string());
        self
    }

    /// Look up a fact by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Execution ID, when the host supplied one.
    pub fn execution_id(&self) -> Option<&str> {
        self.get(KEY_EXECID)
    }

    /// Build the user metadata map stored alongside an archived object.
    ///
    /// Absent context fields are skipped. With `encode` set, values are
    /// percent-encoded before storage.
    pub fn user_metadata(&self, encode: bool) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        for field in STORED_META {
            if let Some(value) = self.get(field) {
                let value = if encode {
                    urlencoding::encode(value).into_owned()
                } else {
                    value.to_string()
                };
                metadata.insert(meta_key(field), value);
            }
        }
        metadata
    }
}

impl FromIterator<(String, String)> for ExecutionContext {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Namespaced metadata key for a context field.
pub fn meta_key(field: &str) -> String {
    format!("{META_PREFIX}{field}")
}
