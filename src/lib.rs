//! Execution log archival to S3-compatible object storage.
//!
//! A job run produces one or more artifact files (the execution log, state
//! files). This crate computes a storage key for the run from a
//! configurable path template, writes the artifacts to an object store
//! with identifying metadata attached, and can later check availability,
//! fetch the content back, or delete it.
//!
//! ## Architecture
//!
//! ```text
//! ArchiveConfig ──▶ ArchiveStorageAdapter ── initialize(context) ──▶ ArchiveStorage
//!                                                                        │
//!                                    store / is_available / retrieve / delete
//!                                                                        ▼
//!                                       ObjectStore (S3ObjectStore | MemoryObjectStore)
//! ```
//!
//! The base path is resolved exactly once, at initialization, from the
//! configured template and the execution context; each operation appends a
//! file-type suffix to it. The object store is a capability trait so the
//! production S3 client and test implementations are interchangeable.

pub mod adapter;
pub mod config;
pub mod context;
pub mod object_store;
pub mod s3;
pub mod template;

pub use adapter::{ArchiveError, ArchiveStorage, ArchiveStorageAdapter, StorageSource, StoreOutcome};
pub use config::{ArchiveConfig, ConfigError, ResolvedCredentials};
pub use context::ExecutionContext;
pub use object_store::{
    MemoryObjectStore, ObjectAttributes, ObjectMetadata, ObjectStore, StoreError,
};
pub use s3::S3ObjectStore;
pub use template::{expand_path, DEFAULT_PATH_TEMPLATE};
