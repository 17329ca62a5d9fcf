//! Object store abstraction trait
//!
//! Every backend (S3, local directory) implements [`ObjectStore`]. Callers only need
//! metadata lookups, whole-object downloads to a local path, and a cheap listing used as
//! a connectivity probe.

use analysis_core::ObjectAttributes;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Access denied to s3://{bucket}/{key}")]
    AccessDenied { bucket: String, key: String },

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Downloaded file is empty: {0}")]
    EmptyDownload(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StorageError {
    pub fn not_found(bucket: &str, key: &str) -> Self {
        StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub fn access_denied(bucket: &str, key: &str) -> Self {
        StorageError::AccessDenied {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    /// `NotFound` and `AccessDenied` will not change on retry.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound { .. } | StorageError::AccessDenied { .. }
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch object attributes without downloading the body.
    async fn head(&self, bucket: &str, key: &str) -> StorageResult<ObjectAttributes>;

    /// Write the whole object to `dest`, overwriting any existing file.
    ///
    /// Returns the number of bytes written.
    async fn download_to(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<u64>;

    /// List at most one object under `prefix`. Returns how many were listed (0 or 1).
    async fn probe_prefix(&self, bucket: &str, prefix: &str) -> StorageResult<usize>;

    /// Short backend name used in logs.
    fn backend_name(&self) -> &'static str;
}
