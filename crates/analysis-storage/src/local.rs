use crate::keys::validate_relative_key;
use crate::traits::{ObjectStore, StorageError, StorageResult};
use analysis_core::ObjectAttributes;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local directory object store
///
/// Objects live at `{root}/{bucket}/{key}`. Useful for development against a directory
/// of sample files and for exercising the pipeline without a network.
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create a new LocalObjectStore rooted at `root`, creating it if needed.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::Config(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        validate_relative_key(bucket)?;
        validate_relative_key(key)?;
        Ok(self.root.join(bucket).join(key))
    }

    fn guess_content_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("mp4") | Some("m4v") => "video/mp4",
            Some("mov") => "video/quicktime",
            Some("avi") => "video/x-msvideo",
            Some("mkv") => "video/x-matroska",
            Some("webm") => "video/webm",
            Some("wmv") => "video/x-ms-wmv",
            Some("flv") => "video/x-flv",
            _ => "application/octet-stream",
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn head(&self, bucket: &str, key: &str) -> StorageResult<ObjectAttributes> {
        let path = self.object_path(bucket, key)?;
        let meta = match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(StorageError::not_found(bucket, key)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(bucket, key))
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(StorageError::access_denied(bucket, key))
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        let last_modified = meta
            .modified()
            .ok()
            .map(chrono::DateTime::<chrono::Utc>::from);

        Ok(ObjectAttributes {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: meta.len(),
            content_type: Self::guess_content_type(&path).to_string(),
            last_modified,
            etag: String::new(),
            storage_class: "LOCAL".to_string(),
            user_metadata: BTreeMap::new(),
        })
    }

    async fn download_to(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<u64> {
        let path = self.object_path(bucket, key)?;
        match fs::copy(&path, dest).await {
            Ok(written) => Ok(written),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(bucket, key))
            }
            Err(e) => Err(StorageError::DownloadFailed(e.to_string())),
        }
    }

    async fn probe_prefix(&self, bucket: &str, prefix: &str) -> StorageResult<usize> {
        let dir = self.object_path(bucket, prefix.trim_end_matches('/'))?;
        match fs::read_dir(&dir).await {
            Ok(mut entries) => Ok(usize::from(entries.next_entry().await?.is_some())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
