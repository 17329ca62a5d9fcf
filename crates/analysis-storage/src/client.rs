//! Download, cleanup and scratch statistics on top of an [`ObjectStore`].

use crate::keys::local_file_name;
use crate::scratch::collect_dir_stats;
use crate::traits::{ObjectStore, StorageError, StorageResult};
use analysis_core::{DirStats, ObjectAttributes};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

#[derive(Clone)]
pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: String,
    scratch_dir: PathBuf,
}

impl ObjectStoreClient {
    /// `bucket` and `prefix` are only used by [`Self::check_connection`]; every other
    /// operation takes the bucket explicitly.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            prefix: prefix.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Object attributes without downloading the body.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_metadata(&self, bucket: &str, key: &str) -> StorageResult<ObjectAttributes> {
        match self.store.head(bucket, key).await {
            Ok(attrs) => {
                tracing::info!(
                    bucket = %bucket,
                    key = %key,
                    size_bytes = attrs.size,
                    content_type = %attrs.content_type,
                    "Retrieved object metadata"
                );
                Ok(attrs)
            }
            Err(e) => {
                match &e {
                    StorageError::NotFound { .. } => {
                        tracing::error!(bucket = %bucket, key = %key, "Object not found")
                    }
                    StorageError::AccessDenied { .. } => {
                        tracing::error!(bucket = %bucket, key = %key, "Access denied to object")
                    }
                    other => {
                        tracing::error!(
                            bucket = %bucket,
                            key = %key,
                            error = %other,
                            "Failed to get object metadata"
                        )
                    }
                }
                Err(e)
            }
        }
    }

    /// Download an object into the scratch directory, or to `dest` when given.
    ///
    /// Overwrites an existing file. Fails when the written file is missing or empty.
    pub async fn download(
        &self,
        bucket: &str,
        key: &str,
        dest: Option<&Path>,
    ) -> StorageResult<PathBuf> {
        self.download_with_attributes(bucket, key, dest)
            .await
            .map(|(path, _)| path)
    }

    /// Like [`Self::download`], also returning the attributes read by the pre-check.
    ///
    /// The attributes are `None` when the pre-check failed transiently. A failed
    /// transfer leaves nothing behind at the destination.
    #[tracing::instrument(skip(self, dest))]
    pub async fn download_with_attributes(
        &self,
        bucket: &str,
        key: &str,
        dest: Option<&Path>,
    ) -> StorageResult<(PathBuf, Option<ObjectAttributes>)> {
        let dest = match dest {
            Some(path) => path.to_path_buf(),
            None => self.scratch_dir.join(local_file_name(key)?),
        };
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        tracing::info!(
            bucket = %bucket,
            key = %key,
            dest = %dest.display(),
            backend = self.store.backend_name(),
            "Downloading object"
        );

        let attributes = match self.store.head(bucket, key).await {
            Ok(attrs) => {
                tracing::info!(
                    size_bytes = attrs.size,
                    content_type = %attrs.content_type,
                    "Object pre-check passed"
                );
                Some(attrs)
            }
            Err(e) if e.is_permanent() => {
                tracing::error!(bucket = %bucket, key = %key, error = %e, "Object pre-check failed");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not get object metadata, downloading anyway");
                None
            }
        };

        if let Err(e) = self.store.download_to(bucket, key, &dest).await {
            tracing::error!(bucket = %bucket, key = %key, error = %e, "Download failed");
            discard_partial(&dest).await;
            return Err(e);
        }

        let size = match fs::metadata(&dest).await {
            Ok(meta) => meta.len(),
            Err(_) => {
                tracing::error!(dest = %dest.display(), "Download completed but file not found locally");
                return Err(StorageError::DownloadFailed(format!(
                    "file not found after download: {}",
                    dest.display()
                )));
            }
        };
        if size == 0 {
            tracing::error!(dest = %dest.display(), "Downloaded file is empty");
            discard_partial(&dest).await;
            return Err(StorageError::EmptyDownload(dest.display().to_string()));
        }

        tracing::info!(size_bytes = size, dest = %dest.display(), "Download verified");
        Ok((dest, attributes))
    }

    /// Remove a local copy. Returns whether a file was deleted.
    pub async fn cleanup(&self, path: &Path) -> bool {
        match fs::remove_file(path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Cleaned up file");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "File not found for cleanup");
                false
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to clean up file");
                false
            }
        }
    }

    /// Scratch directory usage. Never fails.
    pub async fn dir_stats(&self) -> DirStats {
        let dir = self.scratch_dir.clone();
        match tokio::task::spawn_blocking(move || collect_dir_stats(&dir)).await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!(error = %e, "Scratch directory walk aborted");
                DirStats {
                    dir: self.scratch_dir.clone(),
                    exists: false,
                    file_count: 0,
                    total_bytes: 0,
                }
            }
        }
    }

    /// List at most one object under the configured `{prefix}/`.
    pub async fn check_connection(&self) -> StorageResult<()> {
        let prefix = format!("{}/", self.prefix);
        let listed = self.store.probe_prefix(&self.bucket, &prefix).await?;
        tracing::info!(
            bucket = %self.bucket,
            prefix = %prefix,
            listed,
            backend = self.store.backend_name(),
            "Object store connection verified"
        );
        Ok(())
    }
}

/// Remove whatever a failed transfer left at `dest`.
async fn discard_partial(dest: &Path) {
    match fs::remove_file(dest).await {
        Ok(()) => tracing::debug!(dest = %dest.display(), "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(dest = %dest.display(), error = %e, "Failed to remove partial download")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        head_error: Mutex<Option<fn() -> StorageError>>,
        /// Write the body, then report a transfer error.
        fail_after_write: Mutex<bool>,
    }

    impl FakeStore {
        fn with(key: &str, body: &[u8]) -> Self {
            let store = Self::default();
            store
                .objects
                .lock()
                .unwrap()
                .insert(key.to_string(), body.to_vec());
            store
        }
    }

    #[async_trait]
    impl ObjectStore for FakeStore {
        async fn head(&self, bucket: &str, key: &str) -> StorageResult<ObjectAttributes> {
            if let Some(make) = *self.head_error.lock().unwrap() {
                return Err(make());
            }
            let objects = self.objects.lock().unwrap();
            let body = objects
                .get(key)
                .ok_or_else(|| StorageError::not_found(bucket, key))?;
            Ok(ObjectAttributes {
                bucket: bucket.to_string(),
                key: key.to_string(),
                size: body.len() as u64,
                content_type: "video/mp4".to_string(),
                last_modified: None,
                etag: "abc".to_string(),
                storage_class: "STANDARD".to_string(),
                user_metadata: BTreeMap::new(),
            })
        }

        async fn download_to(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<u64> {
            let body = self
                .objects
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| StorageError::not_found(bucket, key))?;
            std::fs::write(dest, &body)?;
            if *self.fail_after_write.lock().unwrap() {
                return Err(StorageError::DownloadFailed("connection reset".into()));
            }
            Ok(body.len() as u64)
        }

        async fn probe_prefix(&self, _bucket: &str, prefix: &str) -> StorageResult<usize> {
            let objects = self.objects.lock().unwrap();
            Ok(usize::from(objects.keys().any(|k| k.starts_with(prefix))))
        }

        fn backend_name(&self) -> &'static str {
            "fake"
        }
    }

    fn client(store: FakeStore, dir: &TempDir) -> ObjectStoreClient {
        ObjectStoreClient::new(
            Arc::new(store),
            "uploads",
            "uploads",
            dir.path().join("scratch"),
        )
    }

    #[tokio::test]
    async fn download_lands_in_scratch_dir_under_key_file_name() {
        let dir = TempDir::new().unwrap();
        let client = client(FakeStore::with("uploads/u1/s1/abc.mp4", b"video"), &dir);

        let path = client
            .download("uploads", "uploads/u1/s1/abc.mp4", None)
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("scratch").join("abc.mp4"));
        assert_eq!(std::fs::read(&path).unwrap(), b"video");
    }

    #[tokio::test]
    async fn download_of_missing_object_is_not_found() {
        let dir = TempDir::new().unwrap();
        let client = client(FakeStore::default(), &dir);

        let err = client
            .download("uploads", "uploads/u1/s1/missing.mp4", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn empty_download_fails_verification() {
        let dir = TempDir::new().unwrap();
        let client = client(FakeStore::with("uploads/u1/s1/empty.mp4", b""), &dir);

        let err = client
            .download("uploads", "uploads/u1/s1/empty.mp4", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::EmptyDownload(_)));
        assert!(!dir.path().join("scratch/empty.mp4").exists());
    }

    #[tokio::test]
    async fn interrupted_transfer_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let store = FakeStore::with("uploads/u1/s1/abc.mp4", b"partial");
        *store.fail_after_write.lock().unwrap() = true;
        let client = client(store, &dir);

        let err = client
            .download("uploads", "uploads/u1/s1/abc.mp4", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DownloadFailed(_)));
        assert!(!dir.path().join("scratch/abc.mp4").exists());
        assert_eq!(client.dir_stats().await.file_count, 0);
    }

    #[tokio::test]
    async fn download_returns_precheck_attributes() {
        let dir = TempDir::new().unwrap();
        let client = client(FakeStore::with("uploads/u1/s1/abc.mp4", b"video"), &dir);

        let (path, attrs) = client
            .download_with_attributes("uploads", "uploads/u1/s1/abc.mp4", None)
            .await
            .unwrap();
        assert!(path.exists());
        let attrs = attrs.unwrap();
        assert_eq!(attrs.size, 5);
        assert_eq!(attrs.etag, "abc");
    }

    #[tokio::test]
    async fn transient_precheck_failure_still_downloads() {
        let dir = TempDir::new().unwrap();
        let store = FakeStore::with("uploads/u1/s1/abc.mp4", b"video");
        *store.head_error.lock().unwrap() = Some(|| StorageError::Backend("throttled".into()));
        let client = client(store, &dir);

        let (path, attrs) = client
            .download_with_attributes("uploads", "uploads/u1/s1/abc.mp4", None)
            .await
            .unwrap();
        assert!(path.exists());
        assert!(attrs.is_none());
    }

    #[tokio::test]
    async fn access_denied_precheck_aborts() {
        let dir = TempDir::new().unwrap();
        let store = FakeStore::with("uploads/u1/s1/abc.mp4", b"video");
        *store.head_error.lock().unwrap() =
            Some(|| StorageError::access_denied("uploads", "uploads/u1/s1/abc.mp4"));
        let client = client(store, &dir);

        let err = client
            .download("uploads", "uploads/u1/s1/abc.mp4", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AccessDenied { .. }));
        assert!(!dir.path().join("scratch/abc.mp4").exists());
    }

    #[tokio::test]
    async fn cleanup_reports_whether_a_file_was_removed() {
        let dir = TempDir::new().unwrap();
        let client = client(FakeStore::with("uploads/a.mp4", b"x"), &dir);
        let path = client.download("uploads", "uploads/a.mp4", None).await.unwrap();

        assert!(client.cleanup(&path).await);
        assert!(!client.cleanup(&path).await);
    }

    #[tokio::test]
    async fn dir_stats_reflect_downloads() {
        let dir = TempDir::new().unwrap();
        let client = client(FakeStore::with("uploads/a.mp4", b"12345"), &dir);
        assert!(!client.dir_stats().await.exists);

        client.download("uploads", "uploads/a.mp4", None).await.unwrap();
        let stats = client.dir_stats().await;
        assert!(stats.exists);
        assert_eq!(stats.file_count, 1);
        assert_eq!(stats.total_bytes, 5);
    }

    #[tokio::test]
    async fn check_connection_lists_under_prefix() {
        let dir = TempDir::new().unwrap();
        let client = client(FakeStore::default(), &dir);
        assert!(client.check_connection().await.is_ok());
    }
}
