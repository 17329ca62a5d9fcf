use crate::traits::{ObjectStore, StorageError, StorageResult};
use analysis_core::ObjectAttributes;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::Client;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// S3 object store
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Create a new S3ObjectStore instance
    ///
    /// # Arguments
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    ///
    /// Credentials come from the default provider chain.
    pub async fn new(region: String, endpoint_url: Option<String>) -> StorageResult<Self> {
        let region_provider = RegionProviderChain::first_try(aws_config::Region::new(region));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config.clone())
            .load()
            .await;

        let client = if let Some(ref endpoint) = endpoint_url {
            // S3-compatible providers need path-style addressing
            let mut s3_config_builder = aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .endpoint_url(endpoint)
                .region(config.region().cloned())
                .retry_config(retry_config)
                .force_path_style(true);
            if let Some(provider) = config.credentials_provider() {
                s3_config_builder = s3_config_builder.credentials_provider(provider);
            }
            Client::from_conf(s3_config_builder.build())
        } else {
            Client::new(&config)
        };

        tracing::info!(
            endpoint = ?endpoint_url,
            "S3 client initialized"
        );

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

/// 403 responses to HEAD carry no body, so the status code is the only signal.
fn is_access_denied<E: ProvideErrorMetadata>(err: &SdkError<E, HttpResponse>) -> bool {
    if err.code() == Some("AccessDenied") {
        return true;
    }
    err.raw_response()
        .map(|response| response.status().as_u16() == 403)
        .unwrap_or(false)
}

fn to_chrono(value: &aws_sdk_s3::primitives::DateTime) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[tracing::instrument(skip(self), fields(storage.backend = "s3"))]
    async fn head(&self, bucket: &str, key: &str) -> StorageResult<ObjectAttributes> {
        let start = std::time::Instant::now();

        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let not_found = matches!(
                    &e,
                    SdkError::ServiceError(service_err)
                        if matches!(service_err.err(), HeadObjectError::NotFound(_))
                );
                if not_found {
                    StorageError::not_found(bucket, key)
                } else if is_access_denied(&e) {
                    StorageError::access_denied(bucket, key)
                } else {
                    tracing::error!(
                        error = %DisplayErrorContext(&e),
                        bucket = %bucket,
                        key = %key,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "S3 head_object failed"
                    );
                    StorageError::Backend(DisplayErrorContext(&e).to_string())
                }
            })?;

        let user_metadata: BTreeMap<String, String> = response
            .metadata()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        Ok(ObjectAttributes {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: response.content_length().unwrap_or(0).max(0) as u64,
            content_type: response
                .content_type()
                .unwrap_or("unknown")
                .to_string(),
            last_modified: response.last_modified().and_then(to_chrono),
            etag: response.e_tag().unwrap_or_default().trim_matches('"').to_string(),
            storage_class: response
                .storage_class()
                .map(|c| c.as_str().to_string())
                .unwrap_or_else(|| "STANDARD".to_string()),
            user_metadata,
        })
    }

    #[tracing::instrument(skip(self, dest), fields(storage.backend = "s3", dest = %dest.display()))]
    async fn download_to(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<u64> {
        let start = std::time::Instant::now();

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let not_found = matches!(
                    &e,
                    SdkError::ServiceError(service_err)
                        if matches!(service_err.err(), GetObjectError::NoSuchKey(_))
                );
                if not_found {
                    StorageError::not_found(bucket, key)
                } else if is_access_denied(&e) {
                    StorageError::access_denied(bucket, key)
                } else {
                    tracing::error!(
                        error = %DisplayErrorContext(&e),
                        bucket = %bucket,
                        key = %key,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "S3 download failed"
                    );
                    StorageError::DownloadFailed(DisplayErrorContext(&e).to_string())
                }
            })?;

        let mut reader = response.body.into_async_read();
        let mut file = tokio::fs::File::create(dest).await?;
        let written = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
        file.flush().await?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(written)
    }

    async fn probe_prefix(&self, bucket: &str, prefix: &str) -> StorageResult<usize> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| StorageError::Backend(DisplayErrorContext(&e).to_string()))?;

        Ok(response.key_count().unwrap_or(0).max(0) as usize)
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
