//! Test helpers: in-memory queue, unavailable probe and a pipeline wired to a local
//! object store under a temporary directory.
//!
//! Run with: `cargo test -p analysis-worker --test pipeline_test`

use analysis_core::{
    AckPolicy, EventFilter, ObjectAttributes, ProbeMetadata, QueueConfig, QueueStats,
};
use analysis_db::MemoryRecordStore;
use analysis_processing::{MetadataExtractor, MetadataProbe, ProbeError};
use analysis_storage::{LocalObjectStore, ObjectStore, ObjectStoreClient, StorageResult};
use analysis_worker::{
    Orchestrator, PipelineSettings, QueueBackend, QueueClient, QueueError, RawMessage,
    ReceiveOptions, RecordTracker, ShutdownHandle,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const BUCKET: &str = "uploads";
pub const PREFIX: &str = "uploads";

/// Queue serving pre-loaded batches, one per receive call.
#[derive(Default)]
pub struct FakeQueue {
    batches: Mutex<VecDeque<Vec<RawMessage>>>,
    outstanding: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<String>>,
    sent: Mutex<Vec<String>>,
    receive_calls: AtomicUsize,
    fail_receive: AtomicBool,
    fail_attributes: AtomicBool,
}

impl FakeQueue {
    pub fn push_batch(&self, batch: Vec<RawMessage>) {
        let mut outstanding = self.outstanding.lock().unwrap();
        for message in &batch {
            outstanding.insert(message.receipt_handle.clone());
        }
        self.batches.lock().unwrap().push_back(batch);
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn receive_calls(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }

    pub fn fail_receive(&self) {
        self.fail_receive.store(true, Ordering::SeqCst);
    }

    pub fn fail_attributes(&self) {
        self.fail_attributes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueueBackend for FakeQueue {
    async fn receive(&self, options: ReceiveOptions) -> Result<Vec<RawMessage>, QueueError> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_receive.load(Ordering::SeqCst) {
            return Err(QueueError::Backend("connection reset".to_string()));
        }
        let mut batch = self.batches.lock().unwrap().pop_front().unwrap_or_default();
        batch.truncate(options.max_messages as usize);
        Ok(batch)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        if !self.outstanding.lock().unwrap().remove(receipt_handle) {
            return Err(QueueError::InvalidReceipt);
        }
        self.deleted.lock().unwrap().push(receipt_handle.to_string());
        Ok(())
    }

    async fn attributes(&self) -> Result<QueueStats, QueueError> {
        if self.fail_attributes.load(Ordering::SeqCst) {
            return Err(QueueError::Backend("access denied".to_string()));
        }
        let visible: usize = self.batches.lock().unwrap().iter().map(Vec::len).sum();
        Ok(QueueStats {
            approx_visible: Some(visible as u64),
            approx_in_flight: Some(self.outstanding.lock().unwrap().len() as u64),
            approx_delayed: Some(0),
        })
    }

    async fn send(&self, body: &str) -> Result<String, QueueError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(body.to_string());
        Ok(format!("sent-{}", sent.len()))
    }

    fn queue_url(&self) -> &str {
        "memory://test-queue"
    }
}

/// Probe that behaves like a host without ffprobe installed.
pub struct UnavailableProbe;

#[async_trait]
impl MetadataProbe for UnavailableProbe {
    async fn version(&self) -> Result<String, ProbeError> {
        Err(ProbeError::Unavailable("not installed".to_string()))
    }

    async fn probe(&self, _path: &Path) -> Result<ProbeMetadata, ProbeError> {
        Err(ProbeError::Unavailable("not installed".to_string()))
    }
}

/// Local store that counts metadata lookups.
pub struct CountingStore {
    inner: LocalObjectStore,
    heads: Arc<AtomicUsize>,
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn head(&self, bucket: &str, key: &str) -> StorageResult<ObjectAttributes> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        self.inner.head(bucket, key).await
    }

    async fn download_to(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<u64> {
        self.inner.download_to(bucket, key, dest).await
    }

    async fn probe_prefix(&self, bucket: &str, prefix: &str) -> StorageResult<usize> {
        self.inner.probe_prefix(bucket, prefix).await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

pub fn filter() -> EventFilter {
    EventFilter {
        expected_source: "aws:s3".to_string(),
        expected_event_prefix: "ObjectCreated".to_string(),
        bucket: BUCKET.to_string(),
        key_prefix: PREFIX.to_string(),
    }
}

pub fn queue_config() -> QueueConfig {
    QueueConfig {
        queue_url: Some("memory://test-queue".to_string()),
        queue_name: None,
        wait_time_secs: 0,
        visibility_timeout_secs: 30,
        max_messages: 10,
    }
}

pub fn settings() -> PipelineSettings {
    PipelineSettings {
        max_messages: 10,
        poll_interval: Duration::from_millis(1),
        max_runtime: None,
        ack_policy: AckPolicy::Always,
        cleanup_after_processing: true,
        status_interval_cycles: 0,
    }
}

pub fn s3_message(id: &str, bucket: &str, key: &str) -> RawMessage {
    let body = json!({
        "Records": [{
            "eventSource": "aws:s3",
            "eventName": "ObjectCreated:Put",
            "eventTime": "2024-06-01T12:00:00.000Z",
            "awsRegion": "us-east-1",
            "s3": {
                "bucket": {"name": bucket},
                "object": {"key": key, "size": 11, "eTag": "etag-1"}
            }
        }]
    });
    raw_message(id, body)
}

pub fn raw_message(id: &str, body: Value) -> RawMessage {
    RawMessage {
        message_id: id.to_string(),
        receipt_handle: format!("receipt-{}", id),
        body: body.to_string(),
    }
}

pub struct TestPipeline {
    pub orchestrator: Orchestrator,
    pub queue: Arc<FakeQueue>,
    pub records: MemoryRecordStore,
    pub shutdown: ShutdownHandle,
    pub objects: TempDir,
    pub scratch: TempDir,
    heads: Arc<AtomicUsize>,
}

impl TestPipeline {
    pub async fn new(settings: PipelineSettings) -> Self {
        Self::with_extraction_delay(settings, Duration::ZERO).await
    }

    /// Pipeline whose extraction takes at least `delay` per event.
    pub async fn with_extraction_delay(settings: PipelineSettings, delay: Duration) -> Self {
        let objects = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let queue = Arc::new(FakeQueue::default());
        let records = MemoryRecordStore::new(PREFIX);
        let shutdown = ShutdownHandle::new();

        let heads = Arc::new(AtomicUsize::new(0));
        let store = CountingStore {
            inner: LocalObjectStore::new(objects.path()).await.unwrap(),
            heads: heads.clone(),
        };
        let storage = ObjectStoreClient::new(Arc::new(store), BUCKET, PREFIX, scratch.path());
        let extractor = MetadataExtractor::new(Arc::new(UnavailableProbe), delay);

        let orchestrator = Orchestrator::new(
            QueueClient::new(queue.clone(), filter(), &queue_config()),
            storage,
            extractor,
            RecordTracker::new(Arc::new(records.clone())),
            settings,
            shutdown.signal(),
        );

        Self {
            orchestrator,
            queue,
            records,
            shutdown,
            objects,
            scratch,
            heads,
        }
    }

    /// Metadata lookups made against the object store so far.
    pub fn head_calls(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    /// Place an object in the local store.
    pub fn put_object(&self, key: &str, body: &[u8]) -> PathBuf {
        let path = self.objects.path().join(BUCKET).join(key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, body).unwrap();
        path
    }

    pub fn scratch_files(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }
}
