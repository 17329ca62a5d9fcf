use crate::error::{RecordStoreError, RecordStoreResult};
use crate::store::{is_allowed_transition, resolve_upload_id, RecordStore, RECENT_RECORDS_LIMIT};
use analysis_core::{
    ProcessingRecord, ProcessingStatus, RecordId, RecordStats, RecordSummary, StatusCounts,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    next_id: RecordId,
    records: BTreeMap<RecordId, ProcessingRecord>,
}

/// Process-local record store. Records are lost on restart.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    upload_prefix: String,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRecordStore {
    pub fn new(upload_prefix: impl Into<String>) -> Self {
        Self {
            upload_prefix: upload_prefix.into(),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves the map consistent; keep using it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of every record, ordered by id.
    pub fn records(&self) -> Vec<ProcessingRecord> {
        self.lock().records.values().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create_record(
        &self,
        bucket: &str,
        key: &str,
        upload_id: Option<&str>,
    ) -> RecordStoreResult<RecordId> {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.records.insert(
            id,
            ProcessingRecord {
                id,
                upload_id: resolve_upload_id(upload_id, key, &self.upload_prefix),
                source_bucket: bucket.to_string(),
                source_key: key.to_string(),
                status: ProcessingStatus::Processing,
                started_at: Utc::now(),
                completed_at: None,
                metadata_blob: None,
                error_text: None,
                retry_count: 0,
            },
        );
        Ok(id)
    }

    async fn update_status(
        &self,
        id: RecordId,
        status: ProcessingStatus,
        metadata: Option<serde_json::Value>,
        error: Option<&str>,
    ) -> RecordStoreResult<()> {
        let mut inner = self.lock();
        let record = inner
            .records
            .get_mut(&id)
            .ok_or(RecordStoreError::NotFound(id))?;

        if !is_allowed_transition(record.status, status) {
            return Err(RecordStoreError::InvalidTransition {
                id,
                from: record.status,
                to: status,
            });
        }

        record.status = status;
        record.completed_at = Some(Utc::now());
        match status {
            ProcessingStatus::Completed => {
                if metadata.is_some() {
                    record.metadata_blob = metadata;
                }
            }
            ProcessingStatus::Failed => {
                if let Some(error) = error {
                    record.error_text = Some(error.to_string());
                }
                record.retry_count += 1;
            }
            ProcessingStatus::Pending | ProcessingStatus::Processing => {}
        }
        Ok(())
    }

    async fn get_record(&self, id: RecordId) -> RecordStoreResult<Option<ProcessingRecord>> {
        Ok(self.lock().records.get(&id).cloned())
    }

    async fn stats(&self) -> RecordStoreResult<RecordStats> {
        let inner = self.lock();
        let mut status_counts = StatusCounts::default();
        for record in inner.records.values() {
            status_counts.add(record.status, 1);
        }

        let mut recent: Vec<&ProcessingRecord> = inner.records.values().collect();
        recent.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));

        Ok(RecordStats {
            total_records: inner.records.len() as i64,
            status_counts,
            recent_records: recent
                .into_iter()
                .take(RECENT_RECORDS_LIMIT)
                .map(RecordSummary::from)
                .collect(),
        })
    }

    async fn failed_records(&self, max_retries: i32) -> RecordStoreResult<Vec<ProcessingRecord>> {
        Ok(self
            .lock()
            .records
            .values()
            .filter(|r| r.status == ProcessingStatus::Failed && r.retry_count < max_retries)
            .cloned()
            .collect())
    }

    fn is_durable(&self) -> bool {
        false
    }
}
