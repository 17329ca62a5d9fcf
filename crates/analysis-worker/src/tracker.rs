use analysis_core::{ProcessingStatus, RecordId, RecordStats};
use analysis_db::{RecordStore, RecordStoreError};
use std::sync::Arc;

/// Record bookkeeping for the pipeline.
///
/// Persistence failures are logged and swallowed: losing an audit row must not stop a
/// message from being processed or acknowledged.
#[derive(Clone)]
pub struct RecordTracker {
    store: Arc<dyn RecordStore>,
}

impl RecordTracker {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn is_durable(&self) -> bool {
        self.store.is_durable()
    }

    /// Open a `processing` record. `None` if it could not be persisted.
    pub async fn begin(&self, bucket: &str, key: &str) -> Option<RecordId> {
        match self.store.create_record(bucket, key, None).await {
            Ok(id) => {
                tracing::info!(record_id = id, bucket = %bucket, key = %key, "Processing record created");
                Some(id)
            }
            Err(e) => {
                tracing::error!(error = %e, bucket = %bucket, key = %key, "Failed to create processing record");
                None
            }
        }
    }

    pub async fn complete(&self, id: Option<RecordId>, metadata: serde_json::Value) {
        self.finish(id, ProcessingStatus::Completed, Some(metadata), None)
            .await;
    }

    pub async fn fail(&self, id: Option<RecordId>, error: &str) {
        self.finish(id, ProcessingStatus::Failed, None, Some(error))
            .await;
    }

    async fn finish(
        &self,
        id: Option<RecordId>,
        status: ProcessingStatus,
        metadata: Option<serde_json::Value>,
        error: Option<&str>,
    ) {
        let Some(id) = id else {
            tracing::debug!(status = %status, "No processing record to update");
            return;
        };
        match self.store.update_status(id, status, metadata, error).await {
            Ok(()) => tracing::info!(record_id = id, status = %status, "Processing record updated"),
            Err(RecordStoreError::NotFound(_)) => {
                tracing::warn!(record_id = id, "Processing record not found for update")
            }
            Err(e) => {
                tracing::error!(record_id = id, status = %status, error = %e, "Failed to update processing record")
            }
        }
    }

    /// Store-wide counts; `None` if the store could not be queried.
    pub async fn stats(&self) -> Option<RecordStats> {
        match self.store.stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::error!(error = %e, "Failed to get processing stats");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_db::MemoryRecordStore;

    #[tokio::test]
    async fn missing_record_is_a_logged_no_op() {
        let tracker = RecordTracker::new(Arc::new(MemoryRecordStore::new("uploads")));
        tracker.fail(Some(99), "boom").await;
        tracker.complete(None, serde_json::json!({})).await;
        assert_eq!(tracker.stats().await.unwrap().total_records, 0);
    }

    #[tokio::test]
    async fn second_termination_is_swallowed() {
        let store = Arc::new(MemoryRecordStore::new("uploads"));
        let tracker = RecordTracker::new(store.clone());
        let id = tracker.begin("uploads", "uploads/u/s/a.mp4").await;
        tracker.complete(id, serde_json::json!({"ok": true})).await;
        tracker.fail(id, "late failure").await;

        let record = store.get_record(id.unwrap()).await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Completed);
        assert_eq!(record.retry_count, 0);
    }
}
