use crate::error::RecordStoreResult;
use analysis_core::{ProcessingRecord, ProcessingStatus, RecordId, RecordStats};
use async_trait::async_trait;

/// Number of records listed in [`RecordStats::recent_records`].
pub const RECENT_RECORDS_LIMIT: usize = 5;

/// Durable lifecycle record of each processing attempt.
///
/// Records are created in `processing` and terminated by exactly one update to
/// `completed` or `failed`. Nothing here deletes records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new attempt row in `processing` state.
    ///
    /// When `upload_id` is `None` it is derived from the key with [`upload_id_from_key`].
    async fn create_record(
        &self,
        bucket: &str,
        key: &str,
        upload_id: Option<&str>,
    ) -> RecordStoreResult<RecordId>;

    /// Terminate a record.
    ///
    /// `completed` stamps `completed_at` and stores `metadata`; `failed` stamps
    /// `completed_at`, stores `error` and increments `retry_count`.
    async fn update_status(
        &self,
        id: RecordId,
        status: ProcessingStatus,
        metadata: Option<serde_json::Value>,
        error: Option<&str>,
    ) -> RecordStoreResult<()>;

    async fn get_record(&self, id: RecordId) -> RecordStoreResult<Option<ProcessingRecord>>;

    /// Totals by status plus the most recently started records.
    async fn stats(&self) -> RecordStoreResult<RecordStats>;

    /// Failed records with `retry_count < max_retries`, oldest first.
    async fn failed_records(&self, max_retries: i32) -> RecordStoreResult<Vec<ProcessingRecord>>;

    /// Whether records survive a restart.
    fn is_durable(&self) -> bool;
}

/// Derive the upload id from a key of the form `{prefix}/{user}/{subject}/{upload_id}.ext`.
///
/// Needs at least four segments and a first segment equal to `prefix`. The id is the
/// filename up to its first `.`.
pub fn upload_id_from_key(key: &str, prefix: &str) -> Option<String> {
    let parts: Vec<&str> = key.split('/').collect();
    if parts.len() < 4 || parts[0] != prefix {
        return None;
    }
    let filename = parts[parts.len() - 1];
    let upload_id = filename.split('.').next().unwrap_or(filename);
    if upload_id.is_empty() {
        None
    } else {
        Some(upload_id.to_string())
    }
}

pub(crate) fn resolve_upload_id(explicit: Option<&str>, key: &str, prefix: &str) -> Option<String> {
    match explicit {
        Some(id) => Some(id.to_string()),
        None => upload_id_from_key(key, prefix),
    }
}

/// Only `processing -> completed` and `processing -> failed` are allowed.
pub(crate) fn is_allowed_transition(from: ProcessingStatus, to: ProcessingStatus) -> bool {
    from == ProcessingStatus::Processing && to.is_terminal()
}
