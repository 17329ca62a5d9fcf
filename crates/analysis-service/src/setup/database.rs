//! Record store selection

use analysis_core::WorkerConfig;
use analysis_db::{connect_and_migrate, MemoryRecordStore, PgRecordStore, RecordStore};
use anyhow::{Context, Result};
use std::sync::Arc;

/// PostgreSQL when `DATABASE_URL` is set, otherwise the in-memory store.
pub async fn setup_record_store(config: &WorkerConfig) -> Result<Arc<dyn RecordStore>> {
    let upload_prefix = config.filter.key_prefix.clone();
    match &config.database.url {
        Some(url) => {
            let pool = connect_and_migrate(url, config.database.max_connections)
                .await
                .context("Failed to set up database")?;
            Ok(Arc::new(PgRecordStore::new(pool, upload_prefix)))
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set; processing records are kept in memory and lost on exit"
            );
            Ok(Arc::new(MemoryRecordStore::new(upload_prefix)))
        }
    }
}
