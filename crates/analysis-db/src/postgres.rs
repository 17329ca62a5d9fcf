//! PostgreSQL record store over sqlx.

use crate::error::{RecordStoreError, RecordStoreResult};
use crate::store::{resolve_upload_id, RecordStore, RECENT_RECORDS_LIMIT};
use analysis_core::{
    ProcessingRecord, ProcessingStatus, RecordId, RecordStats, RecordSummary, StatusCounts,
};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use std::path::Path;
use std::time::Duration;

const RECORD_COLUMNS: &str = "id, upload_id, source_bucket, source_key, status, started_at, \
     completed_at, metadata_blob, error_text, retry_count";

/// Connect a pool and apply pending migrations from the workspace `migrations/` directory.
pub async fn connect_and_migrate(url: &str, max_connections: u32) -> RecordStoreResult<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(url)
        .await?;

    tracing::info!(max_connections, "Database connected successfully");

    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// Repository for the `processing_records` table.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
    upload_prefix: String,
}

impl PgRecordStore {
    pub fn new(pool: PgPool, upload_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            upload_prefix: upload_prefix.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    #[tracing::instrument(skip(self), fields(db.table = "processing_records"))]
    async fn create_record(
        &self,
        bucket: &str,
        key: &str,
        upload_id: Option<&str>,
    ) -> RecordStoreResult<RecordId> {
        let upload_id = resolve_upload_id(upload_id, key, &self.upload_prefix);
        let (id,): (RecordId,) = sqlx::query_as::<Postgres, (RecordId,)>(
            r#"
            INSERT INTO processing_records (upload_id, source_bucket, source_key, status, started_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id
            "#,
        )
        .bind(&upload_id)
        .bind(bucket)
        .bind(key)
        .bind(ProcessingStatus::Processing)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(record_id = id, upload_id = ?upload_id, "Processing record created");
        Ok(id)
    }

    #[tracing::instrument(
        skip(self, metadata),
        fields(db.table = "processing_records", db.record_id = id)
    )]
    async fn update_status(
        &self,
        id: RecordId,
        status: ProcessingStatus,
        metadata: Option<serde_json::Value>,
        error: Option<&str>,
    ) -> RecordStoreResult<()> {
        let updated: Option<(RecordId,)> = match status {
            ProcessingStatus::Completed => {
                sqlx::query_as::<Postgres, (RecordId,)>(
                    r#"
                    UPDATE processing_records
                    SET status = $2,
                        completed_at = NOW(),
                        metadata_blob = COALESCE($3, metadata_blob)
                    WHERE id = $1 AND status = 'processing'
                    RETURNING id
                    "#,
                )
                .bind(id)
                .bind(status)
                .bind(&metadata)
                .fetch_optional(&self.pool)
                .await?
            }
            ProcessingStatus::Failed => {
                sqlx::query_as::<Postgres, (RecordId,)>(
                    r#"
                    UPDATE processing_records
                    SET status = $2,
                        completed_at = NOW(),
                        error_text = COALESCE($3, error_text),
                        retry_count = retry_count + 1
                    WHERE id = $1 AND status = 'processing'
                    RETURNING id
                    "#,
                )
                .bind(id)
                .bind(status)
                .bind(error)
                .fetch_optional(&self.pool)
                .await?
            }
            ProcessingStatus::Pending | ProcessingStatus::Processing => None,
        };

        if updated.is_some() {
            return Ok(());
        }

        let current: Option<(ProcessingStatus,)> = sqlx::query_as::<Postgres, (ProcessingStatus,)>(
            "SELECT status FROM processing_records WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match current {
            None => Err(RecordStoreError::NotFound(id)),
            Some((from,)) => Err(RecordStoreError::InvalidTransition {
                id,
                from,
                to: status,
            }),
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "processing_records", db.record_id = id))]
    async fn get_record(&self, id: RecordId) -> RecordStoreResult<Option<ProcessingRecord>> {
        let record = sqlx::query_as::<Postgres, ProcessingRecord>(&format!(
            "SELECT {} FROM processing_records WHERE id = $1",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "processing_records"))]
    async fn stats(&self) -> RecordStoreResult<RecordStats> {
        let rows: Vec<(ProcessingStatus, i64)> = sqlx::query_as::<Postgres, (ProcessingStatus, i64)>(
            "SELECT status, COUNT(*) FROM processing_records GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut status_counts = StatusCounts::default();
        for (status, count) in rows {
            status_counts.add(status, count);
        }

        let recent_records = sqlx::query_as::<Postgres, RecordSummary>(
            r#"
            SELECT id, upload_id, source_key, status, started_at, completed_at
            FROM processing_records
            ORDER BY started_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(RECENT_RECORDS_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(RecordStats {
            total_records: status_counts.total(),
            status_counts,
            recent_records,
        })
    }

    #[tracing::instrument(skip(self), fields(db.table = "processing_records"))]
    async fn failed_records(&self, max_retries: i32) -> RecordStoreResult<Vec<ProcessingRecord>> {
        let records = sqlx::query_as::<Postgres, ProcessingRecord>(&format!(
            "SELECT {} FROM processing_records \
             WHERE status = 'failed' AND retry_count < $1 \
             ORDER BY started_at ASC",
            RECORD_COLUMNS
        ))
        .bind(max_retries)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    fn is_durable(&self) -> bool {
        true
    }
}
