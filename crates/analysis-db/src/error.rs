use analysis_core::{ProcessingStatus, RecordId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("Processing record {0} not found")]
    NotFound(RecordId),

    #[error("Processing record {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: RecordId,
        from: ProcessingStatus,
        to: ProcessingStatus,
    },

    #[error("Failed to serialize metadata: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type RecordStoreResult<T> = Result<T, RecordStoreError>;
