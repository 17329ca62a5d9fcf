//! Processing record persistence
//!
//! [`RecordStore`] is implemented by [`PgRecordStore`] (PostgreSQL over sqlx, schema managed
//! by the workspace `migrations/` directory) and [`MemoryRecordStore`] (process-local, used
//! when no database is configured and in tests).

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{RecordStoreError, RecordStoreResult};
pub use memory::MemoryRecordStore;
pub use postgres::{connect_and_migrate, PgRecordStore};
pub use store::{upload_id_from_key, RecordStore, RECENT_RECORDS_LIMIT};
