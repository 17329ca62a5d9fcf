//! Shared helpers for the operator binaries.

use analysis_core::{load_dotenv, LogFormat, WorkerConfig};
use analysis_db::{connect_and_migrate, PgRecordStore};
use anyhow::{Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Initialize tracing for CLI binaries. Loads `.env` first so `RUST_LOG` from it applies.
pub fn init_tracing() {
    load_dotenv();
    if let Err(e) = analysis_infra::init_telemetry(LogFormat::Text) {
        eprintln!("Warning: tracing already initialized: {}", e);
    }
}

/// Load `.env` when present and read the worker configuration.
pub fn load_config() -> Result<WorkerConfig> {
    load_dotenv();
    WorkerConfig::from_env().context("Invalid configuration")
}

/// Open the durable record store. Operator tools never fall back to memory.
pub async fn open_record_store(config: &WorkerConfig) -> Result<PgRecordStore> {
    let url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL is not set")?;
    let pool = connect_and_migrate(url, config.database.max_connections)
        .await
        .context("Failed to connect to database")?;
    Ok(PgRecordStore::new(pool, config.filter.key_prefix.clone()))
}

/// Truncate to `max_len` characters, ending in "..." when shortened.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate_string("clip.mp4", 10), "clip.mp4");
        assert_eq!(truncate_string("", 5), "");
    }

    #[test]
    fn truncate_long_keys() {
        assert_eq!(truncate_string("uploads/u1/s1/abc.mp4", 10), "uploads...");
        assert_eq!(truncate_string("abc", 2), "...");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate_string("vidéo-très-longue.mp4", 8), "vidéo...");
    }
}
