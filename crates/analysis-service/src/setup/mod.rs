//! Service wiring
//!
//! Builds every pipeline component from the configuration. Queue and database failures
//! are fatal here; an unreachable object store or a missing probe tool only warn.

pub mod database;
pub mod signal;

use analysis_core::WorkerConfig;
use analysis_processing::{check_probe, FfprobeProbe, MetadataExtractor};
use analysis_storage::{ObjectStoreClient, S3ObjectStore};
use analysis_worker::{
    Orchestrator, PipelineSettings, QueueClient, RecordTracker, ShutdownHandle, SqsQueueBackend,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

pub async fn initialize_service(
    config: &WorkerConfig,
    shutdown: &ShutdownHandle,
) -> Result<Orchestrator> {
    tracing::info!("Initializing analysis service...");

    tracing::info!("Initializing queue client...");
    let backend = SqsQueueBackend::connect(config.aws_region.clone(), &config.queue)
        .await
        .context("Failed to initialize SQS")?;
    let queue = QueueClient::new(Arc::new(backend), config.filter.clone(), &config.queue);

    tracing::info!("Initializing object store client...");
    let store = S3ObjectStore::new(config.aws_region.clone(), config.s3_endpoint.clone())
        .await
        .context("Failed to initialize S3 client")?;
    let scratch_dir = config.scratch.resolved_dir();
    tokio::fs::create_dir_all(&scratch_dir)
        .await
        .with_context(|| format!("Failed to create download directory {}", scratch_dir.display()))?;
    let storage = ObjectStoreClient::new(
        Arc::new(store),
        &config.filter.bucket,
        &config.filter.key_prefix,
        scratch_dir,
    );
    if let Err(e) = storage.check_connection().await {
        tracing::warn!(error = %e, "S3 connection test failed, continuing");
    }

    tracing::info!("Initializing metadata extractor...");
    let probe = FfprobeProbe::new(&config.probe);
    let status = check_probe(&probe).await;
    if status.available {
        tracing::info!(version = ?status.version, "ffprobe available");
    } else {
        tracing::warn!(
            error = ?status.error,
            "ffprobe not available, basic file analysis will be used"
        );
    }
    let extractor = MetadataExtractor::new(
        Arc::new(probe),
        Duration::from_millis(config.probe.placeholder_delay_ms),
    );

    tracing::info!("Initializing record store...");
    let records = database::setup_record_store(config).await?;

    tracing::info!("All services initialized successfully");
    Ok(Orchestrator::new(
        queue,
        storage,
        extractor,
        RecordTracker::new(records),
        PipelineSettings::from_config(config),
        shutdown.signal(),
    ))
}
