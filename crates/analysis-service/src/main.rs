mod setup;

use analysis_core::{load_dotenv, WorkerConfig};
use analysis_infra::{init_telemetry, shutdown_telemetry};
use analysis_worker::ShutdownHandle;
use anyhow::Context;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let env_file = load_dotenv();
    let config = WorkerConfig::from_env();

    // Logging comes up before the config is checked so a bad config is reported through it.
    let log_format = config.as_ref().map(|c| c.log_format).unwrap_or_default();
    init_telemetry(log_format).context("Failed to initialize telemetry")?;

    match env_file {
        Some(path) => tracing::info!(path = %path.display(), "Loaded environment file"),
        None => tracing::info!("No .env file found, using process environment"),
    }

    let config = config.map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        e
    })?;
    config.log_summary();

    let shutdown = ShutdownHandle::new();
    let mut orchestrator = setup::initialize_service(&config, &shutdown)
        .await
        .map_err(|e| {
            tracing::error!(error = %format!("{:#}", e), "Failed to initialize services");
            e
        })?;

    tokio::spawn(setup::signal::request_on_signal(shutdown.clone()));

    let summary = orchestrator.run().await;
    tracing::info!(
        reason = %summary.reason,
        elapsed_secs = summary.elapsed.as_secs(),
        messages_processed = summary.stats.messages_processed,
        processing_errors = summary.stats.processing_errors,
        messages_rejected = summary.stats.messages_rejected,
        "Analysis service stopped"
    );

    shutdown_telemetry().await;
    Ok(())
}
