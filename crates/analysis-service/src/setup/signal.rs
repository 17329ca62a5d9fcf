use analysis_worker::ShutdownHandle;

/// Wait for Ctrl+C (SIGINT) or SIGTERM, then request a stop.
///
/// The worker finishes its current batch before exiting.
///
/// # Panics
/// - Panics if the Ctrl+C handler cannot be installed
/// - On Unix, panics if the SIGTERM handler cannot be installed
pub async fn request_on_signal(handle: ShutdownHandle) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Finishing in-flight work before shutting down...");
    handle.request();
}
