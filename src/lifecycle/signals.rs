//! OS signal handling.
//!
//! SIGINT and SIGTERM both mean "checkpoint and exit cleanly".

use crate::lifecycle::shutdown::Shutdown;

/// Resolve once an interrupt or terminate signal arrives.
pub async fn wait_for_termination() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to register SIGTERM handler, using Ctrl+C only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = ctrl_c.await {
            tracing::error!(error = %e, "Ctrl+C handler failed");
        }
    }
}

/// Spawn the listener that turns a termination signal into a shutdown trigger.
pub fn spawn_signal_listener(shutdown: Shutdown) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_termination().await;
        tracing::info!("Shutdown signal received");
        shutdown.trigger();
    })
}
