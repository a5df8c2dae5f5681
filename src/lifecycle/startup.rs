//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration and the routing tree before anything starts
//! - Restore sessions from the last checkpoint
//! - Start background tasks (checkpoint, idle eviction, signal listener)
//! - Serve until shutdown, then write one final checkpoint

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::validation::{validate_config, Joined, ValidationError};
use crate::config::ServerConfig;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_listener;
use crate::observability::metrics;
use crate::routing::{ConfigurationError, Controller};
use crate::session::{checkpoint, CheckpointError, Checkpointer, SessionStore};

/// Errors that abort startup or serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", Joined(.0.as_slice()))]
    Config(Vec<ValidationError>),

    #[error("invalid routing tree: {}", Joined(.0.as_slice()))]
    Routing(Vec<ConfigurationError>),

    #[error("server failed: {0}")]
    Serve(#[from] std::io::Error),
}

/// Build the session store described by `config`, restoring the last
/// checkpoint if one is configured.
pub fn prepare_sessions(config: &ServerConfig) -> Arc<SessionStore> {
    let sessions = Arc::new(
        SessionStore::new(config.session.id_length)
            .adopt_unknown_ids(config.session.adopt_unknown_ids),
    );

    if let Some(path) = config.session.dump_path() {
        match checkpoint::restore(&sessions, path) {
            Ok(count) => tracing::info!(sessions = count, path = %path.display(), "Sessions restored"),
            Err(e) => tracing::error!(error = %e, "Could not restore sessions, starting empty"),
        }
    }

    sessions
}

fn spawn_idle_sweeper(
    sessions: Arc<SessionStore>,
    interval: Duration,
    max_idle: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => { sessions.evict_idle(max_idle); }
                _ = shutdown.recv() => break,
            }
        }
    });
}

/// Stop the periodic checkpoint task, wait for it to finish, then write one
/// last checkpoint.
///
/// Triggers `shutdown` itself so this also completes when serving failed
/// before any signal arrived.
pub async fn final_checkpoint(
    shutdown: &Shutdown,
    periodic: JoinHandle<()>,
    checkpointer: &Checkpointer,
) -> Result<usize, CheckpointError> {
    shutdown.trigger();
    if let Err(e) = periodic.await {
        tracing::warn!(error = %e, "Checkpoint task ended abnormally");
    }

    tracing::info!(path = %checkpointer.path().display(), "Writing final session checkpoint");
    checkpointer.checkpoint().await
}

/// Run the server for `root` until a termination signal arrives.
///
/// Returns once the final checkpoint has been written; the caller exits
/// with success status.
pub async fn run(root: Controller, config: ServerConfig) -> Result<(), StartupError> {
    validate_config(&config).map_err(StartupError::Config)?;

    if let Err(errors) = root.validate() {
        for e in &errors {
            tracing::error!(error = %e, "Invalid handler");
        }
        return Err(StartupError::Routing(errors));
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let sessions = prepare_sessions(&config);
    let shutdown = Shutdown::new();

    let checkpointer = config
        .session
        .dump_path()
        .map(|path| Arc::new(Checkpointer::new(sessions.clone(), path)));

    let periodic = match &checkpointer {
        Some(checkpointer) => Some(tokio::spawn(checkpointer.clone().run(
            config.session.checkpoint_interval(),
            config.session.idle_timeout(),
            shutdown.subscribe(),
        ))),
        None => {
            tracing::warn!("No session dump path configured, sessions will not survive restarts");
            if let Some(max_idle) = config.session.idle_timeout() {
                spawn_idle_sweeper(
                    sessions.clone(),
                    config.session.checkpoint_interval(),
                    max_idle,
                    shutdown.subscribe(),
                );
            }
            None
        }
    };

    let server_shutdown = shutdown.subscribe();
    spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(config, Arc::new(root), sessions);
    let served = server.run(server_shutdown).await;

    if let (Some(checkpointer), Some(periodic)) = (checkpointer, periodic) {
        let _ = final_checkpoint(&shutdown, periodic, &checkpointer).await;
    }

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}
