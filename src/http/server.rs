//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router that sends every path to the dispatcher
//! - Wire up middleware (tracing, request ID, optional timeout)
//! - Serve over TLS with graceful shutdown

use axum::{routing::any, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{AuthConfig, ServerConfig};
use crate::http::dispatcher::dispatch;
use crate::http::static_files::StaticFiles;
use crate::net::tls::load_tls_config;
use crate::routing::Controller;
use crate::session::{SessionCookie, SessionStore};

/// Application state injected into the dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub root: Arc<Controller>,
    pub sessions: Arc<SessionStore>,
    pub cookie: Arc<SessionCookie>,
    pub static_files: Arc<StaticFiles>,
    pub auth: Arc<AuthConfig>,
    pub max_body_size: usize,
}

impl AppState {
    pub fn new(config: &ServerConfig, root: Arc<Controller>, sessions: Arc<SessionStore>) -> Self {
        Self {
            root,
            sessions,
            cookie: Arc::new(SessionCookie::new(
                config.session.cookie_name.clone(),
                Duration::from_secs(config.session.cookie_ttl_secs),
            )),
            static_files: Arc::new(StaticFiles::new(config.static_root.clone())),
            auth: Arc::new(config.auth.clone()),
            max_body_size: config.security.max_body_size,
        }
    }
}

/// HTTPS server for the dispatcher.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server over an already validated routing tree.
    pub fn new(config: ServerConfig, root: Arc<Controller>, sessions: Arc<SessionStore>) -> Self {
        let state = AppState::new(&config, root, sessions);
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(state);

        if let Some(secs) = config.timeouts.request_secs {
            router = router.layer(TimeoutLayer::new(Duration::from_secs(secs)));
        }

        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve over TLS until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let tls = self.config.listener.tls.as_ref().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "listener.tls is required")
        })?;
        let rustls = load_tls_config(tls).await?;

        let addr: SocketAddr = self
            .config
            .listener
            .bind_address
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let handle = axum_server::Handle::new();
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!(grace_secs = grace.as_secs(), "Draining connections");
            shutdown_handle.graceful_shutdown(Some(grace));
        });

        tracing::info!(address = %addr, "HTTPS server starting");

        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}
