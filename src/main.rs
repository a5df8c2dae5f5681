//! web-dispatch server binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request (TLS)
//!     ──────────────────────▶ http::server ──▶ http::dispatcher
//!                                                 │
//!                         ┌───────────────────────┼─────────────────────┐
//!                         ▼                       ▼                     ▼
//!                  session::store         routing::resolver     http::static_files
//!                  (cookie binding)       (controller tree)     (dist fallback)
//!                         │
//!                         ▼
//!                  session::checkpoint ◀── lifecycle (interval + SIGTERM)
//! ```
//!
//! The binary serves a small demo application: `Login`, `Logout`, `Whoami`,
//! and an auth-gated `Account` controller.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde_json::json;

use web_dispatch::config::loader::load_config;
use web_dispatch::http::{BlobResponse, JsonResponse, Payload, RedirectResponse, RequestContext};
use web_dispatch::observability::logging::init_logging;
use web_dispatch::routing::HandlerResult;
use web_dispatch::{handler, Controller, ServerConfig, SessionHandle};

#[derive(Parser)]
#[command(name = "web-dispatch")]
#[command(about = "Session-aware HTTPS dispatcher", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "web-dispatch.toml")]
    config: PathBuf,
}

async fn login(session: SessionHandle, request: RequestContext) -> HandlerResult {
    let mut params = request.form_params();
    if params.is_empty() {
        params = request
            .json_params()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
            .collect();
    }

    let mut response = JsonResponse::new();
    match params.get("user").filter(|u| !u.is_empty()) {
        Some(user) => {
            session.set_user(user.as_str());
            tracing::info!(user = %user, "User logged in");
            response.set("user", json!(user));
        }
        None => {
            response.set_session(session.is_authenticated());
            response.append_error("missing user");
        }
    }
    Ok(response.into())
}

async fn logout(session: SessionHandle) -> HandlerResult {
    session.delete();
    Ok(RedirectResponse::temporary("/Login").into())
}

async fn whoami(session: SessionHandle) -> HandlerResult {
    Ok(Payload::from(json!({ "user": session.user() })))
}

async fn profile(session: SessionHandle) -> HandlerResult {
    let visits = session.get("visits").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
    session.set("visits", json!(visits));
    Ok(Payload::from(json!({ "user": session.user(), "visits": visits })))
}

async fn export(session: SessionHandle) -> HandlerResult {
    let body = serde_json::to_vec_pretty(&json!({
        "user": session.user(),
        "visits": session.get("visits"),
    }))?;
    Ok(BlobResponse::new(body, "application/json", "profile.json").into())
}

fn demo_controller() -> Controller {
    Controller::new()
        .handler("Login", handler::request(login))
        .handler("Logout", handler::session(logout))
        .handler("Whoami", handler::session(whoami))
        .gated(
            "Account",
            Controller::new()
                .handler("Profile", handler::session(profile))
                .handler("Export", handler::session(export)),
        )
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        match load_config(&cli.config) {
            Ok(config) => config,
            Err(e) => {
                init_logging("info");
                tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
                return ExitCode::FAILURE;
            }
        }
    } else {
        ServerConfig::default()
    };

    init_logging(&config.observability.log_level);
    tracing::info!("web-dispatch v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        static_root = %config.static_root.display(),
        checkpoint = ?config.session.dump_path(),
        "Configuration loaded"
    );

    match web_dispatch::run(demo_controller(), config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server terminated");
            ExitCode::FAILURE
        }
    }
}
