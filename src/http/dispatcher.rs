//! Per-request dispatch.
//!
//! # State Machine
//! ```text
//! path → resolve handler ──none──→ static fallback (original path) → file | 404
//!          │
//!          ▼
//!     session from cookie ──store failure──→ 500
//!          │
//!          ├─ new session, not login handler ──→ 307 login
//!          ├─ auth-gated path, no user ───────→ 307 login
//!          ▼
//!     invoke by arity (1: session, 2: session + request)
//!          ├─ other arity ──→ 500 (configuration error)
//!          ├─ handler error / panic ──→ 500
//!          ▼
//!     Payload → response (raw data wrapped in JSON envelope)
//! ```
//! Every response produced after session resolution carries `Set-Cookie`.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::{FutureExt, StreamExt};
use thiserror::Error;

use crate::http::request::RequestContext;
use crate::http::response::{Payload, RedirectResponse};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::{resolve, ConfigurationError, HandlerArgs, HandlerError, PathStack, Resolution};
use crate::session::cookie::read_cookie;
use crate::session::{SessionError, SessionHandle};

/// Failures caught at the dispatch boundary. None of the detail reaches the
/// client; only the status code does.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("handler {name} failed: {source}")]
    Handler {
        name: String,
        #[source]
        source: HandlerError,
    },

    #[error("handler {name} panicked: {message}")]
    Panic { name: String, message: String },

    #[error("could not read request body: {0}")]
    Body(#[source] axum::Error),

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Body(_) => StatusCode::BAD_REQUEST,
            DispatchError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request failed");
        self.status().into_response()
    }
}

/// Entry point for every request.
pub async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    tracing::info!(uri = %request.uri(), "Dispatching request");

    let mut stack = PathStack::build(request.uri().path());
    let Some(resolution) = resolve(&state.root, &mut stack) else {
        let response = state.static_files.serve(&mut stack, request).await;
        metrics::record_request("static", response.status().as_u16(), start);
        return response;
    };

    let (outcome, response) = handle(&state, resolution, request).await;
    metrics::record_request(outcome, response.status().as_u16(), start);
    response
}

async fn handle(
    state: &AppState,
    resolution: Resolution,
    request: Request<Body>,
) -> (&'static str, Response) {
    let candidate = read_cookie(request.headers(), state.cookie.name()).unwrap_or_default();
    let (session, is_new) = match state.sessions.resolve_or_create(&candidate) {
        Ok(resolved) => resolved,
        Err(e) => return ("error", DispatchError::from(e).into_response()),
    };

    let set_cookie = state.cookie.header_value(session.id());
    let session = SessionHandle::new(state.sessions.clone(), session);

    let (outcome, mut response) = if is_new && resolution.name != state.auth.login_handler {
        tracing::debug!(handler = %resolution.name, "New session, redirecting to login");
        ("redirect", login_redirect(state))
    } else if resolution.requires_auth && !session.is_authenticated() {
        tracing::debug!(handler = %resolution.name, "Authentication required, redirecting to login");
        ("redirect", login_redirect(state))
    } else {
        match invoke(state, resolution, session, request).await {
            Ok(response) => ("handler", response),
            Err(e) => ("error", e.into_response()),
        }
    };

    match set_cookie {
        Some(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        None => tracing::warn!("Session id is not a valid cookie value"),
    }

    (outcome, response)
}

fn login_redirect(state: &AppState) -> Response {
    Payload::from(RedirectResponse::temporary(&state.auth.login_location)).into_http()
}

async fn invoke(
    state: &AppState,
    resolution: Resolution,
    session: SessionHandle,
    request: Request<Body>,
) -> Result<Response, DispatchError> {
    let request = match resolution.handler.arity() {
        1 => None,
        2 => {
            let (parts, body) = request.into_parts();
            let bytes = read_body(&parts.headers, body, state.max_body_size).await?;
            Some(RequestContext::from_parts(parts, bytes))
        }
        arity => {
            return Err(ConfigurationError::InvalidArity {
                path: request.uri().path().to_string(),
                arity,
            }
            .into())
        }
    };

    let handler = resolution.handler.clone();
    let call = async move { handler.call(HandlerArgs { session, request }).await };

    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(payload)) => Ok(payload.into_http()),
        Ok(Err(source)) => Err(DispatchError::Handler {
            name: resolution.name,
            source,
        }),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(DispatchError::Panic {
                name: resolution.name,
                message,
            })
        }
    }
}

/// Buffer at most `limit` bytes of `body`.
async fn read_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Bytes, DispatchError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(DispatchError::BodyTooLarge { limit });
    }

    let mut buf = Vec::new();
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(DispatchError::Body)?;
        if buf.len() + chunk.len() > limit {
            return Err(DispatchError::BodyTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buf))
}
