//! Terminal handlers.
//!
//! A handler receives either the session alone (arity 1) or the session and
//! the buffered request (arity 2). Arity is declared by the handler so that
//! the tree can be checked at startup and the dispatcher can refuse anything
//! else at invocation time.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::http::request::RequestContext;
use crate::http::response::Payload;
use crate::session::SessionHandle;

/// Outcome of a handler invocation.
pub type HandlerResult = Result<Payload, HandlerError>;

/// Boxed future returned by [`Handler::call`].
pub type HandlerFuture = BoxFuture<'static, HandlerResult>;

/// Business-logic failure reported by a handler.
///
/// The message is logged server side only; clients see a bare 500.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::with_source("json error", e)
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(e: std::io::Error) -> Self {
        Self::with_source("io error", e)
    }
}

/// Arguments assembled by the dispatcher according to [`Handler::arity`].
pub struct HandlerArgs {
    pub session: SessionHandle,
    /// Present only for arity-2 handlers.
    pub request: Option<RequestContext>,
}

/// A terminal unit of dispatch.
pub trait Handler: Send + Sync {
    /// Number of parameters the handler accepts. Only 1 and 2 are dispatchable.
    fn arity(&self) -> usize;

    fn call(&self, args: HandlerArgs) -> HandlerFuture;
}

struct SessionFn<F>(F);

impl<F, Fut> Handler for SessionFn<F>
where
    F: Fn(SessionHandle) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn arity(&self) -> usize {
        1
    }

    fn call(&self, args: HandlerArgs) -> HandlerFuture {
        Box::pin((self.0)(args.session))
    }
}

struct RequestFn<F>(F);

impl<F, Fut> Handler for RequestFn<F>
where
    F: Fn(SessionHandle, RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn arity(&self) -> usize {
        2
    }

    fn call(&self, args: HandlerArgs) -> HandlerFuture {
        match args.request {
            Some(request) => Box::pin((self.0)(args.session, request)),
            None => Box::pin(async {
                Err(HandlerError::new("request-aware handler invoked without a request"))
            }),
        }
    }
}

/// Build a handler taking only the session.
pub fn session<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(SessionHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(SessionFn(f))
}

/// Build a handler taking the session and the request.
pub fn request<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(SessionHandle, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(RequestFn(f))
}
