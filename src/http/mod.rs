//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TLS connection
//!     → server.rs (Axum setup, middleware)
//!     → dispatcher.rs (session binding, auth redirect, handler invocation)
//!         → request.rs (RequestContext for arity-2 handlers)
//!         → response.rs (Payload → JSON / blob / redirect)
//!     → static_files.rs (fallback when no handler resolves)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;
pub mod static_files;

pub use dispatcher::{dispatch, DispatchError};
pub use request::RequestContext;
pub use response::{ApiResponse, BlobResponse, JsonResponse, Payload, RedirectResponse};
pub use server::{AppState, HttpServer};
pub use static_files::StaticFiles;
