//! Session-aware request dispatch over a statically declared controller tree.
//!
//! A request path is walked through a tree of named controllers (plain or
//! auth-gated) to a terminal handler, invoked with the client's session and
//! optionally the request. Sessions are bound by cookie, kept in an
//! in-memory store, and checkpointed to disk so they survive restarts.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod session;

pub use config::schema::ServerConfig;
pub use http::{HttpServer, Payload};
pub use lifecycle::{run, Shutdown};
pub use routing::{handler, Controller};
pub use session::{SessionHandle, SessionStore};
