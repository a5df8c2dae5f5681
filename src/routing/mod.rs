//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request path
//!     → path.rs (PathStack of non-empty segments)
//!     → resolver.rs (walk controller tree, collect auth requirement)
//!     → controller.rs (named children + named handlers)
//!     → Return: Resolution or None (static fallback)
//!
//! Tree construction (at startup):
//!     Controller::new().child(..).gated(..).handler(..)
//!     → validate() (arity, shadowed names)
//!     → Freeze as immutable Arc<Controller>
//! ```
//!
//! # Design Decisions
//! - Tree built and validated at startup, immutable at runtime
//! - Dispatch is by path only, never by HTTP method
//! - Deterministic: same path always resolves to the same handler

pub mod controller;
pub mod handler;
pub mod path;
pub mod resolver;

pub use controller::{ConfigurationError, Controller};
pub use handler::{Handler, HandlerArgs, HandlerError, HandlerFuture, HandlerResult};
pub use path::PathStack;
pub use resolver::{resolve, Resolution};
