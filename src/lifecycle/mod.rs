//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Validate routing tree → Restore checkpoint
//!     → Spawn checkpoint task → Spawn signal listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain → Final checkpoint → Exit 0
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast on configuration errors (static root, handler arity)
//! - Restore failures are logged; the server starts with an empty store
//! - The periodic and final checkpoints share one mutual-exclusion guard

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, StartupError};
