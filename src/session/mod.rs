//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! Request cookie (sessionid)
//!     → cookie.rs (read value)
//!     → store.rs (resolve_or_create: lookup, adopt or mint via id.rs)
//!     → handle.rs (SessionHandle handed to the handler)
//!     → cookie.rs (Set-Cookie reissued with a fresh expiry)
//!
//! Persistence:
//!     checkpoint.rs (periodic + shutdown dump, startup restore)
//! ```
//!
//! # Design Decisions
//! - One store-wide lock for the map, one lock per session for its fields
//! - Sessions live until deleted (or evicted when an idle timeout is set)
//! - The store is constructed explicitly and injected, never global

pub mod checkpoint;
pub mod cookie;
pub mod handle;
pub mod id;
pub mod record;
pub mod store;

pub use checkpoint::{CheckpointError, Checkpointer};
pub use cookie::SessionCookie;
pub use handle::SessionHandle;
pub use record::Session;
pub use store::{SessionError, SessionStore};
