//! Controller tree.
//!
//! # Responsibilities
//! - Hold named sub-controllers, plain or auth-gated
//! - Hold named terminal handlers
//! - Validate the whole tree before serving begins
//!
//! # Design Decisions
//! - Built once at startup, immutable afterwards (shared via Arc, no locks)
//! - Auth gating is a property of the edge, not of the child node
//! - A name registered both plain and gated is legal; the gated child wins

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::routing::handler::Handler;

/// A routing-table problem detected before or during dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Handler declares a parameter count other than 1 or 2.
    #[error("handler for {path} has {arity} parameters")]
    InvalidArity { path: String, arity: usize },
}

/// A resolvable point in the routing graph.
#[derive(Default, Clone)]
pub struct Controller {
    plain: HashMap<String, Controller>,
    gated: HashMap<String, Controller>,
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a terminal handler.
    pub fn handler(mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    /// Register a sub-controller reachable without authentication.
    pub fn child(mut self, name: impl Into<String>, controller: Controller) -> Self {
        self.plain.insert(name.into(), controller);
        self
    }

    /// Register a sub-controller that requires a bound user.
    pub fn gated(mut self, name: impl Into<String>, controller: Controller) -> Self {
        self.gated.insert(name.into(), controller);
        self
    }

    /// Look up a sub-controller, gated first. Returns the child and whether
    /// it is auth-gated.
    pub fn sub_controller(&self, name: &str) -> Option<(&Controller, bool)> {
        if let Some(c) = self.gated.get(name) {
            return Some((c, true));
        }
        self.plain.get(name).map(|c| (c, false))
    }

    /// Look up a terminal handler by exact name.
    pub fn lookup_handler(&self, name: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(name)
    }

    /// Walk the whole tree, collecting every handler with an undispatchable
    /// arity. Plain children shadowed by a gated child are reported as
    /// warnings only.
    pub fn validate(&self) -> Result<(), Vec<ConfigurationError>> {
        let mut errors = Vec::new();
        self.validate_at("", &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_at(&self, prefix: &str, errors: &mut Vec<ConfigurationError>) {
        for (name, handler) in &self.handlers {
            let arity = handler.arity();
            if !(1..=2).contains(&arity) {
                errors.push(ConfigurationError::InvalidArity {
                    path: format!("{}/{}", prefix, name),
                    arity,
                });
            }
        }

        for (name, child) in &self.gated {
            if self.plain.contains_key(name) {
                tracing::warn!(
                    path = %format!("{}/{}", prefix, name),
                    "Plain controller is shadowed by an auth-gated controller of the same name"
                );
            }
            child.validate_at(&format!("{}/{}", prefix, name), errors);
        }

        for (name, child) in &self.plain {
            if !self.gated.contains_key(name) {
                child.validate_at(&format!("{}/{}", prefix, name), errors);
            }
        }
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<_> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("Controller")
            .field("plain", &self.plain)
            .field("gated", &self.gated)
            .field("handlers", &handlers)
            .finish()
    }
}
