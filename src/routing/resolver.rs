//! Handler resolution.
//!
//! # Algorithm
//! ```text
//! while more than one segment remains and a controller is current:
//!     pop segment → gated child? (mark auth) : plain child? : stop
//! pop last segment → handler name → exact lookup on final controller
//! ```
//!
//! # Design Decisions
//! - Resolution never fails with an error; absence means "try static files"
//! - Arity is not checked here; that is a dispatch-time configuration error

use std::sync::Arc;

use crate::routing::controller::Controller;
use crate::routing::handler::Handler;
use crate::routing::path::PathStack;

/// A successfully resolved handler.
#[derive(Clone)]
pub struct Resolution {
    pub handler: Arc<dyn Handler>,
    /// Final path segment, matched against the login handler name.
    pub name: String,
    /// At least one auth-gated controller was traversed.
    pub requires_auth: bool,
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("name", &self.name)
            .field("arity", &self.handler.arity())
            .field("requires_auth", &self.requires_auth)
            .finish()
    }
}

/// Walk `stack` from `root` and return the terminal handler, if any.
pub fn resolve(root: &Controller, stack: &mut PathStack) -> Option<Resolution> {
    let mut current = Some(root);
    let mut requires_auth = false;

    while stack.remaining_depth() > 1 {
        let Some(controller) = current else { break };
        let name = stack.pop();

        current = match controller.sub_controller(&name) {
            Some((child, gated)) => {
                requires_auth |= gated;
                Some(child)
            }
            None => None,
        };
    }

    let controller = current?;
    let name = stack.pop();
    if name.is_empty() {
        return None;
    }

    controller.lookup_handler(&name).map(|handler| Resolution {
        handler: handler.clone(),
        name,
        requires_auth,
    })
}
