//! A single session record and its per-entry lock.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Server-side state bound to a client.
///
/// Fields are only reachable through [`SessionStore`](super::SessionStore)
/// and the checkpoint module.
#[derive(Debug)]
pub struct Session {
    id: String,
    state: RwLock<SessionState>,
}

#[derive(Debug, Clone)]
pub(crate) struct SessionState {
    pub(crate) user: String,
    pub(crate) last_activity: DateTime<Utc>,
    pub(crate) data: HashMap<String, Value>,
}

impl SessionState {
    /// Advance `last_activity`, never moving it backwards.
    pub(crate) fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_activity {
            self.last_activity = now;
        }
    }
}

impl Session {
    pub(crate) fn new(id: String) -> Self {
        Self::from_parts(id, String::new(), Utc::now(), HashMap::new())
    }

    pub(crate) fn from_parts(
        id: String,
        user: String,
        last_activity: DateTime<Utc>,
        data: HashMap<String, Value>,
    ) -> Self {
        Self {
            id,
            state: RwLock::new(SessionState {
                user,
                last_activity,
                data,
            }),
        }
    }

    /// Opaque session identifier, also the cookie value.
    pub fn id(&self) -> &str {
        &self.id
    }

    // Every write is a single assignment or insert, so a poisoned lock still
    // guards consistent state.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
