//! Session handle passed to handlers.

use std::sync::Arc;

use serde_json::Value;

use crate::session::record::Session;
use crate::session::store::SessionStore;

/// A request-scoped view of one session.
///
/// Every operation goes through the owning [`SessionStore`], so the
/// per-session locking discipline is applied uniformly.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    store: Arc<SessionStore>,
    session: Arc<Session>,
}

impl SessionHandle {
    pub fn new(store: Arc<SessionStore>, session: Arc<Session>) -> Self {
        Self { store, session }
    }

    pub fn id(&self) -> &str {
        self.session.id()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.get(&self.session, key)
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.store.set(&self.session, key, value)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.store.remove(&self.session, key)
    }

    /// Bound user name; empty for anonymous sessions.
    pub fn user(&self) -> String {
        self.store.user(&self.session)
    }

    pub fn set_user(&self, name: impl Into<String>) {
        self.store.set_user(&self.session, name)
    }

    pub fn is_authenticated(&self) -> bool {
        !self.user().is_empty()
    }

    /// Remove this session from the store (e.g. on logout).
    pub fn delete(&self) -> bool {
        self.store.delete(&self.session)
    }
}
