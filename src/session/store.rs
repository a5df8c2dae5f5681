//! Keyed session store.
//!
//! # Locking
//! ```text
//! store lock (RwLock<HashMap>)   insert / lookup / delete / snapshot
//!   └─ session lock (RwLock)     user, data, last_activity
//! ```
//! Locks are always taken store first, then session. Nothing acquires the
//! store lock while holding a session lock.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use crate::observability::metrics;
use crate::session::id;
use crate::session::record::{Session, SessionState};

/// Errors that can occur while resolving a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The entropy source failed while generating an id.
    #[error("could not generate session id: {0}")]
    IdGeneration(#[from] rand::Error),
}

/// The set of all live sessions, keyed by id.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    id_length: usize,
    adopt_unknown_ids: bool,
}

impl SessionStore {
    /// Create an empty store minting ids of `id_length` characters.
    pub fn new(id_length: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            id_length,
            adopt_unknown_ids: false,
        }
    }

    /// Keep client-presented ids that are not in the store instead of
    /// replacing them with a fresh one.
    pub fn adopt_unknown_ids(mut self, adopt: bool) -> Self {
        self.adopt_unknown_ids = adopt;
        self
    }

    /// Return the session for `candidate`, creating one if needed.
    ///
    /// The boolean is `true` when the caller must treat the session as new:
    /// always for an empty candidate, and for an unknown candidate unless
    /// unknown ids are adopted (then the presented id is stored and `false`
    /// is returned).
    pub fn resolve_or_create(&self, candidate: &str) -> Result<(Arc<Session>, bool), SessionError> {
        if !candidate.is_empty() {
            if let Some(session) = self.lookup(candidate) {
                session.write().touch();
                return Ok((session, false));
            }
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        if !candidate.is_empty() && self.adopt_unknown_ids {
            // Another request may have inserted it since the lookup above.
            let session = sessions
                .entry(candidate.to_string())
                .or_insert_with(|| Arc::new(Session::new(candidate.to_string())))
                .clone();
            session.write().touch();
            metrics::record_live_sessions(sessions.len());
            return Ok((session, false));
        }

        let id = loop {
            let id = id::generate(self.id_length)?;
            if !sessions.contains_key(&id) {
                break id;
            }
            tracing::debug!("Session id collision, regenerating");
        };

        let session = Arc::new(Session::new(id.clone()));
        sessions.insert(id, session.clone());
        metrics::record_live_sessions(sessions.len());

        Ok((session, true))
    }

    /// Look up a live session without creating or touching it.
    pub fn lookup(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Read a data value, refreshing the session's activity time.
    pub fn get(&self, session: &Session, key: &str) -> Option<Value> {
        let mut state = session.write();
        state.touch();
        state.data.get(key).cloned()
    }

    /// Store a data value, refreshing the session's activity time.
    pub fn set(&self, session: &Session, key: impl Into<String>, value: Value) {
        let mut state = session.write();
        state.touch();
        state.data.insert(key.into(), value);
    }

    /// Remove a data value, returning the previous one.
    pub fn remove(&self, session: &Session, key: &str) -> Option<Value> {
        let mut state = session.write();
        state.touch();
        state.data.remove(key)
    }

    /// Bind a user name to the session. An empty name means anonymous.
    pub fn set_user(&self, session: &Session, name: impl Into<String>) {
        session.write().user = name.into();
    }

    pub fn user(&self, session: &Session) -> String {
        session.read().user.clone()
    }

    pub fn last_activity(&self, session: &Session) -> chrono::DateTime<Utc> {
        session.read().last_activity
    }

    /// Remove the session from the store. Handles already held by in-flight
    /// requests stay usable but are no longer reachable by id.
    pub fn delete(&self, session: &Session) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let removed = sessions.remove(session.id()).is_some();
        metrics::record_live_sessions(sessions.len());
        removed
    }

    /// Evict sessions idle for longer than `max_idle`. Returns the number removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        // A window reaching past the representable range means nothing is idle.
        let Some(cutoff) = chrono::Duration::from_std(max_idle)
            .ok()
            .and_then(|max_idle| Utc::now().checked_sub_signed(max_idle))
        else {
            return 0;
        };

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, s| s.read().last_activity >= cutoff);
        let evicted = before - sessions.len();

        if evicted > 0 {
            tracing::info!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        metrics::record_live_sessions(sessions.len());
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy every session's id and state under the store lock.
    pub(crate) fn snapshot(&self) -> Vec<(String, SessionState)> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .values()
            .map(|s| (s.id().to_string(), s.read().clone()))
            .collect()
    }

    /// Insert a restored session, bypassing collision checks.
    pub(crate) fn insert_restored(&self, session: Session) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(session.id().to_string(), Arc::new(session));
        metrics::record_live_sessions(sessions.len());
    }
}
