use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::SessionContext;

/// Live sessions keyed by ID.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Arc<SessionContext>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a started session, replacing any previous session with the same ID.
    pub fn insert(&self, session: SessionContext) -> Arc<SessionContext> {
        let session = Arc::new(session);
        self.sessions
            .insert(session.id.clone(), Arc::clone(&session));
        session
    }

    pub fn get(&self, id: &str) -> Option<Arc<SessionContext>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// End a session. Its pipeline is dropped once in-flight turns finish.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            debug!(session_id = %id, "session removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
