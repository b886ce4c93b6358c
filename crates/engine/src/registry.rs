use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, RwLock};

use upbench_protocol::ProgressSnapshot;

use crate::session::{ChunkedSession, MultiplexedSession, Session};
use crate::EngineError;

/// Concurrent map of session id to session state.
///
/// The registry is the only structure mutated by many concurrent callers;
/// it requires no external locking. Get-or-create is atomic per key, so
/// racing first-fragment requests establish exactly one session object.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a new session. Fails if the id is already taken; with
    /// cryptographically random ids a collision is practically unreachable.
    pub fn create(&self, session: Session) -> Result<(), EngineError> {
        let mut sessions = self.sessions.write().unwrap();
        match sessions.entry(session.id().to_string()) {
            Entry::Occupied(e) => Err(EngineError::SessionExists(e.key().clone())),
            Entry::Vacant(e) => {
                e.insert(session);
                Ok(())
            }
        }
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().unwrap().get(session_id).cloned()
    }

    /// Looks up a chunked session; a missing id or a session of the other
    /// kind both resolve to not-found.
    pub fn get_chunked(&self, session_id: &str) -> Result<Arc<ChunkedSession>, EngineError> {
        match self.get(session_id) {
            Some(Session::Chunked(s)) => Ok(s),
            _ => Err(EngineError::SessionNotFound(session_id.to_string())),
        }
    }

    /// Looks up a multiplexed session; a missing id or a session of the
    /// other kind both resolve to not-found.
    pub fn get_multiplexed(&self, session_id: &str) -> Result<Arc<MultiplexedSession>, EngineError> {
        match self.get(session_id) {
            Some(Session::Multiplexed(s)) => Ok(s),
            _ => Err(EngineError::SessionNotFound(session_id.to_string())),
        }
    }

    /// Atomic get-or-create for multiplexed sessions.
    ///
    /// If the id already names a multiplexed session, that session is
    /// returned and the factory is not run. A chunked session under the same
    /// id is an id collision and fails.
    pub fn get_or_create_multiplexed(
        &self,
        session_id: &str,
        make: impl FnOnce() -> Arc<MultiplexedSession>,
    ) -> Result<Arc<MultiplexedSession>, EngineError> {
        let mut sessions = self.sessions.write().unwrap();
        match sessions.entry(session_id.to_string()) {
            Entry::Occupied(e) => match e.get() {
                Session::Multiplexed(s) => Ok(Arc::clone(s)),
                Session::Chunked(_) => Err(EngineError::SessionExists(session_id.to_string())),
            },
            Entry::Vacant(e) => {
                let session = make();
                e.insert(Session::Multiplexed(Arc::clone(&session)));
                Ok(session)
            }
        }
    }

    /// Removes and returns a session.
    pub fn remove(&self, session_id: &str) -> Option<Session> {
        self.sessions.write().unwrap().remove(session_id)
    }

    /// Progress of a live session, or `None` once it has completed or been
    /// cancelled (the "completed" marker for pollers).
    pub fn progress(&self, session_id: &str) -> Option<ProgressSnapshot> {
        self.get(session_id).map(|s| s.progress())
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
