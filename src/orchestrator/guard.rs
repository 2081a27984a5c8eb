use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::model::SessionId;

/// Sessions with a run in flight in this process.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunRegistry {
    active: Arc<Mutex<HashSet<SessionId>>>,
}

impl RunRegistry {
    /// Claims `session_id`, or `None` when a run already holds it.
    pub(crate) fn try_acquire(&self, session_id: SessionId) -> Option<RunGuard> {
        let inserted = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id);
        inserted.then(|| RunGuard {
            session_id,
            active: Arc::clone(&self.active),
        })
    }

    pub(crate) fn is_running(&self, session_id: SessionId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&session_id)
    }
}

/// Releases the session when dropped, including when the run task panics.
#[derive(Debug)]
pub(crate) struct RunGuard {
    session_id: SessionId,
    active: Arc<Mutex<HashSet<SessionId>>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.session_id);
    }
}
