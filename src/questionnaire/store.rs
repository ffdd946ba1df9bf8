//! In-memory session store keyed by principal id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::session::{Session, SessionSnapshot};

/// Shared handle to one principal's session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Holds every live session for the life of the process.
///
/// The map lock only guards lookup and insertion. Each session has its own
/// mutex, so principals never wait on each other's provider calls.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the principal's session, creating an empty one on first use.
    pub async fn get_or_create(&self, principal_id: Uuid) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(&principal_id) {
            return Arc::clone(handle);
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(principal_id).or_insert_with(|| {
            debug!(principal_id = %principal_id, "Session created");
            Arc::new(Mutex::new(Session::new()))
        }))
    }

    /// Clear the principal's session. Waits for any in-flight operation on
    /// that session to finish first.
    pub async fn reset(&self, principal_id: Uuid) {
        let handle = self.get_or_create(principal_id).await;
        let mut session = handle.lock().await;
        *session = Session::new();
        info!(principal_id = %principal_id, "Session reset");
    }

    /// Copy of the principal's session. A principal with no session reads as
    /// empty; nothing is created.
    pub async fn snapshot(&self, principal_id: Uuid) -> SessionSnapshot {
        let handle = self.sessions.read().await.get(&principal_id).cloned();
        match handle {
            Some(handle) => handle.lock().await.snapshot(),
            None => Session::new().snapshot(),
        }
    }

    /// Drop the principal's session entirely.
    pub async fn remove(&self, principal_id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&principal_id).is_some();
        if removed {
            debug!(principal_id = %principal_id, "Session removed");
        }
        removed
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
