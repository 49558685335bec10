//! Process-wide table of live stream sessions

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::StreamSession;

/// Registry of live stream sessions keyed by session identifier
///
/// The registry is a cheap, cloneable handle around a lock-guarded map. It is
/// shared between the tasks driving sessions and the independent requests
/// that cancel them. Entries exist only while a session is active; a session
/// removes itself on every exit path.
///
/// # Examples
///
/// ```
/// use chatstream::session::SessionRegistry;
///
/// let registry = SessionRegistry::new();
/// let session = registry.begin();
/// assert!(registry.contains(session.id()));
/// assert!(registry.cancel(session.id()));
/// drop(session);
/// assert!(registry.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new active session and return it
    ///
    /// The identifier is available through [`StreamSession::id`] before any
    /// content is produced, so cancellation can be requested concurrently
    /// with generation.
    pub fn begin(&self) -> StreamSession {
        let token = CancellationToken::new();
        let id = {
            let mut sessions = self.lock();
            let mut id = Uuid::new_v4().to_string();
            while sessions.contains_key(&id) {
                id = Uuid::new_v4().to_string();
            }
            sessions.insert(id.clone(), token.clone());
            id
        };

        tracing::debug!("Stream session {} started", id);
        StreamSession::new(id, token, self.clone())
    }

    /// Request cancellation of a live session
    ///
    /// Idempotent and non-blocking. Returns `false` when the identifier is
    /// unknown or the session already reached a terminal state.
    pub fn cancel(&self, id: &str) -> bool {
        match self.lock().get(id) {
            Some(token) => {
                token.cancel();
                tracing::info!("Cancellation requested for stream session {}", id);
                true
            }
            None => {
                tracing::debug!("Cancellation ignored for unknown stream session {}", id);
                false
            }
        }
    }

    /// Cancel every live session, returning how many were signalled
    pub fn cancel_all(&self) -> usize {
        let sessions = self.lock();
        for token in sessions.values() {
            token.cancel();
        }
        sessions.len()
    }

    /// Whether a session with this identifier is currently live
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no sessions are live
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn remove(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        // Critical sections never panic mid-update, so a poisoned map is still consistent.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
