// ============================================================================
// Session Registry
// ============================================================================

use crate::backend::{Session, SessionFactory};
use crate::core::Result;
use log::warn;
use uuid::Uuid;

/// Opaque identifier for a backend session held by a connection.
///
/// Keys are random UUIDs, so they never collide for the life of the
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey(Uuid);

impl SessionKey {
    fn new() -> Self {
        SessionKey(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session_{}", self.0)
    }
}

/// Owns the backend sessions of one connection and tracks which is current.
///
/// Sessions are stored in start order. Closing the current session promotes
/// the most recently started remaining one, which matters only when an
/// enclosing scope left a session behind; with correctly nested transactions
/// the registry holds at most one entry.
#[derive(Debug)]
pub struct SessionRegistry<S> {
    sessions: Vec<(SessionKey, S)>,
    current: Option<SessionKey>,
}

impl<S: Session> SessionRegistry<S> {
    pub fn new() -> Self {
        Self {
            sessions: Vec::new(),
            current: None,
        }
    }

    /// Start a backend session and make it current.
    ///
    /// Does not touch the transaction nesting depth; that bookkeeping
    /// belongs to the coordinator.
    pub fn start_session<F>(&mut self, factory: &F) -> Result<SessionKey>
    where
        F: SessionFactory<Session = S>,
    {
        let session = factory.start_session()?;
        let key = SessionKey::new();
        self.sessions.push((key, session));
        self.current = Some(key);
        Ok(key)
    }

    /// Key of the current session, if any.
    pub fn current_key(&self) -> Option<SessionKey> {
        self.current
    }

    /// Handle of the current session, if any.
    pub fn current(&self) -> Option<&S> {
        let key = self.current?;
        self.sessions
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, session)| session)
    }

    /// Mutable handle of the current session, if any.
    pub fn current_mut(&mut self) -> Option<&mut S> {
        let key = self.current?;
        self.sessions
            .iter_mut()
            .find(|(k, _)| *k == key)
            .map(|(_, session)| session)
    }

    /// End the current backend session and drop it from the registry.
    ///
    /// Ending is best-effort cleanup: a failure is logged, never propagated.
    /// The most recently started remaining session becomes current.
    pub fn close_current(&mut self) {
        let Some(key) = self.current.take() else {
            return;
        };

        if let Some(pos) = self.sessions.iter().position(|(k, _)| *k == key) {
            let (_, mut session) = self.sessions.remove(pos);
            if let Err(err) = session.end_session() {
                warn!("failed to end {}: {}", key, err);
            }
        }

        self.current = self.sessions.last().map(|(key, _)| *key);
    }

    /// End every remaining session and empty the registry.
    pub fn close_all(&mut self) {
        self.current = None;
        for (key, mut session) in self.sessions.drain(..) {
            if let Err(err) = session.end_session() {
                warn!("failed to end {}: {}", key, err);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<S: Session> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
