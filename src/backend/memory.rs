use super::{Session, SessionFactory};
use crate::core::{ClientError, Result, TransactionOptions};
use std::sync::{Arc, Mutex, PoisonError};

/// In-memory backend for tests, examples, and embedded use.
///
/// Implements the session and transaction lifecycle against process-local
/// state, counting every call it receives. Failures can be injected to
/// exercise the retry paths that a replicated store would trigger under
/// write contention.
///
/// Clones share state, so a backend handed to a pool can still be observed
/// from the test that created it.
///
/// # Examples
///
/// ```
/// use docdb::backend::{MemoryBackend, Session, SessionFactory};
/// use docdb::TransactionOptions;
///
/// # fn main() -> docdb::Result<()> {
/// let backend = MemoryBackend::new();
/// let mut session = backend.start_session()?;
///
/// session.start_transaction(&TransactionOptions::default())?;
/// session.commit_transaction()?;
/// session.end_session()?;
///
/// assert_eq!(backend.stats().commits, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<SharedState>>,
}

#[derive(Debug, Default)]
struct SharedState {
    stats: BackendStats,
    fail_session_starts: u32,
    fail_transaction_starts: u32,
    fail_commits: u32,
    open_sessions: usize,
}

/// Counters for every backend call the client has issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub sessions_started: u64,
    pub transactions_started: u64,
    pub commits: u64,
    pub aborts: u64,
    pub sessions_ended: u64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SharedState> {
        // A poisoned lock only means another test thread panicked; the
        // counters themselves are still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the call counters.
    pub fn stats(&self) -> BackendStats {
        self.state().stats
    }

    /// Number of sessions started and not yet ended.
    pub fn open_sessions(&self) -> usize {
        self.state().open_sessions
    }

    /// Make the next `n` commit calls fail with a backend error.
    pub fn fail_commits(&self, n: u32) {
        self.state().fail_commits = n;
    }

    /// Make the next `n` transaction starts fail with a backend error.
    pub fn fail_transaction_starts(&self, n: u32) {
        self.state().fail_transaction_starts = n;
    }

    /// Make the next `n` session starts fail with a backend error.
    pub fn fail_session_starts(&self, n: u32) {
        self.state().fail_session_starts = n;
    }
}

impl SessionFactory for MemoryBackend {
    type Session = MemorySession;

    fn start_session(&self) -> Result<MemorySession> {
        let mut state = self.state();
        if state.fail_session_starts > 0 {
            state.fail_session_starts -= 1;
            return Err(ClientError::backend("session start refused"));
        }

        state.stats.sessions_started += 1;
        state.open_sessions += 1;

        Ok(MemorySession {
            state: Arc::clone(&self.state),
            in_transaction: false,
            ended: false,
        })
    }
}

/// A session handed out by [`MemoryBackend`].
///
/// Enforces the one-transaction-per-session rule the way a real driver
/// session would.
#[derive(Debug)]
pub struct MemorySession {
    state: Arc<Mutex<SharedState>>,
    in_transaction: bool,
    ended: bool,
}

impl MemorySession {
    fn state(&self) -> std::sync::MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

impl Session for MemorySession {
    fn start_transaction(&mut self, _options: &TransactionOptions) -> Result<()> {
        if self.ended {
            return Err(ClientError::Session("session already ended".into()));
        }
        if self.in_transaction {
            return Err(ClientError::Session(
                "session already has an open transaction".into(),
            ));
        }

        let mut state = self.state();
        if state.fail_transaction_starts > 0 {
            state.fail_transaction_starts -= 1;
            return Err(ClientError::backend("transaction start refused"));
        }

        state.stats.transactions_started += 1;
        drop(state);
        self.in_transaction = true;
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(ClientError::Session("no open transaction to commit".into()));
        }

        let mut state = self.state();
        if state.fail_commits > 0 {
            state.fail_commits -= 1;
            // The transaction stays open, like a commit that lost a
            // write-conflict race and can be aborted or retried.
            return Err(ClientError::backend("write conflict at commit"));
        }

        state.stats.commits += 1;
        drop(state);
        self.in_transaction = false;
        Ok(())
    }

    fn abort_transaction(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(ClientError::Session("no open transaction to abort".into()));
        }

        self.state().stats.aborts += 1;
        self.in_transaction = false;
        Ok(())
    }

    fn end_session(&mut self) -> Result<()> {
        if self.ended {
            return Err(ClientError::Session("session already ended".into()));
        }

        let mut state = self.state();
        state.stats.sessions_ended += 1;
        state.open_sessions -= 1;
        drop(state);
        self.ended = true;
        Ok(())
    }
}
