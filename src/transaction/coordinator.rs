// ============================================================================
// Transaction Coordinator
// ============================================================================

use crate::backend::{Session, SessionFactory};
use crate::core::{Result, TransactionOptions};
use crate::session::SessionRegistry;
use log::debug;

/// Translates logically nested begin/commit/rollback calls into at most one
/// real backend transaction.
///
/// The backend supports a single active transaction per session and no
/// savepoints, so nesting is emulated with a depth counter: only the
/// 0 -> 1 transition starts a session and a real transaction, and only the
/// 1 -> 0 transition commits or aborts it. Inner levels adjust the counter
/// and nothing else.
///
/// Rollback is all-or-nothing: unwinding any number of levels aborts the
/// single real transaction. This is not savepoint emulation.
///
/// All state is owned by the connection that created the coordinator;
/// `&mut self` enforces single-threaded use.
pub struct TransactionCoordinator<S> {
    /// Current nesting depth; 0 means no transaction is active.
    depth: usize,

    /// Backend sessions owned by this connection.
    registry: SessionRegistry<S>,

    /// Options applied to every outermost transaction start.
    options: TransactionOptions,

    /// When false, every operation is a pure no-op and depth stays 0.
    enabled: bool,
}

impl<S: Session> TransactionCoordinator<S> {
    pub fn new(options: TransactionOptions, enabled: bool) -> Self {
        Self {
            depth: 0,
            registry: SessionRegistry::new(),
            options,
            enabled,
        }
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether session-backed transactions are enabled on this connection.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The active session, for attaching to outgoing operations.
    ///
    /// Always `None` when session-backed transactions are disabled.
    pub fn session(&self) -> Option<&S> {
        if !self.enabled {
            return None;
        }
        self.registry.current()
    }

    /// Mutable handle to the active session.
    pub fn session_mut(&mut self) -> Option<&mut S> {
        if !self.enabled {
            return None;
        }
        self.registry.current_mut()
    }

    /// Number of sessions currently held, for diagnostics.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Open a transaction level.
    ///
    /// At depth 0 this starts a backend session and a real transaction with
    /// the configured options; deeper calls only increment the counter.
    ///
    /// # Errors
    /// A session or transaction start failure propagates unchanged and the
    /// depth is left as it was.
    pub fn begin<F>(&mut self, factory: &F) -> Result<()>
    where
        F: SessionFactory<Session = S>,
    {
        if !self.enabled {
            return Ok(());
        }

        if self.depth == 0 {
            let key = self.registry.start_session(factory)?;
            if let Some(session) = self.registry.current_mut() {
                session.start_transaction(&self.options)?;
            }
            debug!("{}: started backend transaction", key);
        }

        self.depth += 1;
        Ok(())
    }

    /// Close one transaction level.
    ///
    /// At depth 1 this commits the real transaction and ends the session;
    /// inner commits only decrement the counter. Extra commits at depth 0
    /// are safe no-ops.
    ///
    /// # Errors
    /// A backend commit failure propagates unchanged; the depth is not
    /// decremented so the caller can decide whether to retry or unwind.
    pub fn commit(&mut self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.depth == 1 {
            if let Some(session) = self.registry.current_mut() {
                session.commit_transaction()?;
                debug!("committed backend transaction");
                self.registry.close_current();
            }
        }

        self.depth = self.depth.saturating_sub(1);
        Ok(())
    }

    /// Unwind to `to_level`, aborting the real transaction.
    ///
    /// Defaults to one level down. A target outside `0..depth` is a silent
    /// no-op, which makes stray rollbacks safe. Any in-range target aborts
    /// the single backend transaction, however many logical levels are
    /// being unwound.
    pub fn rollback(&mut self, to_level: Option<usize>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let to_level = to_level.unwrap_or_else(|| self.depth.saturating_sub(1));
        if to_level >= self.depth {
            return Ok(());
        }

        if let Some(session) = self.registry.current_mut() {
            session.abort_transaction()?;
            debug!("aborted backend transaction");
            self.registry.close_current();
        }

        self.depth = to_level;
        Ok(())
    }

    /// Drop one level of bookkeeping without touching the backend.
    ///
    /// Used by the retry loop after a failed commit, when the backend call
    /// already consumed the level, and after a nested work failure, where
    /// unwinding is left to the enclosing level.
    pub(crate) fn release_level(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// End every session this coordinator still holds.
    pub(crate) fn close_sessions(&mut self) {
        self.registry.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, MemorySession};

    fn coordinator() -> TransactionCoordinator<MemorySession> {
        TransactionCoordinator::new(TransactionOptions::default(), true)
    }

    #[test]
    fn test_nested_begin_commit_touches_backend_once() {
        let backend = MemoryBackend::new();
        let mut tc = coordinator();

        tc.begin(&backend).unwrap();
        tc.begin(&backend).unwrap();
        assert_eq!(tc.depth(), 2);

        tc.commit().unwrap();
        assert_eq!(tc.depth(), 1);
        tc.commit().unwrap();
        assert_eq!(tc.depth(), 0);

        let stats = backend.stats();
        assert_eq!(stats.sessions_started, 1);
        assert_eq!(stats.transactions_started, 1);
        assert_eq!(stats.commits, 1);
        assert_eq!(stats.sessions_ended, 1);
        assert!(tc.session().is_none());
    }

    #[test]
    fn test_inner_commit_keeps_session() {
        let backend = MemoryBackend::new();
        let mut tc = coordinator();

        tc.begin(&backend).unwrap();
        tc.begin(&backend).unwrap();
        tc.commit().unwrap();

        assert!(tc.session().is_some());
        assert_eq!(backend.stats().commits, 0);
    }

    #[test]
    fn test_default_rollback_aborts_from_nested_level() {
        let backend = MemoryBackend::new();
        let mut tc = coordinator();

        tc.begin(&backend).unwrap();
        tc.begin(&backend).unwrap();

        // Unwinds to level 1, but the single real transaction is gone.
        tc.rollback(None).unwrap();

        assert_eq!(tc.depth(), 1);
        assert_eq!(backend.stats().aborts, 1);
        assert_eq!(backend.stats().sessions_ended, 1);
        assert!(tc.session().is_none());
    }

    #[test]
    fn test_rollback_out_of_range_is_noop() {
        let backend = MemoryBackend::new();
        let mut tc = coordinator();

        tc.begin(&backend).unwrap();
        tc.begin(&backend).unwrap();

        tc.rollback(Some(5)).unwrap();

        assert_eq!(tc.depth(), 2);
        assert_eq!(backend.stats().aborts, 0);
    }

    #[test]
    fn test_rollback_to_zero_unwinds_everything() {
        let backend = MemoryBackend::new();
        let mut tc = coordinator();

        tc.begin(&backend).unwrap();
        tc.begin(&backend).unwrap();
        tc.begin(&backend).unwrap();

        tc.rollback(Some(0)).unwrap();

        assert_eq!(tc.depth(), 0);
        assert_eq!(backend.stats().aborts, 1);
    }

    #[test]
    fn test_depth_never_goes_negative() {
        let backend = MemoryBackend::new();
        let mut tc = coordinator();

        tc.commit().unwrap();
        tc.rollback(None).unwrap();
        assert_eq!(tc.depth(), 0);

        tc.begin(&backend).unwrap();
        tc.commit().unwrap();
        tc.commit().unwrap();
        tc.rollback(None).unwrap();
        assert_eq!(tc.depth(), 0);
    }

    #[test]
    fn test_disabled_mode_is_inert() {
        let backend = MemoryBackend::new();
        let mut tc: TransactionCoordinator<MemorySession> =
            TransactionCoordinator::new(TransactionOptions::default(), false);

        tc.begin(&backend).unwrap();
        tc.begin(&backend).unwrap();
        assert_eq!(tc.depth(), 0);
        assert!(tc.session().is_none());

        tc.commit().unwrap();
        tc.rollback(None).unwrap();
        assert_eq!(tc.depth(), 0);
        assert_eq!(backend.stats(), Default::default());
        assert_eq!(tc.session_count(), 0);
    }

    #[test]
    fn test_begin_failure_leaves_depth_untouched() {
        let backend = MemoryBackend::new();
        backend.fail_session_starts(1);
        let mut tc = coordinator();

        assert!(tc.begin(&backend).is_err());
        assert_eq!(tc.depth(), 0);

        // The next begin works.
        tc.begin(&backend).unwrap();
        assert_eq!(tc.depth(), 1);
    }

    #[test]
    fn test_commit_failure_keeps_depth_for_caller() {
        let backend = MemoryBackend::new();
        backend.fail_commits(1);
        let mut tc = coordinator();

        tc.begin(&backend).unwrap();
        assert!(tc.commit().is_err());

        // The level is still open; the retry loop decides what to do.
        assert_eq!(tc.depth(), 1);
        assert_eq!(backend.stats().sessions_ended, 0);
    }

    #[test]
    fn test_session_map_bounded_by_nesting() {
        let backend = MemoryBackend::new();
        let mut tc = coordinator();

        tc.begin(&backend).unwrap();
        tc.begin(&backend).unwrap();
        tc.begin(&backend).unwrap();
        assert_eq!(tc.session_count(), 1);

        tc.commit().unwrap();
        tc.commit().unwrap();
        tc.commit().unwrap();
        assert_eq!(tc.session_count(), 0);
    }
}
