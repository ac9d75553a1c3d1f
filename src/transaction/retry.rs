// ============================================================================
// Retry Executor
// ============================================================================

use crate::backend::SessionFactory;
use crate::connection::Connection;
use crate::core::{ClientError, Result};
use log::warn;

/// What one attempt of the unit of work produced.
///
/// The attempt loop branches on this value alone; no failure classification
/// happens anywhere else.
pub(crate) enum AttemptOutcome<R> {
    /// The work ran and the commit went through.
    Committed(R),

    /// The commit failed. Commit failures against a replicated store are
    /// usually transient write conflicts, so the whole unit of work is
    /// worth re-running.
    Retry(ClientError),

    /// The work itself failed, or the transaction could not be started.
    /// Application errors are not worth blind retry.
    Fatal(ClientError),
}

impl<F: SessionFactory> Connection<F> {
    /// Run a unit of work inside a transaction, retrying on commit failure.
    ///
    /// The callback is invoked with a fresh transaction level per attempt.
    /// A failure raised by the callback propagates immediately: at the
    /// outermost level it aborts the transaction first, while inside an
    /// enclosing transaction it leaves unwinding to that level. Only a
    /// failed commit consumes an attempt.
    /// After `max_attempts` failed commits the last commit error is
    /// returned. On success the committed hooks fire and the callback's
    /// result is returned.
    ///
    /// `max_attempts` below 1 is treated as 1.
    ///
    /// # Examples
    ///
    /// ```
    /// use docdb::{Connection, ConnectionConfig, MemoryBackend};
    ///
    /// # fn main() -> docdb::Result<()> {
    /// let backend = MemoryBackend::new();
    /// let mut conn = Connection::new(ConnectionConfig::default(), backend.clone());
    ///
    /// let inserted = conn.transaction(
    ///     |conn| {
    ///         // Issue writes through the execution layer, attaching
    ///         // conn.session() to each operation.
    ///         assert!(conn.session().is_some());
    ///         Ok(2)
    ///     },
    ///     3,
    /// )?;
    ///
    /// assert_eq!(inserted, 2);
    /// assert_eq!(backend.stats().commits, 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn transaction<R, W>(&mut self, mut work: W, max_attempts: u32) -> Result<R>
    where
        W: FnMut(&mut Self) -> Result<R>,
    {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.run_attempt(&mut work) {
                AttemptOutcome::Committed(value) => {
                    self.fire_committed();
                    return Ok(value);
                }
                AttemptOutcome::Fatal(err) => return Err(err),
                AttemptOutcome::Retry(err) => {
                    if attempt >= max_attempts {
                        return Err(err);
                    }
                    warn!(
                        "commit failed on attempt {}/{}, retrying unit of work: {}",
                        attempt, max_attempts, err
                    );
                    attempt += 1;
                }
            }
        }
    }

    fn run_attempt<R, W>(&mut self, work: &mut W) -> AttemptOutcome<R>
    where
        W: FnMut(&mut Self) -> Result<R>,
    {
        if let Err(err) = self.begin_transaction() {
            // The transaction never reached an open state; nothing to
            // roll back, nothing to retry.
            return AttemptOutcome::Fatal(err);
        }

        let value = match work(self) {
            Ok(value) => value,
            Err(err) => {
                if self.transaction_level() > 1 {
                    // Failure inside a nested level: drop our level and let
                    // the enclosing attempt loop unwind the real transaction.
                    self.coordinator.release_level();
                    return AttemptOutcome::Fatal(err);
                }

                if let Err(rollback_err) = self.rollback(None) {
                    warn!(
                        "rollback after failed unit of work also failed: {}",
                        rollback_err
                    );
                }
                return AttemptOutcome::Fatal(err);
            }
        };

        match self.commit() {
            Ok(()) => AttemptOutcome::Committed(value),
            Err(err) => {
                // The commit call consumed the level but could not
                // decrement past the failure; settle the bookkeeping here.
                self.coordinator.release_level();
                AttemptOutcome::Retry(err)
            }
        }
    }
}
