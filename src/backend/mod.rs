// ============================================================================
// Backend Interface
// ============================================================================
//
// The narrow surface the client needs from a backend driver: a way to start
// sessions, and on each session the four calls that scope a transaction.
// Everything else the driver offers (queries, cursors, commands) goes through
// the execution layer, which attaches the current session to each operation.
//
// ============================================================================

pub mod memory;

pub use memory::{BackendStats, MemoryBackend, MemorySession};

use crate::core::{Result, TransactionOptions};

/// Entry point into a backend driver: hands out sessions.
pub trait SessionFactory {
    /// The session type this backend produces.
    type Session: Session;

    /// Start a new backend session.
    ///
    /// May block on network I/O.
    fn start_session(&self) -> Result<Self::Session>;
}

/// A backend session scoping at most one active transaction.
///
/// All four operations may block on network I/O. Implementations are used
/// from a single thread per connection; no internal synchronization is
/// required of them.
pub trait Session {
    /// Open a transaction on this session with the given options.
    ///
    /// # Errors
    /// Returns an error if the session already has an open transaction.
    fn start_transaction(&mut self, options: &TransactionOptions) -> Result<()>;

    /// Commit the open transaction.
    fn commit_transaction(&mut self) -> Result<()>;

    /// Abort the open transaction, discarding its writes.
    fn abort_transaction(&mut self) -> Result<()>;

    /// End the session, releasing its server-side resources.
    fn end_session(&mut self) -> Result<()>;
}
