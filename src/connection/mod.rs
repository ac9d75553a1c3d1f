pub mod config;
pub mod pool;

use crate::backend::SessionFactory;
use crate::core::Result;
use crate::transaction::TransactionCoordinator;
use config::ConnectionConfig;
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global connection ID counter
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Database connection handle
///
/// Owns the transaction state of one logical connection: the nesting depth,
/// the backend sessions, and the committed hooks. A connection is used from
/// one thread at a time; every operation takes `&mut self`.
///
/// # Examples
///
/// ```
/// use docdb::{Connection, ConnectionConfig, MemoryBackend};
///
/// # fn main() -> docdb::Result<()> {
/// let mut conn = Connection::new(ConnectionConfig::default(), MemoryBackend::new());
///
/// conn.begin_transaction()?;
/// assert!(conn.is_in_transaction());
/// conn.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct Connection<F: SessionFactory> {
    /// Unique connection ID
    id: u64,

    /// Connection configuration
    config: ConnectionConfig,

    /// Backend session factory
    factory: F,

    /// Nesting depth and session bookkeeping
    pub(crate) coordinator: TransactionCoordinator<F::Session>,

    /// Hooks fired after a unit of work commits
    committed_hooks: Vec<Box<dyn FnMut() + Send>>,
}

impl<F: SessionFactory> Connection<F> {
    /// Create a new connection over the given backend.
    pub fn new(config: ConnectionConfig, factory: F) -> Self {
        let coordinator = TransactionCoordinator::new(
            config.transaction_options,
            config.session_transactions,
        );

        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::SeqCst),
            config,
            factory,
            coordinator,
            committed_hooks: Vec::new(),
        }
    }

    /// Get connection ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the connection configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Open a transaction level.
    ///
    /// The first level starts a backend session and a real transaction;
    /// nested calls only deepen the bookkeeping. With session-backed
    /// transactions disabled this is a no-op.
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.coordinator.begin(&self.factory)
    }

    /// Close one transaction level, committing the real transaction when
    /// the outermost level ends.
    pub fn commit(&mut self) -> Result<()> {
        self.coordinator.commit()
    }

    /// Unwind to `to_level` (default: one level down), aborting the real
    /// backend transaction. Out-of-range targets are silent no-ops.
    pub fn rollback(&mut self, to_level: Option<usize>) -> Result<()> {
        self.coordinator.rollback(to_level)
    }

    /// The active session, if any.
    ///
    /// The execution layer attaches this to every operation it issues while
    /// a transaction is open. Always `None` when session-backed transactions
    /// are disabled.
    pub fn session(&self) -> Option<&F::Session> {
        self.coordinator.session()
    }

    /// Mutable handle to the active session.
    pub fn session_mut(&mut self) -> Option<&mut F::Session> {
        self.coordinator.session_mut()
    }

    /// Check if a transaction is open on this connection
    pub fn is_in_transaction(&self) -> bool {
        self.coordinator.depth() > 0
    }

    /// Current transaction nesting depth
    pub fn transaction_level(&self) -> usize {
        self.coordinator.depth()
    }

    /// Register a hook fired after each committed unit of work.
    pub fn on_committed(&mut self, hook: impl FnMut() + Send + 'static) {
        self.committed_hooks.push(Box::new(hook));
    }

    pub(crate) fn fire_committed(&mut self) {
        debug!("connection {}: unit of work committed", self.id);
        for hook in &mut self.committed_hooks {
            hook();
        }
    }
}

impl<F: SessionFactory> Drop for Connection<F> {
    fn drop(&mut self) {
        // A connection abandoned mid-transaction aborts it.
        if self.is_in_transaction() {
            if let Err(err) = self.coordinator.rollback(Some(0)) {
                warn!("connection {}: rollback on drop failed: {}", self.id, err);
            }
        }
        self.coordinator.close_sessions();
    }
}
