// ============================================================================
// Transaction Module
// ============================================================================
//
// Emulates nested transactions on a backend that supports one active
// transaction per session and no savepoints. A depth counter per connection
// decides when the real backend transaction starts and ends; a bounded
// retry loop re-runs the whole unit of work when the commit itself fails.
//
// ============================================================================

pub mod coordinator;
pub mod retry;

pub use coordinator::TransactionCoordinator;
