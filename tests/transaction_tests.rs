/// Transaction tests
///
/// Tests for nested transaction emulation: one real backend transaction per
/// outermost begin/commit pair, whatever the logical nesting looks like.
/// Run with: cargo test --test transaction_tests
use docdb::{Connection, ConnectionConfig, MemoryBackend, Session};

fn connection(backend: &MemoryBackend) -> Connection<MemoryBackend> {
    Connection::new(ConnectionConfig::default(), backend.clone())
}

#[test]
fn test_nested_begin_commit_hits_backend_once() {
    let backend = MemoryBackend::new();
    let mut conn = connection(&backend);

    conn.begin_transaction().unwrap();
    conn.begin_transaction().unwrap();
    conn.commit().unwrap();
    conn.commit().unwrap();

    let stats = backend.stats();
    assert_eq!(stats.sessions_started, 1);
    assert_eq!(stats.transactions_started, 1);
    assert_eq!(stats.commits, 1);
    assert_eq!(stats.aborts, 0);
    assert_eq!(stats.sessions_ended, 1);
    assert_eq!(conn.transaction_level(), 0);
}

#[test]
fn test_every_outer_pair_starts_a_fresh_transaction() {
    let backend = MemoryBackend::new();
    let mut conn = connection(&backend);

    for _ in 0..3 {
        conn.begin_transaction().unwrap();
        conn.commit().unwrap();
    }

    let stats = backend.stats();
    assert_eq!(stats.transactions_started, 3);
    assert_eq!(stats.commits, 3);
    assert_eq!(stats.sessions_started, 3);
    assert_eq!(stats.sessions_ended, 3);
}

#[test]
fn test_default_rollback_from_depth_two_aborts() {
    let backend = MemoryBackend::new();
    let mut conn = connection(&backend);

    conn.begin_transaction().unwrap();
    conn.begin_transaction().unwrap();

    conn.rollback(None).unwrap();

    // The single real transaction is gone even though one logical level
    // remains open.
    assert_eq!(conn.transaction_level(), 1);
    assert_eq!(backend.stats().aborts, 1);
    assert!(conn.session().is_none());

    // Unwinding the remaining level has nothing left to abort.
    conn.rollback(None).unwrap();
    assert_eq!(conn.transaction_level(), 0);
    assert_eq!(backend.stats().aborts, 1);
}

#[test]
fn test_rollback_to_out_of_range_level_is_ignored() {
    let backend = MemoryBackend::new();
    let mut conn = connection(&backend);

    conn.begin_transaction().unwrap();
    conn.begin_transaction().unwrap();

    conn.rollback(Some(5)).unwrap();

    assert_eq!(conn.transaction_level(), 2);
    assert_eq!(backend.stats().aborts, 0);
    assert!(conn.session().is_some());
}

#[test]
fn test_stray_commits_and_rollbacks_are_safe() {
    let backend = MemoryBackend::new();
    let mut conn = connection(&backend);

    conn.commit().unwrap();
    conn.commit().unwrap();
    conn.rollback(None).unwrap();

    assert_eq!(conn.transaction_level(), 0);
    assert_eq!(backend.stats(), Default::default());
}

#[test]
fn test_session_attached_only_while_open() {
    let backend = MemoryBackend::new();
    let mut conn = connection(&backend);

    assert!(conn.session().is_none());

    conn.begin_transaction().unwrap();
    assert!(conn.session().is_some());

    conn.begin_transaction().unwrap();
    // Nested level reuses the same session.
    assert_eq!(backend.stats().sessions_started, 1);

    conn.commit().unwrap();
    assert!(conn.session().is_some());

    conn.commit().unwrap();
    assert!(conn.session().is_none());
}

#[test]
fn test_disabled_mode_touches_nothing() {
    let backend = MemoryBackend::new();
    let config = ConnectionConfig::default().session_transactions(false);
    let mut conn = Connection::new(config, backend.clone());

    conn.begin_transaction().unwrap();
    conn.begin_transaction().unwrap();
    conn.commit().unwrap();
    conn.rollback(None).unwrap();

    assert_eq!(conn.transaction_level(), 0);
    assert!(conn.session().is_none());
    assert_eq!(backend.stats(), Default::default());
}

#[test]
fn test_drop_mid_transaction_aborts_and_ends_session() {
    let backend = MemoryBackend::new();

    {
        let mut conn = connection(&backend);
        conn.begin_transaction().unwrap();
        conn.begin_transaction().unwrap();
    }

    let stats = backend.stats();
    assert_eq!(stats.aborts, 1);
    assert_eq!(stats.commits, 0);
    assert_eq!(backend.open_sessions(), 0);
}

#[test]
fn test_abort_failure_propagates() {
    let backend = MemoryBackend::new();
    let mut conn = connection(&backend);

    conn.begin_transaction().unwrap();

    // Ending the session out from under the connection makes the abort
    // fail; the error must reach the caller unchanged.
    conn.session_mut().unwrap().end_session().unwrap();
    conn.session_mut().unwrap().abort_transaction().unwrap();

    let result = conn.rollback(None);
    assert!(result.is_err());
}
