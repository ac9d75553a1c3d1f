use super::{Connection, config::ConnectionConfig};
use crate::backend::SessionFactory;
use crate::core::{ClientError, Result};
use log::warn;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Connection pool
///
/// Manages a pool of database connections for efficient resource
/// utilization. Each connection carries its own transaction state, so a
/// connection is only ever lent to one caller at a time via [`PoolGuard`].
pub struct ConnectionPool<F: SessionFactory + Clone> {
    /// Pool configuration
    config: ConnectionConfig,
    /// Backend session factory shared by all connections
    factory: F,
    /// Available connections
    available: Arc<Mutex<VecDeque<PooledConnection<F>>>>,
    /// Total number of connections created
    total_connections: Arc<AtomicUsize>,
}

/// A connection from the pool
struct PooledConnection<F: SessionFactory> {
    connection: Connection<F>,
    created_at: Instant,
    last_used: Instant,
}

impl<F: SessionFactory> PooledConnection<F> {
    fn new(connection: Connection<F>) -> Self {
        let now = Instant::now();
        Self {
            connection,
            created_at: now,
            last_used: now,
        }
    }

    fn is_expired(&self, max_lifetime: Option<Duration>) -> bool {
        if let Some(lifetime) = max_lifetime {
            self.created_at.elapsed() > lifetime
        } else {
            false
        }
    }

    fn is_idle_too_long(&self, idle_timeout: Option<Duration>) -> bool {
        if let Some(timeout) = idle_timeout {
            self.last_used.elapsed() > timeout
        } else {
            false
        }
    }

    fn refresh_last_used(&mut self) {
        self.last_used = Instant::now();
    }
}

impl<F: SessionFactory + Clone> ConnectionPool<F> {
    /// Create a new connection pool over the given backend
    pub fn new(config: ConnectionConfig, factory: F) -> Result<Self> {
        config.validate()?;

        let pool = Self {
            config,
            factory,
            available: Arc::new(Mutex::new(VecDeque::new())),
            total_connections: Arc::new(AtomicUsize::new(0)),
        };

        // Pre-create minimum connections
        pool.ensure_min_connections()?;

        Ok(pool)
    }

    /// Get a connection from the pool
    ///
    /// Blocks until a connection is available or the configured connect
    /// timeout elapses.
    pub fn get_connection(&self) -> Result<PoolGuard<F>> {
        let start = Instant::now();

        loop {
            // Try to get an available connection
            if let Some(mut pooled) = self.try_get_available()? {
                pooled.refresh_last_used();
                return Ok(PoolGuard {
                    connection: Some(pooled.connection),
                    pool: self.available.clone(),
                    total_connections: self.total_connections.clone(),
                });
            }

            // Try to create a new connection if under limit
            if let Some(conn) = self.try_create_connection() {
                return Ok(PoolGuard {
                    connection: Some(conn),
                    pool: self.available.clone(),
                    total_connections: self.total_connections.clone(),
                });
            }

            // Check timeout
            if start.elapsed() > self.config.connect_timeout {
                return Err(ClientError::Pool(
                    "Connection pool timeout: no connections available".into(),
                ));
            }

            // Wait a bit before retrying
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Try to get an available connection from the pool
    fn try_get_available(&self) -> Result<Option<PooledConnection<F>>> {
        let mut available = self.available.lock()?;

        let mut kept = VecDeque::with_capacity(available.len());
        let mut removed = 0usize;
        while let Some(pooled) = available.pop_front() {
            if pooled.is_expired(self.config.max_lifetime)
                || pooled.is_idle_too_long(self.config.idle_timeout)
            {
                removed += 1;
            } else {
                kept.push_back(pooled);
            }
        }
        *available = kept;

        if removed > 0 {
            self.total_connections.fetch_sub(removed, Ordering::SeqCst);
        }

        Ok(available.pop_front())
    }

    /// Try to create a new connection if under limit
    fn try_create_connection(&self) -> Option<Connection<F>> {
        let total = self.total_connections.load(Ordering::SeqCst);
        if total >= self.config.max_connections {
            return None;
        }

        let connection = Connection::new(self.config.clone(), self.factory.clone());
        self.total_connections.fetch_add(1, Ordering::SeqCst);

        Some(connection)
    }

    /// Ensure minimum number of connections
    fn ensure_min_connections(&self) -> Result<()> {
        let mut available = self.available.lock()?;

        while self.total_connections.load(Ordering::SeqCst) < self.config.min_connections {
            let connection = Connection::new(self.config.clone(), self.factory.clone());
            available.push_back(PooledConnection::new(connection));
            self.total_connections.fetch_add(1, Ordering::SeqCst);
        }

        Ok(())
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let available = self
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let total = self.total_connections.load(Ordering::SeqCst);

        PoolStats {
            total_connections: total,
            available_connections: available.len(),
            active_connections: total.saturating_sub(available.len()),
            max_connections: self.config.max_connections,
        }
    }
}

/// Connection pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub total_connections: usize,
    pub available_connections: usize,
    pub active_connections: usize,
    pub max_connections: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} active, {} available, max {}",
            self.active_connections,
            self.total_connections,
            self.available_connections,
            self.max_connections
        )
    }
}

/// RAII guard for pooled connections
///
/// Returns the connection to the pool when dropped. An open transaction is
/// rolled back first, so the next borrower always starts clean.
pub struct PoolGuard<F: SessionFactory> {
    connection: Option<Connection<F>>,
    pool: Arc<Mutex<VecDeque<PooledConnection<F>>>>,
    total_connections: Arc<AtomicUsize>,
}

impl<F: SessionFactory> PoolGuard<F> {
    /// Get a reference to the connection
    pub fn connection(&mut self) -> &mut Connection<F> {
        self.connection
            .as_mut()
            .expect("Connection already returned to pool")
    }

    /// Begin a transaction (convenience method)
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.connection().begin_transaction()
    }

    /// Commit a transaction (convenience method)
    pub fn commit(&mut self) -> Result<()> {
        self.connection().commit()
    }

    /// Rollback a transaction (convenience method)
    pub fn rollback(&mut self, to_level: Option<usize>) -> Result<()> {
        self.connection().rollback(to_level)
    }

    /// Run a unit of work in a transaction (convenience method)
    pub fn transaction<R, W>(&mut self, work: W, max_attempts: u32) -> Result<R>
    where
        W: FnMut(&mut Connection<F>) -> Result<R>,
    {
        self.connection().transaction(work, max_attempts)
    }
}

impl<F: SessionFactory> Drop for PoolGuard<F> {
    fn drop(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };

        // Never hand a dirty connection to the next borrower.
        if connection.is_in_transaction() {
            if let Err(err) = connection.rollback(Some(0)) {
                warn!(
                    "connection {}: rollback on pool return failed: {}",
                    connection.id(),
                    err
                );
            }
        }

        match self.pool.lock() {
            Ok(mut pool) => pool.push_back(PooledConnection::new(connection)),
            Err(_) => {
                // Poisoned pool lock; drop the connection instead of
                // returning it.
                self.total_connections.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}
