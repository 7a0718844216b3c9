//! Backend abstraction for database drivers.
//!
//! [`Backend`] is the object-safe surface shared by every driver: identity,
//! liveness and pool statistics. Transactional access lives in
//! [`TransactionProvider`](super::TransactionProvider).

use std::fmt::Debug;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::BackendError;

/// Identifies the type of database backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// PostgreSQL database.
    Postgres,
    /// In-process engine used by tests and local development.
    Memory,
    /// Custom or unknown backend.
    Custom(&'static str),
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Postgres => write!(f, "postgres"),
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// A database backend.
///
/// Object-safe, so the health layer can hold an `Arc<dyn Backend>` without
/// knowing the concrete driver.
#[async_trait]
pub trait Backend: Send + Sync + Debug {
    /// Returns the kind of backend.
    fn kind(&self) -> BackendKind;

    /// Returns a human-readable name for this backend.
    fn name(&self) -> &'static str;

    /// Checks if this backend is healthy and accepting connections.
    async fn health_check(&self) -> Result<(), BackendError>;

    /// Returns connection pool statistics, if the backend pools connections.
    fn pool_stats(&self) -> Option<&dyn BackendPoolStats> {
        None
    }
}

/// Extension trait for backends that support connection pooling statistics.
pub trait BackendPoolStats {
    /// Returns the current number of connections checked out.
    fn active_connections(&self) -> u32;

    /// Returns the current number of idle connections.
    fn idle_connections(&self) -> u32;

    /// Returns the maximum pool size.
    fn max_connections(&self) -> u32;

    /// Returns the number of callers waiting for a connection.
    fn pending_connections(&self) -> u32;

    /// Captures the current values as a serializable snapshot.
    fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            active: self.active_connections(),
            idle: self.idle_connections(),
            max: self.max_connections(),
            pending: self.pending_connections(),
        }
    }
}

/// Point-in-time pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    /// Connections checked out.
    pub active: u32,
    /// Connections idle in the pool.
    pub idle: u32,
    /// Maximum pool size.
    pub max: u32,
    /// Callers waiting for a connection.
    pub pending: u32,
}
