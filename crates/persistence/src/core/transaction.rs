//! Transaction traits.
//!
//! A [`Transaction`] owns one pooled connection for its whole life. It is the
//! only object that can set transaction-scoped variables, and those variables
//! disappear when it commits or rolls back.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendResult;

use super::backend::Backend;

/// Transaction isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationLevel {
    /// Read committed - sees only committed data.
    #[default]
    ReadCommitted,
    /// Repeatable read - consistent reads within transaction.
    RepeatableRead,
    /// Serializable - full isolation (may reduce concurrency).
    Serializable,
}

impl IsolationLevel {
    /// Returns the SQL keywords for this level.
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IsolationLevel::ReadCommitted => write!(f, "read-committed"),
            IsolationLevel::RepeatableRead => write!(f, "repeatable-read"),
            IsolationLevel::Serializable => write!(f, "serializable"),
        }
    }
}

/// Options for starting a transaction.
#[derive(Debug, Clone, Default)]
pub struct TransactionOptions {
    /// The isolation level for the transaction.
    pub isolation_level: IsolationLevel,
    /// Whether this is a read-only transaction.
    pub read_only: bool,
    /// How long to wait for a pooled connection. `None` uses the backend default.
    pub acquire_timeout: Option<Duration>,
}

impl TransactionOptions {
    /// Creates new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the isolation level.
    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    /// Marks this as a read-only transaction.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Sets the connection acquisition timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }
}

/// Capability passed to the calls that open transactions and bind variables.
///
/// Only this crate can construct one, so [`TransactionProvider::begin_transaction`]
/// and [`Transaction::set_local`] are reachable from the gateway alone. Other
/// crates can still implement both traits for their own backends.
///
/// ```compile_fail
/// use opsconsole_persistence::backends::memory::MemoryBackend;
/// use opsconsole_persistence::core::{GatewayToken, TransactionOptions, TransactionProvider};
///
/// # async fn open(backend: &MemoryBackend) {
/// let _tx = backend
///     .begin_transaction(TransactionOptions::new(), GatewayToken(()))
///     .await;
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct GatewayToken(());

impl GatewayToken {
    pub(crate) fn new() -> Self {
        Self(())
    }
}

/// An open database transaction bound to one connection.
///
/// Changes are only persisted when `commit()` is called. Dropping an active
/// transaction without committing discards its changes.
#[async_trait]
pub trait Transaction: Send {
    /// The query executor scoped operations run against.
    type Executor: Send;

    /// Sets a variable that lives until this transaction ends.
    ///
    /// On PostgreSQL this is `set_config(name, value, true)`, the function form
    /// of `SET LOCAL`.
    async fn set_local(&mut self, name: &str, value: &str, token: GatewayToken)
    -> BackendResult<()>;

    /// Borrows the executor bound to this transaction.
    fn executor(&mut self) -> &mut Self::Executor;

    /// Commits the transaction, persisting all changes.
    async fn commit(self: Box<Self>) -> BackendResult<()>;

    /// Rolls back the transaction, discarding all changes.
    async fn rollback(self: Box<Self>) -> BackendResult<()>;

    /// Returns whether this transaction is still active.
    fn is_active(&self) -> bool;
}

/// Provider for transaction support.
#[async_trait]
pub trait TransactionProvider: Backend {
    /// The transaction type returned by this provider.
    type Transaction: Transaction + 'static;

    /// Acquires a connection and begins a new transaction on it.
    ///
    /// # Errors
    ///
    /// * `BackendError::PoolExhausted` / `BackendError::Timeout` - no connection
    ///   became available in time
    /// * `BackendError::ConnectionFailed` - the connection could not be opened
    async fn begin_transaction(
        &self,
        options: TransactionOptions,
        token: GatewayToken,
    ) -> BackendResult<Self::Transaction>;
}
