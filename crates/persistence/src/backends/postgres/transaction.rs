//! Transaction support for PostgreSQL backend.

use async_trait::async_trait;
use deadpool_postgres::Client;
use tokio_postgres::Row;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;

use crate::core::{GatewayToken, Transaction, TransactionOptions, TransactionProvider};
use crate::error::{BackendError, BackendResult};

use super::PostgresBackend;
use super::guard::check_statement;

/// Maps a statement error onto the backend error taxonomy.
pub(crate) fn map_query_error(err: tokio_postgres::Error) -> BackendError {
    if let Some(db) = err.as_db_error() {
        if db.code() == &SqlState::INSUFFICIENT_PRIVILEGE
            && db.message().contains("row-level security")
        {
            return BackendError::PolicyViolation {
                table: db.table().unwrap_or("unknown").to_string(),
                message: db.message().to_string(),
            };
        }
        if db.code() == &SqlState::QUERY_CANCELED {
            return BackendError::Timeout {
                operation: "statement".to_string(),
                timeout_ms: 0,
            };
        }
        return BackendError::QueryError {
            message: db.message().to_string(),
        };
    }

    if err.is_closed() {
        return BackendError::ConnectionFailed {
            backend_name: "postgres".to_string(),
            message: err.to_string(),
        };
    }

    BackendError::QueryError {
        message: err.to_string(),
    }
}

/// Query surface of a scoped PostgreSQL transaction.
///
/// Every statement passes through the statement guard, so an operation
/// cannot rewrite the scope variables or end the transaction early.
pub struct PostgresExecutor {
    client: Option<Client>,
}

impl std::fmt::Debug for PostgresExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresExecutor")
            .field("attached", &self.client.is_some())
            .finish()
    }
}

impl PostgresExecutor {
    fn client(&self) -> BackendResult<&Client> {
        self.client.as_ref().ok_or(BackendError::InvalidTransaction)
    }

    /// Executes a statement, returning the resulting rows.
    pub async fn query(
        &self,
        statement: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> BackendResult<Vec<Row>> {
        check_statement(statement)?;
        self.client()?
            .query(statement, params)
            .await
            .map_err(map_query_error)
    }

    /// Executes a statement that returns exactly one row.
    pub async fn query_one(
        &self,
        statement: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> BackendResult<Row> {
        check_statement(statement)?;
        self.client()?
            .query_one(statement, params)
            .await
            .map_err(map_query_error)
    }

    /// Executes a statement that returns zero or one row.
    pub async fn query_opt(
        &self,
        statement: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> BackendResult<Option<Row>> {
        check_statement(statement)?;
        self.client()?
            .query_opt(statement, params)
            .await
            .map_err(map_query_error)
    }

    /// Executes a statement, returning the number of rows modified.
    pub async fn execute(
        &self,
        statement: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> BackendResult<u64> {
        check_statement(statement)?;
        self.client()?
            .execute(statement, params)
            .await
            .map_err(map_query_error)
    }

    /// Reads a setting as `current_setting(name, true)` does. Empty is `None`.
    pub async fn current_setting(&self, name: &str) -> BackendResult<Option<String>> {
        let row = self
            .client()?
            .query_one("SELECT current_setting($1, true)", &[&name])
            .await
            .map_err(map_query_error)?;
        let value: Option<String> = row.get(0);
        Ok(value.filter(|v| !v.is_empty()))
    }
}

/// A PostgreSQL transaction.
///
/// Wraps a pooled client with an open transaction. If the transaction is
/// dropped while still open (a cancelled or panicking operation), the client
/// is detached from the pool and its connection closed, which makes the
/// server roll the transaction back. It is never handed back to the pool
/// mid-transaction.
pub struct PostgresTransaction {
    executor: PostgresExecutor,
    active: bool,
}

impl std::fmt::Debug for PostgresTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTransaction")
            .field("active", &self.active)
            .finish()
    }
}

impl PostgresTransaction {
    async fn begin(client: Client, options: &TransactionOptions) -> BackendResult<Self> {
        let access = if options.read_only {
            "READ ONLY"
        } else {
            "READ WRITE"
        };
        let statement = format!(
            "BEGIN ISOLATION LEVEL {} {}",
            options.isolation_level.as_sql(),
            access
        );

        client.batch_execute(&statement).await.map_err(|e| {
            BackendError::ConnectionFailed {
                backend_name: "postgres".to_string(),
                message: format!("Failed to begin transaction: {}", e),
            }
        })?;

        Ok(Self {
            executor: PostgresExecutor {
                client: Some(client),
            },
            active: true,
        })
    }

    /// Ends the transaction with `statement`, detaching the client on failure.
    async fn finish(&mut self, statement: &str) -> BackendResult<()> {
        if !self.active {
            return Err(BackendError::InvalidTransaction);
        }
        self.active = false;

        let client = self
            .executor
            .client
            .take()
            .ok_or(BackendError::InvalidTransaction)?;

        match client.batch_execute(statement).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Transaction state unknown, keep the connection out of the pool.
                drop(Client::take(client));
                Err(map_query_error(e))
            }
        }
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    type Executor = PostgresExecutor;

    async fn set_local(
        &mut self,
        name: &str,
        value: &str,
        _token: GatewayToken,
    ) -> BackendResult<()> {
        if !self.active {
            return Err(BackendError::InvalidTransaction);
        }
        self.executor
            .client()?
            .query_one("SELECT set_config($1, $2, true)", &[&name, &value])
            .await
            .map_err(map_query_error)?;
        Ok(())
    }

    fn executor(&mut self) -> &mut PostgresExecutor {
        &mut self.executor
    }

    async fn commit(mut self: Box<Self>) -> BackendResult<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(mut self: Box<Self>) -> BackendResult<()> {
        self.finish("ROLLBACK").await
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if self.active {
            if let Some(client) = self.executor.client.take() {
                drop(Client::take(client));
            }
            tracing::warn!(
                "PostgreSQL transaction dropped while open, connection detached from pool"
            );
        }
    }
}

#[async_trait]
impl TransactionProvider for PostgresBackend {
    type Transaction = PostgresTransaction;

    async fn begin_transaction(
        &self,
        options: TransactionOptions,
        _token: GatewayToken,
    ) -> BackendResult<Self::Transaction> {
        let client = self.get_client(options.acquire_timeout).await?;
        PostgresTransaction::begin(client, &options).await
    }
}
