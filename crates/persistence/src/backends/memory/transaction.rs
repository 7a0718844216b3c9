//! Transactions and the policy-enforcing executor for the in-process backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OwnedSemaphorePermit;

use crate::core::{GatewayToken, Transaction, TransactionOptions, TransactionProvider};
use crate::error::{BackendError, BackendResult};

use super::backend::{MemoryBackend, MemoryConnection, MemoryState, Row, Table};

/// Staged writes of one table. `None` marks a deletion.
type Staged = BTreeMap<(String, String), Option<Row>>;

enum Visibility<'a> {
    Tenant(&'a str),
    All,
    Nothing,
}

/// Query surface of an in-process transaction.
///
/// Every read and write is filtered through the row-level-security policy
/// using the variables set on the enclosing transaction.
pub struct MemoryExecutor {
    state: Arc<MemoryState>,
    connection: Option<MemoryConnection>,
    locals: HashMap<String, String>,
    staged: HashMap<String, Staged>,
    read_only: bool,
}

impl std::fmt::Debug for MemoryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryExecutor")
            .field("connection", &self.connection_id())
            .field("locals", &self.locals)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl MemoryExecutor {
    /// Returns the id of the pooled connection this executor runs on.
    pub fn connection_id(&self) -> Option<u64> {
        self.connection.as_ref().map(|c| c.id)
    }

    /// Returns the effective value of a setting, like `current_setting(name, true)`.
    ///
    /// A transaction-scoped value shadows a connection-scoped one. Empty
    /// values count as unset.
    pub fn current_setting(&self, name: &str) -> Option<String> {
        self.setting(name).map(str::to_string)
    }

    /// Inserts a row for the tenant bound to this transaction.
    pub fn insert(&mut self, table: &str, id: &str, data: Value) -> BackendResult<Row> {
        let tenant = self
            .setting(&self.state.config.variables.tenant)
            .map(str::to_string)
            .ok_or_else(|| BackendError::PolicyViolation {
                table: table.to_string(),
                message: "no tenant bound to insert into".to_string(),
            })?;

        self.insert_row(
            table,
            Row {
                tenant_id: tenant,
                id: id.to_string(),
                data,
                updated_by: None,
            },
        )
    }

    /// Inserts a fully specified row, subject to the policy's write check.
    ///
    /// `updated_by` is overwritten with the current user variable.
    pub fn insert_row(&mut self, table: &str, mut row: Row) -> BackendResult<Row> {
        self.ensure_writable("INSERT")?;

        if !self.permits(&row.tenant_id) {
            return Err(BackendError::PolicyViolation {
                table: table.to_string(),
                message: "new row violates row-level security policy".to_string(),
            });
        }

        let key = (row.tenant_id.clone(), row.id.clone());
        if self.merged(table).contains_key(&key) {
            return Err(BackendError::QueryError {
                message: format!(
                    "duplicate key value violates unique constraint on {} (id {})",
                    table, row.id
                ),
            });
        }

        row.updated_by = self.current_user();
        self.stage(table, key, Some(row.clone()));
        Ok(row)
    }

    /// Fetches a visible row by id.
    pub fn get(&self, table: &str, id: &str) -> Option<Row> {
        self.visible(table).into_iter().find(|row| row.id == id)
    }

    /// Returns every visible row of `table`, ordered by `(tenant_id, id)`.
    pub fn select(&self, table: &str) -> Vec<Row> {
        self.visible(table)
    }

    /// Returns the number of visible rows.
    pub fn count(&self, table: &str) -> usize {
        self.visible(table).len()
    }

    /// Replaces the payload of every visible row with this id.
    ///
    /// Returns the number of rows updated. Rows hidden by the policy are
    /// silently skipped, as an `UPDATE` under row-level security would.
    pub fn update(&mut self, table: &str, id: &str, data: Value) -> BackendResult<u64> {
        self.ensure_writable("UPDATE")?;

        let user = self.current_user();
        let targets: Vec<Row> = self
            .visible(table)
            .into_iter()
            .filter(|row| row.id == id)
            .collect();

        for mut row in targets.iter().cloned() {
            row.data = data.clone();
            row.updated_by = user.clone();
            self.stage(table, (row.tenant_id.clone(), row.id.clone()), Some(row));
        }
        Ok(targets.len() as u64)
    }

    /// Deletes every visible row with this id. Returns the number deleted.
    pub fn delete(&mut self, table: &str, id: &str) -> BackendResult<u64> {
        self.ensure_writable("DELETE")?;

        let keys: Vec<(String, String)> = self
            .visible(table)
            .into_iter()
            .filter(|row| row.id == id)
            .map(|row| (row.tenant_id, row.id))
            .collect();

        for key in &keys {
            self.stage(table, key.clone(), None);
        }
        Ok(keys.len() as u64)
    }

    fn setting(&self, name: &str) -> Option<&str> {
        self.locals
            .get(name)
            .or_else(|| {
                self.connection
                    .as_ref()
                    .and_then(|c| c.session_settings.get(name))
            })
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn current_user(&self) -> Option<String> {
        self.current_setting(&self.state.config.variables.user)
    }

    fn visibility(&self) -> Visibility<'_> {
        let variables = &self.state.config.variables;
        match (self.setting(&variables.tenant), self.setting(&variables.user)) {
            (Some(tenant), _) => Visibility::Tenant(tenant),
            (None, Some(_)) => Visibility::All,
            (None, None) => Visibility::Nothing,
        }
    }

    fn permits(&self, tenant_id: &str) -> bool {
        match self.visibility() {
            Visibility::Tenant(bound) => bound == tenant_id,
            Visibility::All => true,
            Visibility::Nothing => false,
        }
    }

    fn ensure_writable(&self, statement: &str) -> BackendResult<()> {
        if self.read_only {
            return Err(BackendError::RejectedStatement {
                reason: format!("cannot execute {} in a read-only transaction", statement),
            });
        }
        Ok(())
    }

    /// Committed rows overlaid with this transaction's staged writes.
    fn merged(&self, table: &str) -> Table {
        let mut rows = self
            .state
            .tables
            .read()
            .get(table)
            .cloned()
            .unwrap_or_default();

        if let Some(staged) = self.staged.get(table) {
            for (key, write) in staged {
                match write {
                    Some(row) => {
                        rows.insert(key.clone(), row.clone());
                    }
                    None => {
                        rows.remove(key);
                    }
                }
            }
        }
        rows
    }

    fn visible(&self, table: &str) -> Vec<Row> {
        self.merged(table)
            .into_values()
            .filter(|row| self.permits(&row.tenant_id))
            .collect()
    }

    fn stage(&mut self, table: &str, key: (String, String), write: Option<Row>) {
        self.staged
            .entry(table.to_string())
            .or_default()
            .insert(key, write);
    }
}

/// A transaction on the in-process backend.
///
/// Dropping an active transaction discards its staged writes and returns the
/// connection to the pool. Since the variables live on the transaction, the
/// connection goes back clean.
pub struct MemoryTransaction {
    executor: MemoryExecutor,
    active: bool,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for MemoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("active", &self.active)
            .field("executor", &self.executor)
            .finish()
    }
}

impl MemoryTransaction {
    fn release(&mut self) {
        self.active = false;
        self.executor.locals.clear();
        self.executor.staged.clear();
        if let Some(connection) = self.executor.connection.take() {
            self.executor.state.checkin(connection);
        }
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    type Executor = MemoryExecutor;

    async fn set_local(
        &mut self,
        name: &str,
        value: &str,
        _token: GatewayToken,
    ) -> BackendResult<()> {
        if !self.active {
            return Err(BackendError::InvalidTransaction);
        }
        if self.executor.state.faults.set_local_fails(name) {
            return Err(BackendError::QueryError {
                message: format!("injected failure setting {}", name),
            });
        }

        self.executor
            .locals
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn executor(&mut self) -> &mut MemoryExecutor {
        &mut self.executor
    }

    async fn commit(mut self: Box<Self>) -> BackendResult<()> {
        if !self.active {
            return Err(BackendError::InvalidTransaction);
        }

        if self.executor.state.faults.commit_fails() {
            self.release();
            return Err(BackendError::ConnectionFailed {
                backend_name: "memory".to_string(),
                message: "injected failure during commit".to_string(),
            });
        }

        let staged = std::mem::take(&mut self.executor.staged);
        {
            let mut tables = self.executor.state.tables.write();
            for (table, writes) in staged {
                let rows = tables.entry(table).or_default();
                for (key, write) in writes {
                    match write {
                        Some(row) => {
                            rows.insert(key, row);
                        }
                        None => {
                            rows.remove(&key);
                        }
                    }
                }
            }
        }

        self.executor
            .state
            .transactions_committed
            .fetch_add(1, Ordering::SeqCst);
        self.release();
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> BackendResult<()> {
        if !self.active {
            return Err(BackendError::InvalidTransaction);
        }
        self.release();
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.active {
            tracing::debug!(
                connection = ?self.executor.connection_id(),
                "In-memory transaction dropped without commit, discarding staged writes"
            );
            self.release();
        }
    }
}

#[async_trait]
impl TransactionProvider for MemoryBackend {
    type Transaction = MemoryTransaction;

    async fn begin_transaction(
        &self,
        options: TransactionOptions,
        _token: GatewayToken,
    ) -> BackendResult<Self::Transaction> {
        let state = &self.state;

        if state.faults.begin_fails() {
            return Err(BackendError::ConnectionFailed {
                backend_name: "memory".to_string(),
                message: "injected failure during begin".to_string(),
            });
        }

        let wait = options.acquire_timeout.unwrap_or(state.config.acquire_timeout);
        state.waiting.fetch_add(1, Ordering::SeqCst);
        let acquired =
            tokio::time::timeout(wait, Arc::clone(&state.permits).acquire_owned()).await;
        state.waiting.fetch_sub(1, Ordering::SeqCst);

        let permit = match acquired {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(BackendError::Unavailable {
                    backend_name: "memory".to_string(),
                    message: "connection pool closed".to_string(),
                });
            }
            Err(_) => {
                tracing::debug!(wait_ms = wait.as_millis() as u64, "In-memory pool exhausted");
                return Err(BackendError::PoolExhausted {
                    backend_name: "memory".to_string(),
                });
            }
        };

        state.transactions_begun.fetch_add(1, Ordering::SeqCst);
        let connection = state.checkout();

        Ok(MemoryTransaction {
            executor: MemoryExecutor {
                state: Arc::clone(state),
                connection: Some(connection),
                locals: HashMap::new(),
                staged: HashMap::new(),
                read_only: options.read_only,
            },
            active: true,
            _permit: permit,
        })
    }
}
