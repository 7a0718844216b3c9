//! In-process backend implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::core::{Backend, BackendKind, BackendPoolStats};
use crate::error::BackendError;
use crate::gateway::SessionVariables;

/// A stored row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    /// Owning tenant.
    pub tenant_id: String,
    /// Row identifier, unique per tenant.
    pub id: String,
    /// Row payload.
    pub data: Value,
    /// User variable in effect when the row was last written.
    pub updated_by: Option<String>,
}

/// Rows of one table keyed by `(tenant_id, id)`.
pub(crate) type Table = BTreeMap<(String, String), Row>;

/// Configuration for the in-process backend.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Maximum number of concurrently open transactions.
    pub max_connections: u32,
    /// Acquisition timeout used when the caller does not supply one.
    pub acquire_timeout: Duration,
    /// Variable names the row-level-security policy consults.
    pub variables: SessionVariables,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            variables: SessionVariables::default(),
        }
    }
}

/// A pooled connection.
///
/// `session_settings` models connection-scoped settings (a plain `SET`). They
/// survive across transactions on the same connection, which is exactly why
/// the gateway must never write them.
#[derive(Debug)]
pub(crate) struct MemoryConnection {
    pub(crate) id: u64,
    pub(crate) session_settings: HashMap<String, String>,
}

/// Injected failures.
///
/// Each switch stays on until turned off.
#[derive(Debug, Default)]
pub struct MemoryFaults {
    begin: AtomicBool,
    commit: AtomicBool,
    unavailable: AtomicBool,
    set_local: Mutex<Option<String>>,
}

impl MemoryFaults {
    /// Makes every `begin_transaction` fail with `ConnectionFailed`.
    pub fn fail_begin(&self, on: bool) {
        self.begin.store(on, Ordering::SeqCst);
    }

    /// Makes every commit fail with `ConnectionFailed`.
    pub fn fail_commit(&self, on: bool) {
        self.commit.store(on, Ordering::SeqCst);
    }

    /// Makes `set_local` fail for the named variable. `None` clears the fault.
    pub fn fail_set_local(&self, variable: Option<&str>) {
        *self.set_local.lock() = variable.map(str::to_string);
    }

    /// Makes `health_check` report the backend as unavailable.
    pub fn set_unavailable(&self, on: bool) {
        self.unavailable.store(on, Ordering::SeqCst);
    }

    pub(crate) fn begin_fails(&self) -> bool {
        self.begin.load(Ordering::SeqCst)
    }

    pub(crate) fn commit_fails(&self) -> bool {
        self.commit.load(Ordering::SeqCst)
    }

    pub(crate) fn set_local_fails(&self, variable: &str) -> bool {
        self.set_local.lock().as_deref() == Some(variable)
    }

    fn is_unavailable(&self) -> bool {
        self.unavailable.load(Ordering::SeqCst)
    }
}

/// Shared state behind every handle to one in-process database.
#[derive(Debug)]
pub(crate) struct MemoryState {
    pub(crate) config: MemoryConfig,
    pub(crate) tables: RwLock<HashMap<String, Table>>,
    pub(crate) idle: Mutex<Vec<MemoryConnection>>,
    pub(crate) permits: Arc<Semaphore>,
    pub(crate) faults: MemoryFaults,
    pub(crate) waiting: AtomicU32,
    pub(crate) next_connection_id: AtomicU64,
    pub(crate) transactions_begun: AtomicU64,
    pub(crate) transactions_committed: AtomicU64,
}

impl MemoryState {
    /// Takes an idle connection or opens a new one.
    pub(crate) fn checkout(&self) -> MemoryConnection {
        self.idle.lock().pop().unwrap_or_else(|| MemoryConnection {
            id: self.next_connection_id.fetch_add(1, Ordering::SeqCst),
            session_settings: HashMap::new(),
        })
    }

    /// Returns a connection to the idle list.
    pub(crate) fn checkin(&self, connection: MemoryConnection) {
        self.idle.lock().push(connection);
    }
}

/// In-process backend with row-level-security emulation.
///
/// Cloning is cheap and every clone shares the same data and pool.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    pub(crate) state: Arc<MemoryState>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an empty backend with default configuration.
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    /// Creates an empty backend with the given configuration.
    pub fn with_config(config: MemoryConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_connections as usize));
        Self {
            state: Arc::new(MemoryState {
                config,
                tables: RwLock::new(HashMap::new()),
                idle: Mutex::new(Vec::new()),
                permits,
                faults: MemoryFaults::default(),
                waiting: AtomicU32::new(0),
                next_connection_id: AtomicU64::new(0),
                transactions_begun: AtomicU64::new(0),
                transactions_committed: AtomicU64::new(0),
            }),
        }
    }

    /// Creates an empty backend limited to `max` concurrent transactions.
    pub fn with_max_connections(max: u32) -> Self {
        Self::with_config(MemoryConfig {
            max_connections: max,
            ..Default::default()
        })
    }

    /// Returns the fault injection switches.
    pub fn faults(&self) -> &MemoryFaults {
        &self.state.faults
    }

    /// Returns all rows of `table`, bypassing the policy.
    ///
    /// This is the table owner's view, for assertions in tests.
    pub fn rows_unchecked(&self, table: &str) -> Vec<Row> {
        self.state
            .tables
            .read()
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Applies a connection-scoped setting to every idle connection.
    ///
    /// Emulates a plain `SET name = value` issued on pooled connections.
    pub fn set_session_setting(&self, name: &str, value: &str) {
        for connection in self.state.idle.lock().iter_mut() {
            connection
                .session_settings
                .insert(name.to_string(), value.to_string());
        }
    }

    /// Returns the connection-scoped settings of every idle connection.
    pub fn idle_session_settings(&self) -> Vec<HashMap<String, String>> {
        self.state
            .idle
            .lock()
            .iter()
            .map(|c| c.session_settings.clone())
            .collect()
    }

    /// Returns the number of connections opened so far.
    pub fn connections_opened(&self) -> u64 {
        self.state.next_connection_id.load(Ordering::SeqCst)
    }

    /// Returns the number of transactions begun so far.
    pub fn transactions_begun(&self) -> u64 {
        self.state.transactions_begun.load(Ordering::SeqCst)
    }

    /// Returns the number of transactions committed so far.
    pub fn transactions_committed(&self) -> u64 {
        self.state.transactions_committed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        if self.state.faults.is_unavailable() {
            return Err(BackendError::Unavailable {
                backend_name: "memory".to_string(),
                message: "marked unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn pool_stats(&self) -> Option<&dyn BackendPoolStats> {
        Some(self)
    }
}

impl BackendPoolStats for MemoryBackend {
    fn active_connections(&self) -> u32 {
        let available = self.state.permits.available_permits() as u32;
        self.state.config.max_connections.saturating_sub(available)
    }

    fn idle_connections(&self) -> u32 {
        self.state.idle.lock().len() as u32
    }

    fn max_connections(&self) -> u32 {
        self.state.config.max_connections
    }

    fn pending_connections(&self) -> u32 {
        self.state.waiting.load(Ordering::SeqCst)
    }
}
