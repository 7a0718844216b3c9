//! The tenant isolation gateway.
//!
//! Every read or write against shared tables goes through one of three entry
//! points:
//!
//! - [`TenantIsolationGateway::run_scoped`] - confined to one tenant
//! - [`TenantIsolationGateway::run_scoped_with_user`] - confined to one tenant,
//!   with the acting user recorded for audit
//! - [`TenantIsolationGateway::run_unscoped_as_user`] - the deliberate
//!   cross-tenant path, logged on every use
//!
//! Each call opens its own transaction, sets the transaction-scoped
//! variables on that transaction and hands the caller a session bound to the
//! same transaction. The row-level-security policies consult those variables,
//! so a query can only see what the policy grants for the bound tenant. The
//! variables vanish at commit or rollback and are never written to a bare
//! pooled connection.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use opsconsole_persistence::backends::memory::MemoryBackend;
//! use opsconsole_persistence::gateway::{GatewayConfig, TenantIsolationGateway};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let backend = Arc::new(MemoryBackend::new());
//! let gateway = TenantIsolationGateway::new(backend, GatewayConfig::default());
//! let tenant = "6f9619ff-8b86-d011-b42d-00c04fc964ff";
//!
//! gateway
//!     .run_scoped(tenant, |mut session| {
//!         Box::pin(async move {
//!             session.insert("orders", "o-1", json!({"total": 42}))?;
//!             anyhow::Ok(())
//!         })
//!     })
//!     .await
//!     .unwrap();
//!
//! let count = gateway
//!     .run_scoped(tenant, |session| {
//!         Box::pin(async move { anyhow::Ok(session.count("orders")) })
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(count, 1);
//! # });
//! ```

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::core::{
    GatewayToken, IsolationLevel, Transaction, TransactionOptions, TransactionProvider,
};
use crate::error::{GatewayError, GatewayResult};
use crate::tenant::{IdentifierFormat, TenantId, TenantSession, UnscopedSession, UserId};

/// Executor type exposed to scoped operations for provider `P`.
pub type ExecutorOf<P> =
    <<P as TransactionProvider>::Transaction as Transaction>::Executor;

static VARIABLE_NAME_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[a-z_][a-z0-9_]*\.[a-z_][a-z0-9_]*$")
        .expect("variable name pattern is a valid regex")
});

/// Names of the transaction-scoped variables consulted by the storage policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionVariables {
    /// Variable holding the tenant identifier.
    pub tenant: String,
    /// Variable holding the acting user identifier.
    pub user: String,
}

impl Default for SessionVariables {
    fn default() -> Self {
        Self {
            tenant: "app.tenant_id".to_string(),
            user: "app.user_id".to_string(),
        }
    }
}

impl SessionVariables {
    /// Validates that both names are two-part custom settings (`prefix.name`).
    ///
    /// The names end up inside policy DDL, so only lowercase identifiers are
    /// accepted.
    pub fn validate(&self) -> Result<(), String> {
        for name in [&self.tenant, &self.user] {
            if !VARIABLE_NAME_PATTERN.is_match(name) {
                return Err(format!(
                    "session variable '{}' must look like 'prefix.name' (lowercase, digits, '_')",
                    name
                ));
            }
        }
        if self.tenant == self.user {
            return Err("tenant and user session variables must differ".to_string());
        }
        Ok(())
    }
}

/// Configuration for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Accepted shape of tenant and user identifiers.
    pub id_format: IdentifierFormat,
    /// Names of the transaction-scoped variables.
    pub variables: SessionVariables,
    /// Isolation level for every scoped transaction.
    pub isolation_level: IsolationLevel,
    /// Open scoped transactions read-only.
    pub read_only: bool,
    /// Maximum wait for a pooled connection.
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            id_format: IdentifierFormat::default(),
            variables: SessionVariables::default(),
            isolation_level: IsolationLevel::default(),
            read_only: false,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl GatewayConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.variables.validate()?;
        if self.acquire_timeout.is_zero() {
            return Err("acquire_timeout must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Builds the options every scoped transaction is opened with.
    pub fn transaction_options(&self) -> TransactionOptions {
        let mut options = TransactionOptions::new()
            .isolation_level(self.isolation_level)
            .acquire_timeout(self.acquire_timeout);
        if self.read_only {
            options = options.read_only();
        }
        options
    }
}

/// Confines storage access to a tenant via transaction-scoped variables.
///
/// The gateway is cheap to clone and safe to share between tasks. It holds no
/// per-call state: the tenant binding lives on the transaction each call opens.
pub struct TenantIsolationGateway<P> {
    provider: Arc<P>,
    config: GatewayConfig,
}

impl<P> Clone for TenantIsolationGateway<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            config: self.config.clone(),
        }
    }
}

impl<P: TransactionProvider> std::fmt::Debug for TenantIsolationGateway<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantIsolationGateway")
            .field("backend", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}

impl<P: TransactionProvider> TenantIsolationGateway<P> {
    /// Creates a gateway over the given transaction provider.
    pub fn new(provider: Arc<P>, config: GatewayConfig) -> Self {
        Self { provider, config }
    }

    /// Returns the gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Runs `operation` confined to `tenant_id`.
    ///
    /// The operation's queries run in a fresh transaction on which the tenant
    /// variable is set. Its changes are committed if it returns `Ok` and rolled
    /// back otherwise.
    ///
    /// # Errors
    ///
    /// * [`GatewayError::InvalidTenant`] - `operation` was not invoked
    /// * [`GatewayError::Begin`] / [`GatewayError::SessionVariable`] - `operation`
    ///   was not invoked and nothing was written
    /// * [`GatewayError::Operation`] - the operation failed; its changes were
    ///   rolled back
    /// * [`GatewayError::Commit`] - the commit failed; nothing was persisted
    pub async fn run_scoped<T, F>(&self, tenant_id: &str, operation: F) -> GatewayResult<T>
    where
        F: for<'t> FnOnce(TenantSession<'t, ExecutorOf<P>>) -> BoxFuture<'t, anyhow::Result<T>>
            + Send,
        T: Send,
    {
        let tenant = self.parse_tenant(tenant_id)?;

        let variables = &self.config.variables;
        let mut tx = self
            .begin_bound(&[(variables.tenant.as_str(), tenant.as_str())])
            .await?;

        debug!(tenant_id = %tenant, "Running tenant-scoped operation");
        let result = operation(TenantSession::new(tenant, None, tx.executor())).await;
        self.finish(tx, result).await
    }

    /// Runs `operation` confined to `tenant_id`, acting as `user_id`.
    ///
    /// Identical to [`run_scoped`](Self::run_scoped), and additionally sets the
    /// user variable so audit triggers can record who made each change.
    pub async fn run_scoped_with_user<T, F>(
        &self,
        tenant_id: &str,
        user_id: &str,
        operation: F,
    ) -> GatewayResult<T>
    where
        F: for<'t> FnOnce(TenantSession<'t, ExecutorOf<P>>) -> BoxFuture<'t, anyhow::Result<T>>
            + Send,
        T: Send,
    {
        let tenant = self.parse_tenant(tenant_id)?;
        let user = self.parse_user(user_id)?;

        let variables = &self.config.variables;
        let mut tx = self
            .begin_bound(&[
                (variables.tenant.as_str(), tenant.as_str()),
                (variables.user.as_str(), user.as_str()),
            ])
            .await?;

        debug!(tenant_id = %tenant, user_id = %user, "Running tenant-scoped operation as user");
        let result = operation(TenantSession::new(tenant, Some(user), tx.executor())).await;
        self.finish(tx, result).await
    }

    /// Runs `operation` as `user_id` without a tenant binding.
    ///
    /// This is the cross-tenant path. Only the user variable is set, so the
    /// operation sees whatever the storage policy grants to a user with no
    /// tenant. Every call is logged at `warn` level.
    pub async fn run_unscoped_as_user<T, F>(&self, user_id: &str, operation: F) -> GatewayResult<T>
    where
        F: for<'t> FnOnce(UnscopedSession<'t, ExecutorOf<P>>) -> BoxFuture<'t, anyhow::Result<T>>
            + Send,
        T: Send,
    {
        let user = self.parse_user(user_id)?;

        warn!(
            user_id = %user,
            backend = self.provider.name(),
            "Running cross-tenant operation without tenant scope"
        );

        let variables = &self.config.variables;
        let mut tx = self
            .begin_bound(&[(variables.user.as_str(), user.as_str())])
            .await?;

        let result = operation(UnscopedSession::new(user, tx.executor())).await;
        self.finish(tx, result).await
    }

    fn parse_tenant(&self, raw: &str) -> GatewayResult<TenantId> {
        TenantId::parse(raw, self.config.id_format).map_err(|reason| {
            debug!(reason = %reason, "Rejected tenant id");
            GatewayError::InvalidTenant {
                value: raw.to_string(),
                reason,
            }
        })
    }

    fn parse_user(&self, raw: &str) -> GatewayResult<UserId> {
        UserId::parse(raw, self.config.id_format).map_err(|reason| {
            debug!(reason = %reason, "Rejected user id");
            GatewayError::InvalidUser {
                value: raw.to_string(),
                reason,
            }
        })
    }

    /// Opens a transaction and sets each binding on it, in order.
    async fn begin_bound(&self, bindings: &[(&str, &str)]) -> GatewayResult<P::Transaction> {
        let mut tx = self
            .provider
            .begin_transaction(self.config.transaction_options(), GatewayToken::new())
            .await
            .map_err(|e| {
                warn!(backend = self.provider.name(), error = %e, "Failed to begin scoped transaction");
                GatewayError::Begin(e)
            })?;

        for (name, value) in bindings {
            if let Err(source) = tx.set_local(name, value, GatewayToken::new()).await {
                warn!(variable = %name, error = %source, "Failed to set session variable");
                if let Err(rollback_err) = Box::new(tx).rollback().await {
                    error!(error = %rollback_err, "Rollback after session variable failure also failed");
                }
                return Err(GatewayError::SessionVariable {
                    variable: name.to_string(),
                    source,
                });
            }
        }

        Ok(tx)
    }

    /// Commits on success, rolls back on failure.
    async fn finish<T>(&self, tx: P::Transaction, result: anyhow::Result<T>) -> GatewayResult<T> {
        match result {
            Ok(value) => {
                Box::new(tx).commit().await.map_err(|e| {
                    error!(error = %e, "Failed to commit scoped transaction");
                    GatewayError::Commit(e)
                })?;
                Ok(value)
            }
            Err(err) => {
                debug!(error = %err, "Scoped operation failed, rolling back");
                if let Err(rollback_err) = Box::new(tx).rollback().await {
                    error!(error = %rollback_err, "Rollback after failed operation also failed");
                }
                Err(GatewayError::Operation(err))
            }
        }
    }
}

/// Serde module for Duration with humantime format.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
