//! PostgreSQL backend implementation.
//!
//! Connection pooling via `deadpool-postgres`. Scoped transactions set their
//! variables with `set_config(name, value, true)`, the function form of
//! `SET LOCAL`, so the values end with the transaction.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use opsconsole_persistence::backends::postgres::{PostgresBackend, PostgresConfig};
//! use opsconsole_persistence::gateway::{GatewayConfig, TenantIsolationGateway};
//!
//! # async fn main_example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = PostgresBackend::new(PostgresConfig::default()).await?;
//! let gateway = TenantIsolationGateway::new(Arc::new(backend), GatewayConfig::default());
//!
//! let open_orders: i64 = gateway
//!     .run_scoped("6f9619ff-8b86-d011-b42d-00c04fc964ff", |session| {
//!         Box::pin(async move {
//!             let row = session
//!                 .query_one("SELECT count(*) FROM orders WHERE status = 'open'", &[])
//!                 .await?;
//!             anyhow::Ok(row.get::<_, i64>(0))
//!         })
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Policies
//!
//! Tables need row-level security enabled and a policy reading the
//! variables. [`SharedSchemaConfig::policy_ddl`](crate::strategy::SharedSchemaConfig::policy_ddl)
//! generates it. The application role must not own the tables unless
//! `FORCE ROW LEVEL SECURITY` is set, and must not be a superuser.

mod backend;
mod guard;
mod transaction;

pub use backend::{PostgresBackend, PostgresConfig, PostgresSslMode};
pub use transaction::{PostgresExecutor, PostgresTransaction};
