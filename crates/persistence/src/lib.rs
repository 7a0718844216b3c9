//! Operations Console Persistence Layer
//!
//! Tenant-isolated access to storage shared by every tenant. All tenants use
//! the same tables and the same connection pool. Isolation comes from
//! row-level-security policies that read transaction-scoped variables, and
//! from a gateway that sets those variables on a fresh transaction for every
//! unit of work.
//!
//! # Backend Features
//!
//! ```toml
//! [dependencies]
//! opsconsole-persistence = { version = "0.1", features = ["postgres"] }
//! ```
//!
//! - `postgres` - PostgreSQL via `tokio-postgres` and `deadpool-postgres`
//! - the in-process [`memory`](backends::memory) backend is always available
//!
//! # Architecture
//!
//! - [`gateway`] - [`TenantIsolationGateway`], the only entry point for scoped work
//! - [`tenant`] - validated identifiers and the sessions handed to operations
//! - [`core`] - backend and transaction traits
//! - [`strategy`] - row-level-security DDL for shared-schema tables
//! - [`backends`] - backend implementations
//! - [`error`] - error types for all operations
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use opsconsole_persistence::backends::memory::MemoryBackend;
//! use opsconsole_persistence::{GatewayConfig, GatewayError, TenantIsolationGateway};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let gateway = TenantIsolationGateway::new(Arc::new(MemoryBackend::new()), GatewayConfig::default());
//! let acme = "6f9619ff-8b86-d011-b42d-00c04fc964ff";
//! let globex = "0b2c4a6e-1d3f-4e5a-9b7c-8d9e0f1a2b3c";
//!
//! gateway
//!     .run_scoped(acme, |mut session| {
//!         Box::pin(async move {
//!             session.insert("orders", "o-1", json!({"total": 10}))?;
//!             anyhow::Ok(())
//!         })
//!     })
//!     .await
//!     .unwrap();
//!
//! // Another tenant sees nothing.
//! let visible = gateway
//!     .run_scoped(globex, |session| {
//!         Box::pin(async move { anyhow::Ok(session.count("orders")) })
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(visible, 0);
//!
//! // Malformed identifiers never reach storage.
//! let err = gateway
//!     .run_scoped("", |_session| Box::pin(async move { anyhow::Ok(()) }))
//!     .await
//!     .unwrap_err();
//! assert!(matches!(err, GatewayError::InvalidTenant { .. }));
//! # });
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod core;
pub mod error;
pub mod gateway;
pub mod strategy;
pub mod tenant;

// Re-export commonly used types at crate root
pub use error::{BackendError, BackendResult, GatewayError, GatewayResult};
pub use gateway::{ExecutorOf, GatewayConfig, SessionVariables, TenantIsolationGateway};
pub use tenant::{IdentifierFormat, TenantId, TenantSession, UnscopedSession, UserId};

// Re-export core traits
pub use core::{
    Backend, BackendKind, BackendPoolStats, GatewayToken, IsolationLevel, PoolSnapshot,
    Transaction, TransactionOptions, TransactionProvider,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
