//! Core storage traits and abstractions.
//!
//! - [`Backend`] - driver identity, liveness and pool statistics
//! - [`Transaction`] - one connection, one transaction, transaction-scoped variables
//! - [`TransactionProvider`] - opens transactions for the gateway
//!
//! ```text
//! Backend
//!     └── TransactionProvider ──begin──> Transaction ──executor──> Executor
//! ```

mod backend;
mod transaction;

pub use backend::{Backend, BackendKind, BackendPoolStats, PoolSnapshot};
pub use transaction::{
    GatewayToken, IsolationLevel, Transaction, TransactionOptions, TransactionProvider,
};
