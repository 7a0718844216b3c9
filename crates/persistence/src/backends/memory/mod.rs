//! In-process backend.
//!
//! Emulates a pooled relational store closely enough to exercise the gateway
//! without a database server:
//!
//! - a bounded pool of connections, each carrying connection-scoped settings
//! - transactions with their own transaction-scoped variables
//! - a row-level-security policy consulting those variables
//! - writes staged per transaction and applied atomically on commit
//! - an `updated_by` audit column filled from the user variable
//! - fault injection for begin, set-variable and commit
//!
//! # Policy
//!
//! | tenant variable | user variable | visible rows |
//! |-----------------|---------------|--------------|
//! | set             | any           | rows of that tenant |
//! | unset           | set           | all rows |
//! | unset           | unset         | none |
//!
//! Writes must satisfy the same predicate, so an insert for another tenant is
//! a [`PolicyViolation`](crate::error::BackendError::PolicyViolation).

mod backend;
mod transaction;

pub use backend::{MemoryBackend, MemoryConfig, MemoryFaults, Row};
pub use transaction::{MemoryExecutor, MemoryTransaction};
