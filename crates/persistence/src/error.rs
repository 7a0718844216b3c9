//! Error types for the persistence layer.
//!
//! Errors are split in two layers. [`BackendError`] describes what went wrong
//! inside a storage driver. [`GatewayError`] is what callers of the
//! [`TenantIsolationGateway`](crate::gateway::TenantIsolationGateway) see, and
//! tells them at which step of a scoped unit of work the failure happened.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// Result alias for driver-level operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Result alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors returned by a scoped-operation entry point.
///
/// Every variant is propagated to the caller. The gateway never swallows a
/// failure, because a silent failure after a partial write is a correctness
/// risk on this path.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The tenant identifier was empty or malformed. Storage was not touched.
    #[error("invalid tenant id '{value}': {reason}")]
    InvalidTenant { value: String, reason: String },

    /// The user identifier was empty or malformed. Storage was not touched.
    #[error("invalid user id '{value}': {reason}")]
    InvalidUser { value: String, reason: String },

    /// No transaction could be opened.
    #[error("failed to begin transaction")]
    Begin(#[source] BackendError),

    /// A transaction-scoped variable could not be set. The transaction was
    /// rolled back before the caller's operation ran.
    #[error("failed to set session variable {variable}")]
    SessionVariable {
        variable: String,
        #[source]
        source: BackendError,
    },

    /// The caller's unit of work failed. The transaction was rolled back.
    #[error("scoped operation failed")]
    Operation(#[source] anyhow::Error),

    /// The transaction could not be committed. Nothing was persisted.
    #[error("failed to commit transaction")]
    Commit(#[source] BackendError),
}

impl GatewayError {
    /// Returns `true` if retrying the whole call is known to be safe.
    ///
    /// Only failures that happened before any caller query ran qualify, and
    /// only when the cause is an infrastructure condition that may clear up
    /// on its own (pool exhaustion, dropped connection, timeout).
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Begin(source) => source.is_transient(),
            _ => false,
        }
    }

    /// Returns the error raised inside the caller's operation, if any.
    pub fn operation_error(&self) -> Option<&anyhow::Error> {
        match self {
            GatewayError::Operation(err) => Some(err),
            _ => None,
        }
    }

    /// Returns `true` if the failure was caused by bad caller input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            GatewayError::InvalidTenant { .. } | GatewayError::InvalidUser { .. }
        )
    }
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// An acquisition or statement deadline elapsed.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Query execution error.
    #[error("query execution failed: {message}")]
    QueryError { message: String },

    /// A row-level-security policy rejected the statement.
    #[error("row-level security policy violation on {table}: {message}")]
    PolicyViolation { table: String, message: String },

    /// The statement is not allowed inside a scoped transaction.
    #[error("statement rejected inside scoped transaction: {reason}")]
    RejectedStatement { reason: String },

    /// The transaction was already committed or rolled back.
    #[error("transaction no longer valid")]
    InvalidTransaction,

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl BackendError {
    /// Returns `true` for conditions that may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Unavailable { .. }
                | BackendError::ConnectionFailed { .. }
                | BackendError::PoolExhausted { .. }
                | BackendError::Timeout { .. }
        )
    }
}
