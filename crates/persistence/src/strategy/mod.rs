//! Multitenancy strategy helpers.
//!
//! Only the shared-schema strategy is supported: all tenants in one set of
//! tables, separated by row-level-security policies that read the
//! transaction-scoped variables set by the
//! [`TenantIsolationGateway`](crate::gateway::TenantIsolationGateway).

mod shared_schema;

pub use shared_schema::{SharedSchemaConfig, TenantAwareTableBuilder};
