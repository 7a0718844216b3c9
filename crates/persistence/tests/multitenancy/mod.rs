//! Multitenancy tests for the gateway.
//!
//! This module contains tests for tenant isolation, the cross-tenant path and
//! audit attribution.

pub mod cross_tenant_tests;
pub mod isolation_tests;
