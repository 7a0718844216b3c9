//! Transaction lifecycle tests for the gateway.
//!
//! Covers commit visibility, per-call transactions, rollback and the failure
//! paths around begin, variable binding and commit.

pub mod basic_tests;
pub mod rollback_tests;
