//! Database backend implementations.
//!
//! # Available Backends
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Memory | always | In-process engine with row-level-security emulation, for tests and local runs |
//! | PostgreSQL | `postgres` | Pooled PostgreSQL with transaction-scoped variables |

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;
