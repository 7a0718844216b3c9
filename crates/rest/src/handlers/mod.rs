//! HTTP request handlers.
//!
//! - [`health`] - health, detailed health, readiness and liveness
//! - [`fallback`] - JSON 404 for unknown routes

pub mod fallback;
pub mod health;

pub use fallback::not_found_handler;
pub use health::{detailed_health_handler, health_handler, liveness_handler, readiness_handler};
