//! Route configuration.
//!
//! Maps HTTP paths to handlers.

pub mod health_routes;

pub use health_routes::create_routes;
