//! Health route configuration.

use axum::{Router, routing::get};

use crate::handlers;
use crate::state::AppState;

/// Creates the health routes.
///
/// # Routes
///
/// - `GET /health` - Primary probes
/// - `GET /health/detailed` - Primary and auxiliary probes
/// - `GET /health/ready` - Readiness probe
/// - `GET /health/live` - Liveness probe
///
/// Anything else answers with a JSON 404.
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/health/detailed", get(handlers::detailed_health_handler))
        .route("/health/ready", get(handlers::readiness_handler))
        .route("/health/live", get(handlers::liveness_handler))
        .fallback(handlers::not_found_handler)
        .with_state(state)
}
