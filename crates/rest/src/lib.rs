//! # opsconsole-rest - Health endpoints for the operations console
//!
//! A thin axum adapter over [`opsconsole_health::HealthAggregator`]. It owns
//! server configuration, logging initialisation and the middleware stack, and
//! provides [`StorageProbe`](probes::StorageProbe), which plugs the storage
//! backend of the tenant gateway into the aggregator.
//!
//! ## API Endpoints
//!
//! | Endpoint | Success | Failure |
//! |----------|---------|---------|
//! | `GET /health` | 200, all primary probes healthy | 503 |
//! | `GET /health/detailed` | 200, primary probes healthy | 503 |
//! | `GET /health/ready` | 200 `ready` | 503 `not ready` |
//! | `GET /health/live` | 200 `alive` | - |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use opsconsole_health::HealthAggregator;
//! use opsconsole_persistence::backends::memory::MemoryBackend;
//! use opsconsole_rest::probes::StorageProbe;
//! use opsconsole_rest::{AppState, ServerConfig, create_app, serve};
//!
//! # async fn run() -> Result<(), opsconsole_rest::RestError> {
//! let config = ServerConfig::default();
//! let storage = StorageProbe::new(Arc::new(MemoryBackend::new()));
//! let aggregator = HealthAggregator::new().with_probe(storage.clone());
//!
//! let app = create_app(AppState::new(aggregator, Arc::new(storage), config.clone()));
//! serve(app, &config).await
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`] - Server configuration
//! - [`state`] - Application state
//! - [`handlers`] - HTTP request handlers
//! - [`routing`] - Route configuration
//! - [`probes`] - Probes over persistence types
//! - [`error`] - Error types

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod probes;
pub mod routing;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{RestError, RestResult};
pub use state::AppState;

use axum::Router;
use axum::http::{HeaderName, StatusCode};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Creates the axum application.
///
/// Routes come from [`routing::create_routes`]; the middleware stack is
/// configured from the state's [`ServerConfig`].
pub fn create_app(state: AppState) -> Router {
    let config = state.config().clone();
    info!(
        probes = ?state.aggregator().probe_names(),
        auxiliary = ?state.aggregator().auxiliary_probe_names(),
        "Creating health API"
    );

    let router = routing::create_routes(state);

    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ));

    let router = if config.enable_cors {
        router.layer(build_cors_layer(&config))
    } else {
        router
    };

    let router = router.layer(service_builder);

    if config.enable_request_id {
        let header = HeaderName::from_static(REQUEST_ID_HEADER);
        router
            .layer(PropagateRequestIdLayer::new(header.clone()))
            .layer(SetRequestIdLayer::new(header, MakeRequestUuid))
    } else {
        router
    }
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let mut cors = CorsLayer::new();

    if config.cors_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    if config.cors_methods == "*" {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Vec<_> = config
            .cors_methods
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_methods(methods);
    }

    if config.cors_headers == "*" {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<_> = config
            .cors_headers
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    cors
}

/// Binds the configured address and serves `app` until Ctrl-C.
pub async fn serve(app: Router, config: &ServerConfig) -> RestResult<()> {
    let address = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|source| RestError::Bind {
            address: address.clone(),
            source,
        })?;
    info!(address = %address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(RestError::Serve)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for Ctrl-C; serving until killed");
            std::future::pending::<()>().await
        }
    }
}

/// Initializes the tracing subscriber for logging.
///
/// Call once at start-up. `RUST_LOG` overrides `level`.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "opsconsole={level},opsconsole_rest={level},opsconsole_health={level},opsconsole_persistence={level},tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
