//! Health check endpoint handlers.
//!
//! None of these handlers fail. An unhealthy system is reported with
//! `503 Service Unavailable` and the full report as the body, so monitoring
//! can tell which subsystem is down.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use opsconsole_health::{HealthStatus, run_isolated};
use tracing::debug;

use crate::state::AppState;

fn status_code(status: HealthStatus) -> StatusCode {
    if status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Handler for the health check endpoint.
///
/// # HTTP Request
///
/// `GET [base]/health`
///
/// # Response
///
/// - `200 OK` - every primary probe is healthy
/// - `503 Service Unavailable` - at least one is degraded or unhealthy
pub async fn health_handler(State(state): State<AppState>) -> Response {
    let report = state.aggregator().check_health().await;
    debug!(
        status = %report.status,
        services = report.services.len(),
        "Health check completed"
    );

    (status_code(report.status), Json(report)).into_response()
}

/// Handler for the detailed health check endpoint.
///
/// Adds the auxiliary probes. The status code follows the primary status
/// only; `additionalStatus` is reported in the body.
///
/// # HTTP Request
///
/// `GET [base]/health/detailed`
pub async fn detailed_health_handler(State(state): State<AppState>) -> Response {
    let detailed = state.aggregator().check_detailed_health().await;
    debug!(
        status = %detailed.report.status,
        additional_status = %detailed.additional_status,
        "Detailed health check completed"
    );

    (status_code(detailed.report.status), Json(detailed)).into_response()
}

/// Handler for the readiness probe.
///
/// Ready unless the readiness probe, usually storage, is unhealthy. A
/// degraded pool still serves requests.
///
/// # HTTP Request
///
/// `GET [base]/health/ready`
pub async fn readiness_handler(State(state): State<AppState>) -> Response {
    let (name, result) = run_isolated(state.readiness()).await;
    let ready = result.status() != HealthStatus::Unhealthy;
    debug!(probe = %name, ready, "Readiness check completed");

    let mut body = serde_json::json!({
        "status": if ready { "ready" } else { "not ready" },
        "timestamp": Utc::now().to_rfc3339(),
        "checks": { name: &result },
    });
    if let Some(error) = result.error().filter(|_| !ready) {
        body["error"] = serde_json::Value::from(error);
    }

    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body)).into_response()
}

/// Handler for the liveness probe.
///
/// Always `200 OK` while the process can answer. `uptime` is in seconds.
///
/// # HTTP Request
///
/// `GET [base]/health/live`
pub async fn liveness_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.aggregator().metrics().uptime().as_secs_f64();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "timestamp": Utc::now().to_rfc3339(),
            "uptime": uptime,
        })),
    )
}
