//! Error types for the HTTP layer.
//!
//! Health handlers never fail: an unhealthy system is a normal 503 response
//! carrying the report. [`RestError`] covers everything else the server can
//! run into, from unknown routes to start-up failures.
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFound | 404 |
//! | InvalidConfig | 500 |
//! | Bind / Serve | 500 |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

/// Errors raised by the HTTP layer.
#[derive(Debug)]
pub enum RestError {
    /// No route matches the request (HTTP 404).
    NotFound {
        /// Requested path.
        path: String,
    },

    /// The server configuration is invalid. Raised by
    /// [`ServerConfig::validate`](crate::config::ServerConfig::validate).
    InvalidConfig {
        /// Every problem found.
        errors: Vec<String>,
    },

    /// The listener could not be bound.
    Bind {
        /// Address that was requested.
        address: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    Serve(std::io::Error),
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::NotFound { path } => write!(f, "No route for {}", path),
            RestError::InvalidConfig { errors } => {
                write!(f, "Invalid configuration: {}", errors.join("; "))
            }
            RestError::Bind { address, source } => {
                write!(f, "Failed to bind {}: {}", address, source)
            }
            RestError::Serve(e) => write!(f, "Server error: {}", e),
        }
    }
}

impl std::error::Error for RestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RestError::Bind { source, .. } => Some(source),
            RestError::Serve(e) => Some(e),
            _ => None,
        }
    }
}

impl RestError {
    /// Returns the HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::NotFound { .. } => StatusCode::NOT_FOUND,
            RestError::InvalidConfig { .. } | RestError::Bind { .. } | RestError::Serve(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "statusCode": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Result type for the HTTP layer.
pub type RestResult<T> = Result<T, RestError>;
