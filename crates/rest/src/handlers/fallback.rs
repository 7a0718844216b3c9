//! Fallback handler for unmatched routes.

use axum::http::Uri;

use crate::error::RestError;

/// Responds 404 with a JSON error body.
pub async fn not_found_handler(uri: Uri) -> RestError {
    RestError::NotFound {
        path: uri.path().to_string(),
    }
}
