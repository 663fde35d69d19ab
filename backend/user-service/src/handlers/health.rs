use actix_web::{http::StatusCode, HttpResponse};
use serde_json::json;

use crate::response;

/// GET /health
pub async fn health_check() -> HttpResponse {
    response::success(json!({ "status": "ok" }))
}

/// GET /metrics (Prometheus text format)
pub async fn metrics() -> HttpResponse {
    match actix_middleware::metrics::render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            response::failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics")
        }
    }
}

/// Fallback for unknown routes
pub async fn not_found() -> HttpResponse {
    response::failure(StatusCode::NOT_FOUND, "Not found")
}
