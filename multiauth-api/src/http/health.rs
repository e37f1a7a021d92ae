//! Health check and metrics endpoints

use axum::{
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};

use super::{AppError, AppResult, AppState};

/// Health check router
pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
}

/// Basic health check (always returns OK if server is running)
pub async fn health_check() -> impl IntoResponse {
    "OK"
}

/// Prometheus scrape endpoint
pub async fn metrics() -> AppResult<impl IntoResponse> {
    let body = multiauth_core::metrics::gather_metrics()
        .map_err(|e| AppError::internal_server_error(format!("Failed to gather metrics: {e}")))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
