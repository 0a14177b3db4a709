use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;

use crate::startup::AppState;

/// Liveness probe. Does not touch the provider.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "ai-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness probe: the provider must answer its health check.
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.text_provider.health_check().await.map_err(|e| {
        tracing::warn!(error = %e, "Provider health check failed");
        AppError::ServiceUnavailable
    })?;
    Ok(StatusCode::OK)
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        service_core::observability::get_metrics(),
    )
}
