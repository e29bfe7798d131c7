use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "street-insight-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe: the service is ready once the LLM provider is reachable.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.narrator.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
