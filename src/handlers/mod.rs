pub mod admin;
pub mod payments;
pub mod webhook;

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub store: String,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (status_code, status, store) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "healthy", "connected"),
        Err(e) => {
            tracing::warn!(error = %e, "health check: store unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "disconnected")
        }
    };

    let health_response = HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store.to_string(),
    };

    (status_code, Json(health_response))
}
