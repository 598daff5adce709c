//! Health check endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, AppState};

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Current status of the service
    pub status: String,
    /// Version of the service
    pub version: String,
}

impl HealthResponse {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::new("healthy"))
}

/// Readiness check endpoint (checks store connectivity)
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 500, description = "Store unreachable", body = crate::error::ErrorResponse)
    )
)]
pub async fn readiness_check(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    state.services.ping().await?;
    Ok(Json(HealthResponse::new("ready")))
}
