use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;

use super::{api_error, ApiError};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub description: String,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /
pub async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: state.settings.app_name.clone(),
        description: state.settings.app_description.clone(),
        version: state.settings.app_version,
    })
}

/// GET /health
///
/// 503 when the database does not answer.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.db.ping().await.map_err(|e| {
        warn!(error = %e, "Database ping failed");
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Database unavailable",
            "DATABASE_UNAVAILABLE",
        )
    })?;

    Ok(Json(HealthResponse { status: "ok" }))
}
