use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(liveness))
        .route("/api/health", get(backend_health))
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    /// "connected" or "disconnected"
    pub status: String,
    pub model: String,
    pub api_version: String,
    pub message: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BackendHealthResponse {
    /// "healthy", "degraded" or "error"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini: Option<BackendStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Process liveness; never touches the generative backend.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Process is up", body = HealthResponse)),
    tag = "system"
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Health check endpoint: probes the generative backend
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Backend reachable", body = BackendHealthResponse),
        (status = 500, description = "Backend unreachable or probe failed", body = BackendHealthResponse)
    ),
    tag = "system"
)]
pub async fn backend_health(State(state): State<AppState>) -> impl IntoResponse {
    let backend = state.backend.clone();
    let model = backend.model().to_string();
    let api_version = backend.api_version().to_string();

    // Run the probe as its own task so a fault inside it is reported, not propagated.
    let probe = tokio::spawn(async move { backend.probe().await }).await;

    match probe {
        Ok(outcome) => {
            let (http_status, status, connection) = if outcome.success {
                (StatusCode::OK, "healthy", "connected")
            } else {
                tracing::warn!(message = %outcome.message, "Backend health probe failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "degraded", "disconnected")
            };
            (
                http_status,
                Json(BackendHealthResponse {
                    status: status.to_string(),
                    gemini: Some(BackendStatus {
                        status: connection.to_string(),
                        model,
                        api_version,
                        message: outcome.message,
                    }),
                    error: None,
                    timestamp: Utc::now(),
                }),
            )
        }
        Err(err) => {
            tracing::error!(error = %err, "Backend health probe aborted");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(BackendHealthResponse {
                    status: "error".to_string(),
                    gemini: None,
                    error: Some(format!("Health check failed: {err}")),
                    timestamp: Utc::now(),
                }),
            )
        }
    }
}
