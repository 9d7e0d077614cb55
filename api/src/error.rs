use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use careline_core::advisory::AdvisoryResponse;
use careline_core::error::{ApiError, PipelineError, codes};
use careline_core::pipeline::degrade;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub(crate) const RATE_LIMIT_ERROR: &str =
    "The health assistant is receiving too many requests. Please try again shortly.";
pub(crate) const PIPELINE_ERROR: &str = "Failed to process health query";

/// Body of a 500 from the query endpoint. Still carries a usable advisory.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryFailureResponse {
    /// User-facing summary of the failure
    pub error: String,
    /// Diagnostic detail of the classified backend failure
    pub details: String,
    pub is_rate_limit: bool,
    pub fallback_response: AdvisoryResponse,
    pub timestamp: DateTime<Utc>,
}

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
    },
    /// Backend or schema failure (500) with the advisory to show instead
    Advisory {
        error: PipelineError,
        fallback: AdvisoryResponse,
    },
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation { message, field } => AppError::Validation { message, field },
            other => AppError::Advisory {
                fallback: degrade(&other),
                error: other,
            },
        }
    }
}

fn request_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation { message, field } => (
                StatusCode::BAD_REQUEST,
                Json(ApiError {
                    error: message,
                    code: codes::VALIDATION_FAILED.to_string(),
                    field,
                    request_id: request_id(),
                    timestamp: Utc::now(),
                }),
            )
                .into_response(),
            AppError::Advisory { error, fallback } => {
                let is_rate_limit =
                    matches!(&error, PipelineError::Gateway(failure) if failure.is_rate_limit());
                tracing::error!(
                    failure = %error,
                    is_rate_limit,
                    "Advisory pipeline failed; serving fallback"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(QueryFailureResponse {
                        error: if is_rate_limit {
                            RATE_LIMIT_ERROR.to_string()
                        } else {
                            PIPELINE_ERROR.to_string()
                        },
                        details: error.to_string(),
                        is_rate_limit,
                        fallback_response: fallback,
                        timestamp: Utc::now(),
                    }),
                )
                    .into_response()
            }
        }
    }
}
