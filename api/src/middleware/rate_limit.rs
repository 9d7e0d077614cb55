use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use careline_core::error::FailureKind;
use careline_core::fallback::fallback_response;
use chrono::Utc;
use tower_governor::{
    GovernorError, GovernorLayer, governor::GovernorConfigBuilder,
    key_extractor::SmartIpKeyExtractor,
};

use crate::error::{PIPELINE_ERROR, QueryFailureResponse, RATE_LIMIT_ERROR};
use crate::routes::health::BackendHealthResponse;

type RateLimitLayer =
    GovernorLayer<SmartIpKeyExtractor, governor::middleware::NoOpMiddleware, axum::body::Body>;

/// Rate limit for POST /api/query: 20 requests per minute per IP.
/// Rejected callers still receive the rate-limited fallback advisory.
pub fn query_layer() -> RateLimitLayer {
    GovernorLayer::new(
        GovernorConfigBuilder::default()
            .per_second(3) // one token every 3s = 20 per minute
            .burst_size(10)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("invalid governor config for query"),
    )
    .error_handler(query_rejection)
}

/// Rate limit for GET /api/health: 10 requests per minute per IP.
/// Each probe is a real backend call, so this stays tight.
pub fn health_probe_layer() -> RateLimitLayer {
    GovernorLayer::new(
        GovernorConfigBuilder::default()
            .per_second(6)
            .burst_size(5)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("invalid governor config for health probe"),
    )
    .error_handler(health_rejection)
}

/// Diagnostic text and Retry-After value; the flag is set when the client was throttled.
fn describe(err: GovernorError) -> (String, Option<u64>, bool) {
    match err {
        GovernorError::TooManyRequests { wait_time, .. } => (
            format!("client rate limit exceeded; retry after {wait_time} seconds"),
            Some(wait_time),
            true,
        ),
        GovernorError::UnableToExtractKey => (
            "unable to determine client identity for rate limiting".to_string(),
            None,
            false,
        ),
        GovernorError::Other { msg, .. } => (
            msg.unwrap_or_else(|| "rate limiter rejected the request".to_string()),
            None,
            false,
        ),
    }
}

fn with_retry_after(mut response: Response, retry_after: Option<u64>) -> Response {
    if let Some(wait_time) = retry_after {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(wait_time));
    }
    response
}

/// Rejected queries keep the endpoint's failure contract: 500 with a fallback advisory.
fn query_rejection(err: GovernorError) -> Response {
    let (details, retry_after, is_rate_limit) = describe(err);
    tracing::warn!(%details, "Query rejected by rate limiter; serving fallback");

    let kind = if is_rate_limit {
        FailureKind::RateLimited
    } else {
        FailureKind::UpstreamError
    };
    let body = QueryFailureResponse {
        error: if is_rate_limit {
            RATE_LIMIT_ERROR.to_string()
        } else {
            PIPELINE_ERROR.to_string()
        },
        details,
        is_rate_limit,
        fallback_response: fallback_response(kind),
        timestamp: Utc::now(),
    };
    with_retry_after(
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response(),
        retry_after,
    )
}

fn health_rejection(err: GovernorError) -> Response {
    let (details, retry_after, _) = describe(err);
    tracing::warn!(%details, "Health check rejected by rate limiter");

    let body = BackendHealthResponse {
        status: "error".to_string(),
        gemini: None,
        error: Some(format!("Health check failed: {details}")),
        timestamp: Utc::now(),
    };
    with_retry_after(
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response(),
        retry_after,
    )
}
