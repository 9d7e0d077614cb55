use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured error body for requests rejected before the pipeline runs.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Human-readable description of what went wrong
    pub error: String,
    /// Machine-readable error code (e.g. "validation_failed")
    pub code: String,
    /// Which request field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Error codes used across the API
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const RATE_LIMITED: &str = "rate_limited";
}

/// How a call to the generative backend failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    RateLimited,
    UpstreamError,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::UpstreamError => "upstream_error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified backend failure. `status` is the HTTP status when one was received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct GatewayFailure {
    pub kind: FailureKind,
    pub status: Option<u16>,
    pub message: String,
}

impl GatewayFailure {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Timeout,
            status: None,
            message: message.into(),
        }
    }

    /// Build a failure from a raw status/message pair, letting
    /// [`classify_failure`] pick the kind.
    pub fn classified(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify_failure(status, &message),
            status,
            message,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        self.kind == FailureKind::RateLimited
    }
}

/// Failures surfaced by the advisory pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    /// Caller supplied a missing or unusable request (400, never retried).
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },
    #[error("generative backend failed: {0}")]
    Gateway(#[from] GatewayFailure),
    /// Backend answered but nothing usable as an answer could be extracted.
    #[error("backend output had no extractable answer: {0}")]
    Schema(String),
}

impl PipelineError {
    /// Failure class used to pick the fallback message. Schema failures are
    /// reported like any other upstream failure.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            PipelineError::Validation { .. } => None,
            PipelineError::Gateway(failure) => Some(failure.kind),
            PipelineError::Schema(_) => Some(FailureKind::UpstreamError),
        }
    }
}

const RATE_LIMIT_MARKERS: &[&str] = &[
    "429",
    "rate limit",
    "rate-limit",
    "ratelimit",
    "quota",
    "too many requests",
    "resource_exhausted",
];

/// Map a raw backend status and error text onto a [`FailureKind`].
///
/// HTTP 429 always wins; otherwise the message is searched for rate-limit
/// markers. Timeouts are detected at the transport layer and never reach here.
pub fn classify_failure(status: Option<u16>, raw_message: &str) -> FailureKind {
    if status == Some(429) {
        return FailureKind::RateLimited;
    }
    let lowered = raw_message.to_lowercase();
    if RATE_LIMIT_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        FailureKind::RateLimited
    } else {
        FailureKind::UpstreamError
    }
}
