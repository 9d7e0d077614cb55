use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use careline_core::advisory::AdvisoryResponse;
use careline_core::clinical::QueryRequest;
use careline_core::context::ClinicalContext;
use careline_core::error::{ApiError, PipelineError};
use careline_core::pipeline::finalize;
use careline_core::prompt::{build_prompt, validate_query};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, QueryFailureResponse};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/query", post(submit_query))
}

/// Successful advisory plus the time it was produced.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AdvisoryEnvelope {
    #[serde(flatten)]
    pub advisory: AdvisoryResponse,
    pub timestamp: DateTime<Utc>,
}

/// Answer a health question.
///
/// The request is validated before any backend call. Backend failures still
/// return a complete fallback advisory inside the 500 body.
#[utoipa::path(
    post,
    path = "/api/query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Advisory generated", body = AdvisoryEnvelope),
        (status = 400, description = "Missing or invalid query", body = ApiError),
        (status = 500, description = "Backend failed; fallback advisory included", body = QueryFailureResponse)
    ),
    tag = "advisory"
)]
pub async fn submit_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<AdvisoryEnvelope>, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::Validation {
        message: format!("Request body must be a JSON object: {}", rejection.body_text()),
        field: None,
    })?;

    let query = validate_query(&request.query)?;
    let ctx = ClinicalContext::assemble(&request);
    let prompt = build_prompt(&ctx, &query)?;
    let fingerprint = prompt.fingerprint();

    tracing::debug!(
        prompt_fingerprint = %fingerprint,
        symptoms = ctx.symptoms.len(),
        reports = ctx.medical_reports.len(),
        history = ctx.history.len(),
        has_profile = ctx.profile.is_some(),
        has_metrics = ctx.metrics.is_some(),
        context_empty = ctx.is_empty(),
        "Dispatching advisory prompt"
    );

    let raw = state.backend.generate(&prompt).await.map_err(|failure| {
        tracing::warn!(
            prompt_fingerprint = %fingerprint,
            kind = %failure.kind,
            status = ?failure.status,
            "Generative backend call failed"
        );
        PipelineError::from(failure)
    })?;

    let classification = finalize(&raw, &ctx, &query).inspect_err(|err| {
        tracing::warn!(
            prompt_fingerprint = %fingerprint,
            error = %err,
            "Backend output could not be validated"
        );
    })?;

    tracing::info!(
        prompt_fingerprint = %fingerprint,
        risk_level = %classification.response.risk_level,
        is_emergency = classification.response.is_emergency,
        escalated = classification.escalated,
        matched_rule = classification.matched.unwrap_or(""),
        "Advisory generated"
    );

    Ok(Json(AdvisoryEnvelope {
        advisory: classification.response,
        timestamp: Utc::now(),
    }))
}
