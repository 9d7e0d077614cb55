//! Synchronous stages that run after the backend call.

use crate::advisory::AdvisoryResponse;
use crate::context::ClinicalContext;
use crate::error::{FailureKind, PipelineError};
use crate::fallback::fallback_response;
use crate::risk::{Classification, classify};
use crate::validate::validate_output;

/// Validate raw backend output and apply risk escalation.
pub fn finalize(
    raw: &str,
    ctx: &ClinicalContext,
    query: &str,
) -> Result<Classification, PipelineError> {
    let response = validate_output(raw)?;
    Ok(classify(response, query, &ctx.symptoms))
}

/// The advisory to deliver for a failed pipeline run.
pub fn degrade(error: &PipelineError) -> AdvisoryResponse {
    fallback_response(error.failure_kind().unwrap_or(FailureKind::UpstreamError))
}
