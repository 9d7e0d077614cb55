use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::clinical::{HealthMetrics, HealthProfile, MedicalReport, Symptom};
use crate::context::ClinicalContext;
use crate::error::PipelineError;

pub const MAX_QUERY_CHARS: usize = 4000;

const SYSTEM_INSTRUCTION: &str = "\
You are a careful health information assistant. You give general, evidence-based \
health guidance; you do not diagnose and you do not replace a clinician. Use the \
clinical context below only to ground your answer. If anything suggests a medical \
emergency, say so plainly and tell the user to contact emergency services.

Respond with a single JSON object and nothing else: no markdown, no code fences, \
no text before or after it. The object must have exactly these fields:
- \"answer\": string, non-empty, the reply to the user's question
- \"isEmergency\": boolean, true only if the user should seek emergency care now
- \"riskLevel\": one of \"low\", \"moderate\", \"high\", \"emergency\" \
(must be \"emergency\" whenever isEmergency is true)
- \"recommendations\": array of strings, concrete next steps
- \"preventiveAdvice\": array of strings, guidance to prevent recurrence or worsening
- \"followUpQuestions\": array of strings, questions that would clarify the situation";

const NO_CONTEXT: &str = "No clinical context was provided.";

/// The request text sent to the generative backend.
///
/// Built only through [`build_prompt`]; identical inputs always give
/// byte-identical text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    text: String,
}

impl PromptPayload {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// SHA-256 hex digest of the payload, for log correlation and caching.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.text.as_bytes()))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextView<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<&'a HealthProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<MetricsView<'a>>,
    #[serde(skip_serializing_if = "is_empty_slice")]
    symptoms: &'a [Symptom],
    #[serde(skip_serializing_if = "is_empty_slice")]
    medical_reports: &'a [MedicalReport],
}

#[derive(Serialize)]
struct MetricsView<'a> {
    #[serde(flatten)]
    readings: &'a HealthMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    recency: Option<&'static str>,
}

fn is_empty_slice<T>(items: &&[T]) -> bool {
    items.is_empty()
}

impl<'a> ContextView<'a> {
    fn new(ctx: &'a ClinicalContext) -> Self {
        Self {
            profile: ctx.profile.as_ref(),
            metrics: ctx.metrics.as_ref().map(|readings| MetricsView {
                readings,
                recency: readings.timestamp.is_none().then_some("unknown"),
            }),
            symptoms: &ctx.symptoms,
            medical_reports: &ctx.medical_reports,
        }
    }
}

/// Validate the raw `query` field, returning the trimmed text.
pub fn validate_query(raw: &Value) -> Result<String, PipelineError> {
    let invalid = |message: &str| PipelineError::Validation {
        message: message.to_string(),
        field: Some("query".to_string()),
    };

    let text = match raw {
        Value::Null => return Err(invalid("Query is required")),
        Value::String(s) => s.trim(),
        _ => return Err(invalid("Query must be a string")),
    };
    if text.is_empty() {
        return Err(invalid("Query is required"));
    }
    if text.chars().count() > MAX_QUERY_CHARS {
        return Err(invalid("Query is too long"));
    }
    Ok(text.to_string())
}

/// Render the backend request: instruction, serialized context, recent
/// conversation, then the question.
pub fn build_prompt(ctx: &ClinicalContext, query: &str) -> Result<PromptPayload, PipelineError> {
    let query = validate_query(&Value::String(query.to_string()))?;

    let mut text = String::with_capacity(2048);
    text.push_str(SYSTEM_INSTRUCTION);

    text.push_str("\n\n## Clinical context\n");
    if ctx.has_background() {
        let rendered = serde_json::to_string_pretty(&ContextView::new(ctx))
            .unwrap_or_else(|_| NO_CONTEXT.to_string());
        text.push_str(&rendered);
    } else {
        text.push_str(NO_CONTEXT);
    }

    if !ctx.history.is_empty() {
        text.push_str("\n\n## Recent conversation (oldest first)\n");
        for turn in &ctx.history {
            let _ = writeln!(text, "{}: {}", turn.role.as_str(), turn.content);
        }
        // Drop the trailing newline so both branches end the same way.
        text.pop();
    }

    text.push_str("\n\n## Current question\n");
    text.push_str(&query);

    Ok(PromptPayload { text })
}
