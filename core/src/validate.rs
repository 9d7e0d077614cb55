use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::advisory::{AdvisoryResponse, RiskLevel};
use crate::coerce::{boolean, non_empty_text, string_list};
use crate::error::PipelineError;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("code fence pattern is valid")
});

const ANSWER_KEYS: &[&str] = &["answer", "response", "message"];

/// Backend output decoded once at the validator boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutput {
    /// A JSON object was found (shape not yet checked). `prose` is the text
    /// around it when the object was embedded in a longer reply.
    WellFormed {
        object: Map<String, Value>,
        prose: Option<String>,
    },
    /// Non-empty text with no usable JSON object.
    PlainText(String),
    Empty,
}

impl ParsedOutput {
    pub fn decode(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return ParsedOutput::Empty;
        }
        match locate_object(trimmed) {
            Some((object, prose)) => ParsedOutput::WellFormed { object, prose },
            None => ParsedOutput::PlainText(trimmed.to_string()),
        }
    }
}

fn as_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Text left over once `start..end` is cut out, or `None` if only whitespace remains.
fn surrounding(text: &str, start: usize, end: usize) -> Option<String> {
    let parts: Vec<&str> = [text[..start].trim(), text[end..].trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Find a JSON object in the output: the whole text, a fenced block, or the
/// outermost `{...}` span of prose-wrapped output.
fn locate_object(text: &str) -> Option<(Map<String, Value>, Option<String>)> {
    if let Some(object) = as_object(text) {
        return Some((object, None));
    }
    for caps in CODE_FENCE.captures_iter(text) {
        let (Some(fence), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if let Some(object) = as_object(body.as_str()) {
            return Some((object, surrounding(text, fence.start(), fence.end())));
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let object = as_object(&text[start..=end])?;
    Some((object, surrounding(text, start, end + 1)))
}

/// Coerce raw backend output into an [`AdvisoryResponse`].
///
/// Prose becomes a plain-text answer with safe defaults. Only output with no
/// extractable answer text at all is a [`PipelineError::Schema`].
pub fn validate_output(raw: &str) -> Result<AdvisoryResponse, PipelineError> {
    match ParsedOutput::decode(raw) {
        ParsedOutput::Empty => Err(PipelineError::Schema(
            "backend returned empty output".to_string(),
        )),
        ParsedOutput::PlainText(text) => Ok(AdvisoryResponse::plain(text)),
        ParsedOutput::WellFormed { object, prose } => coerce_object(&object, prose),
    }
}

fn coerce_object(
    object: &Map<String, Value>,
    prose: Option<String>,
) -> Result<AdvisoryResponse, PipelineError> {
    let answer = ANSWER_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(answer_text)
        .or(prose)
        .ok_or_else(|| {
            PipelineError::Schema("structured output has no answer field".to_string())
        })?;

    let list = |key: &str| object.get(key).map(string_list).unwrap_or_default();

    let mut response = AdvisoryResponse {
        answer,
        is_emergency: object
            .get("isEmergency")
            .and_then(boolean)
            .unwrap_or(false),
        risk_level: risk_level(object.get("riskLevel")),
        recommendations: list("recommendations"),
        preventive_advice: list("preventiveAdvice"),
        follow_up_questions: list("followUpQuestions"),
    };
    response.enforce_consistency();
    Ok(response)
}

/// Absent levels default to low. A level that is present but unrecognised
/// (`"critical"`, `"urgent"`, a number) is read as high rather than dropped.
fn risk_level(value: Option<&Value>) -> RiskLevel {
    match value {
        None | Some(Value::Null) => RiskLevel::default(),
        Some(Value::String(text)) if text.trim().is_empty() => RiskLevel::default(),
        Some(Value::String(text)) => RiskLevel::parse(text).unwrap_or_else(|| {
            tracing::warn!(risk_level = %text, "Unrecognised risk level from backend; treating as high");
            RiskLevel::High
        }),
        Some(other) => {
            tracing::warn!(risk_level = %other, "Non-text risk level from backend; treating as high");
            RiskLevel::High
        }
    }
}

/// A string answer as-is, or a list of strings joined into paragraphs.
fn answer_text(value: &Value) -> Option<String> {
    match value {
        Value::Array(_) => {
            let parts = string_list(value);
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("\n\n"))
            }
        }
        other => non_empty_text(other),
    }
}
