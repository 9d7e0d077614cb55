use std::cmp::Reverse;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::clinical::{
    HealthMetrics, HealthProfile, MedicalReport, Message, QueryRequest, Symptom,
};
use crate::coerce::clip;

pub const MAX_SYMPTOMS: usize = 5;
pub const MAX_REPORTS: usize = 3;
pub const MAX_HISTORY_TURNS: usize = 6;
pub const MAX_PROFILE_ITEMS: usize = 10;
pub const MAX_TEXT_CHARS: usize = 500;

/// Bounded, normalized clinical background for one query.
///
/// Built once per request by [`ClinicalContext::assemble`] and read by every
/// later stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClinicalContext {
    pub profile: Option<HealthProfile>,
    pub metrics: Option<HealthMetrics>,
    /// Most severe first; caller's recency order kept among equal severity
    pub symptoms: Vec<Symptom>,
    /// Newest first
    pub medical_reports: Vec<MedicalReport>,
    /// Oldest first
    pub history: Vec<Message>,
}

impl ClinicalContext {
    /// Normalize the optional request inputs. Never fails: absent or
    /// malformed inputs become empty.
    pub fn assemble(request: &QueryRequest) -> Self {
        Self {
            profile: decode::<HealthProfile>(&request.profile).map(bound_profile),
            metrics: decode::<HealthMetrics>(&request.metrics).filter(|m| !m.is_empty()),
            symptoms: bound_symptoms(decode_list(&request.symptoms)),
            medical_reports: bound_reports(decode_list(&request.medical_reports)),
            history: bound_history(decode_list(&request.message_history)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.profile.is_none()
            && self.metrics.is_none()
            && self.symptoms.is_empty()
            && self.medical_reports.is_empty()
            && self.history.is_empty()
    }

    pub fn has_background(&self) -> bool {
        self.profile.is_some()
            || self.metrics.is_some()
            || !self.symptoms.is_empty()
            || !self.medical_reports.is_empty()
    }
}

fn decode<T: DeserializeOwned>(value: &Value) -> Option<T> {
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

/// Decode each array element independently, dropping the ones that fail.
fn decode_list<T: DeserializeOwned>(value: &Value) -> Vec<T> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}

fn clip_opt(text: Option<String>) -> Option<String> {
    text.map(|t| clip(t.trim(), MAX_TEXT_CHARS))
        .filter(|t| !t.is_empty())
}

fn clip_list(items: Vec<String>, max_items: usize) -> Vec<String> {
    items
        .into_iter()
        .take(max_items)
        .map(|item| clip(&item, MAX_TEXT_CHARS))
        .collect()
}

fn bound_profile(profile: HealthProfile) -> HealthProfile {
    HealthProfile {
        sex: clip_opt(profile.sex),
        blood_type: clip_opt(profile.blood_type),
        conditions: clip_list(profile.conditions, MAX_PROFILE_ITEMS),
        allergies: clip_list(profile.allergies, MAX_PROFILE_ITEMS),
        medications: clip_list(profile.medications, MAX_PROFILE_ITEMS),
        ..profile
    }
}

fn bound_symptoms(symptoms: Vec<Symptom>) -> Vec<Symptom> {
    let mut symptoms: Vec<Symptom> = symptoms
        .into_iter()
        .filter(|s| !s.is_blank())
        .map(|s| Symptom {
            symptom_type: clip_opt(s.symptom_type),
            description: clip_opt(s.description),
            duration: clip_opt(s.duration),
            ..s
        })
        .collect();
    // Stable sort: unknown severity ranks below mild.
    symptoms.sort_by_key(|s| Reverse(s.severity));
    symptoms.truncate(MAX_SYMPTOMS);
    symptoms
}

fn bound_reports(reports: Vec<MedicalReport>) -> Vec<MedicalReport> {
    let mut reports: Vec<MedicalReport> = reports
        .into_iter()
        .map(|r| MedicalReport {
            findings: clip_opt(r.findings),
            recommendations: clip_list(r.recommendations, MAX_PROFILE_ITEMS),
            ..r
        })
        .collect();
    // Undated reports sort after dated ones.
    reports.sort_by_key(|r| Reverse(r.parsed_date()));
    reports.truncate(MAX_REPORTS);
    reports
}

fn bound_history(history: Vec<Message>) -> Vec<Message> {
    let skip = history.len().saturating_sub(MAX_HISTORY_TURNS);
    history
        .into_iter()
        .skip(skip)
        .filter(|m| !m.content.trim().is_empty())
        .map(|m| Message {
            content: clip(m.content.trim(), MAX_TEXT_CHARS),
            ..m
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clinical::{Role, Severity};
    use serde_json::json;

    fn request(body: Value) -> QueryRequest {
        serde_json::from_value(body).expect("request should decode")
    }

    #[test]
    fn absent_inputs_produce_empty_context() {
        let ctx = ClinicalContext::assemble(&request(json!({"query": "hi"})));
        assert!(ctx.is_empty());
    }

    #[test]
    fn wrong_shapes_are_treated_as_empty() {
        let ctx = ClinicalContext::assemble(&request(json!({
            "query": "hi",
            "profile": "not an object",
            "metrics": [1, 2, 3],
            "symptoms": {"type": "cough"},
            "medicalReports": 7,
            "messageHistory": "earlier chat"
        })));
        assert!(ctx.is_empty());
    }

    #[test]
    fn symptoms_keep_most_severe_and_preserve_recency_among_equals() {
        let ctx = ClinicalContext::assemble(&request(json!({
            "query": "hi",
            "symptoms": [
                {"type": "a", "severity": "mild"},
                {"type": "b", "severity": "severe"},
                {"type": "c", "severity": "moderate"},
                {"type": "d", "severity": "severe"},
                {"type": "e"},
                {"type": "f", "severity": "mild"},
                {"type": "g", "severity": "moderate"},
                "garbage",
                {}
            ]
        })));

        let kinds: Vec<_> = ctx
            .symptoms
            .iter()
            .map(|s| s.symptom_type.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(kinds, vec!["b", "d", "c", "g", "a"]);
        assert_eq!(ctx.symptoms[0].severity, Some(Severity::Severe));
    }

    #[test]
    fn reports_keep_three_newest_with_undated_last() {
        let ctx = ClinicalContext::assemble(&request(json!({
            "query": "hi",
            "medicalReports": [
                {"type": "undated"},
                {"type": "old", "date": "2021-01-01"},
                {"type": "newest", "date": "2024-06-01"},
                {"type": "middle", "date": "2023-02-10T08:00:00Z"}
            ]
        })));

        let kinds: Vec<_> = ctx
            .medical_reports
            .iter()
            .map(|r| r.report_type.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(kinds, vec!["newest", "middle", "old"]);
    }

    #[test]
    fn history_keeps_last_turns_in_order() {
        let turns: Vec<Value> = (0..10)
            .map(|i| {
                json!({
                    "role": if i % 2 == 0 { "user" } else { "assistant" },
                    "content": format!("turn {i}")
                })
            })
            .collect();
        let ctx = ClinicalContext::assemble(&request(json!({
            "query": "hi",
            "messageHistory": turns
        })));

        assert_eq!(ctx.history.len(), MAX_HISTORY_TURNS);
        assert_eq!(ctx.history[0].content, "turn 4");
        assert_eq!(ctx.history[5].content, "turn 9");
        assert_eq!(ctx.history[5].role, Role::Assistant);
    }

    #[test]
    fn long_text_is_clipped() {
        let long = "x".repeat(MAX_TEXT_CHARS + 50);
        let ctx = ClinicalContext::assemble(&request(json!({
            "query": "hi",
            "symptoms": [{"type": "rash", "description": long}]
        })));
        let description = ctx.symptoms[0]
            .description
            .as_deref()
            .expect("description kept");
        assert_eq!(description.chars().count(), MAX_TEXT_CHARS + 1);
    }

    #[test]
    fn metrics_without_readings_are_dropped() {
        let ctx = ClinicalContext::assemble(&request(json!({
            "query": "hi",
            "metrics": {"timestamp": "2024-05-01T07:30:00Z"}
        })));
        assert!(ctx.metrics.is_none());

        let ctx = ClinicalContext::assemble(&request(json!({
            "query": "hi",
            "metrics": {"heartRate": 72, "bloodPressure": {"systolic": 120, "diastolic": 80}}
        })));
        let metrics = ctx.metrics.expect("metrics kept");
        assert_eq!(metrics.heart_rate, Some(72.0));
        assert!(metrics.timestamp.is_none());
    }
}
