use crate::advisory::{AdvisoryResponse, RiskLevel};
use crate::clinical::{Severity, Symptom};

/// A phrase that, when present, sets a floor under the risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationRule {
    pub phrase: &'static str,
    pub floor: RiskLevel,
}

/// Emergency phrases matched (case-insensitively) in the query and in
/// reported symptom text.
pub const EMERGENCY_RULES: &[EscalationRule] = &[
    EscalationRule { phrase: "chest pain", floor: RiskLevel::Emergency },
    EscalationRule { phrase: "difficulty breathing", floor: RiskLevel::Emergency },
    EscalationRule { phrase: "can't breathe", floor: RiskLevel::Emergency },
    EscalationRule { phrase: "cannot breathe", floor: RiskLevel::Emergency },
    EscalationRule { phrase: "loss of consciousness", floor: RiskLevel::Emergency },
    EscalationRule { phrase: "stroke", floor: RiskLevel::Emergency },
];

/// Floor applied when any reported symptom is marked severe.
pub const SEVERE_SYMPTOM_FLOOR: RiskLevel = RiskLevel::High;

/// Outcome of [`classify`]: the adjusted response and whether it was raised.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub response: AdvisoryResponse,
    pub escalated: bool,
    /// Phrase that triggered the highest floor, if any.
    pub matched: Option<&'static str>,
}

fn normalize(text: &str) -> String {
    text.to_lowercase().replace(['\u{2018}', '\u{2019}'], "'")
}

fn phrase_floor(text: &str) -> Option<&'static EscalationRule> {
    let text = normalize(text);
    EMERGENCY_RULES
        .iter()
        .filter(|rule| text.contains(rule.phrase))
        .max_by_key(|rule| rule.floor)
}

/// Minimum risk level implied by the query and the reported symptoms.
pub fn implied_floor(query: &str, symptoms: &[Symptom]) -> (RiskLevel, Option<&'static str>) {
    let mut floor = RiskLevel::Low;
    let mut matched = None;

    let symptom_texts = symptoms.iter().flat_map(|s| {
        s.symptom_type
            .as_deref()
            .into_iter()
            .chain(s.description.as_deref())
    });
    for text in std::iter::once(query).chain(symptom_texts) {
        if let Some(rule) = phrase_floor(text) {
            if rule.floor > floor {
                floor = rule.floor;
                matched = Some(rule.phrase);
            }
        }
    }

    if symptoms.iter().any(|s| s.severity == Some(Severity::Severe)) {
        floor = floor.max(SEVERE_SYMPTOM_FLOOR);
    }
    (floor, matched)
}

/// Raise the response's urgency to what the inputs imply. Never lowers it.
pub fn classify(mut response: AdvisoryResponse, query: &str, symptoms: &[Symptom]) -> Classification {
    response.enforce_consistency();
    let before = response.risk_level;
    let (floor, matched) = implied_floor(query, symptoms);

    if floor > response.risk_level {
        response.risk_level = floor;
    }
    response.enforce_consistency();

    Classification {
        escalated: response.risk_level > before,
        matched: matched.filter(|_| floor > before),
        response,
    }
}
