use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Urgency of an advisory, ordered from least to most urgent.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Moderate,
    High,
    Emergency,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Moderate,
        RiskLevel::High,
        RiskLevel::Emergency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Emergency => "emergency",
        }
    }

    /// Case-insensitive parse; `medium` is accepted for `moderate`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "moderate" | "medium" => Some(RiskLevel::Moderate),
            "high" => Some(RiskLevel::High),
            "emergency" => Some(RiskLevel::Emergency),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The advisory returned to the caller.
///
/// Invariant: `is_emergency` and `risk_level == Emergency` always agree once
/// the response leaves the pipeline. Use [`AdvisoryResponse::enforce_consistency`]
/// after any mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryResponse {
    pub answer: String,
    pub is_emergency: bool,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
    pub preventive_advice: Vec<String>,
    pub follow_up_questions: Vec<String>,
}

impl AdvisoryResponse {
    /// A plain-text answer with every other field at its safe default.
    pub fn plain(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            is_emergency: false,
            risk_level: RiskLevel::Low,
            recommendations: Vec::new(),
            preventive_advice: Vec::new(),
            follow_up_questions: Vec::new(),
        }
    }

    /// Reconcile the emergency flag and risk level. Only ever raises urgency.
    pub fn enforce_consistency(&mut self) {
        if self.is_emergency {
            self.risk_level = RiskLevel::Emergency;
        } else if self.risk_level == RiskLevel::Emergency {
            self.is_emergency = true;
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.is_emergency == (self.risk_level == RiskLevel::Emergency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_aliases_and_case() {
        assert_eq!(RiskLevel::parse(" HIGH "), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse("medium"), Some(RiskLevel::Moderate));
        assert_eq!(RiskLevel::parse("critical"), None);
    }

    #[test]
    fn emergency_flag_forces_emergency_level() {
        let mut response = AdvisoryResponse::plain("Call emergency services.");
        response.is_emergency = true;
        response.risk_level = RiskLevel::Moderate;
        response.enforce_consistency();
        assert_eq!(response.risk_level, RiskLevel::Emergency);
        assert!(response.is_consistent());
    }

    #[test]
    fn emergency_level_sets_flag() {
        let mut response = AdvisoryResponse::plain("Seek care now.");
        response.risk_level = RiskLevel::Emergency;
        response.enforce_consistency();
        assert!(response.is_emergency);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let value = serde_json::to_value(AdvisoryResponse::plain("ok")).expect("serialize");
        assert_eq!(value["isEmergency"], false);
        assert_eq!(value["riskLevel"], "low");
        assert!(value["followUpQuestions"].is_array());
        assert!(value["preventiveAdvice"].is_array());
    }
}
