use crate::advisory::{AdvisoryResponse, RiskLevel};
use crate::error::FailureKind;

const HIGH_DEMAND_ANSWER: &str = "Our health assistant is experiencing high demand right now. \
Please try again in a few moments. If your symptoms are severe or getting worse, \
contact a healthcare provider or emergency services directly.";

const UNAVAILABLE_ANSWER: &str = "Our health assistant is temporarily unavailable. \
Please try again later. If your symptoms are severe or getting worse, contact a \
healthcare provider or emergency services directly.";

const RECOMMENDATIONS: &[&str] = &[
    "If you think you may be having a medical emergency, call your local emergency number immediately.",
    "Contact your doctor or a nurse advice line for guidance on your symptoms.",
    "Keep a note of your symptoms, when they started, and anything that makes them better or worse.",
];

const FOLLOW_UP_QUESTIONS: &[&str] = &[
    "When did your symptoms start?",
    "How severe are your symptoms on a scale from 1 to 10?",
    "Are your symptoms getting better, worse, or staying the same?",
];

/// Safe canned advisory used when the generative backend cannot answer.
///
/// Preventive advice is deliberately empty: it is only given alongside a
/// real model response.
pub fn fallback_response(kind: FailureKind) -> AdvisoryResponse {
    let answer = match kind {
        FailureKind::RateLimited => HIGH_DEMAND_ANSWER,
        FailureKind::Timeout | FailureKind::UpstreamError => UNAVAILABLE_ANSWER,
    };
    AdvisoryResponse {
        answer: answer.to_string(),
        is_emergency: false,
        risk_level: RiskLevel::Low,
        recommendations: RECOMMENDATIONS.iter().map(|s| s.to_string()).collect(),
        preventive_advice: Vec::new(),
        follow_up_questions: FOLLOW_UP_QUESTIONS.iter().map(|s| s.to_string()).collect(),
    }
}
