use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::coerce::{lenient, lenient_bool, lenient_string_list};

/// Inbound body of `POST /api/query`.
///
/// Every field is kept as raw JSON so that a wrong shape in one optional
/// input never rejects the whole request. [`crate::context::ClinicalContext::assemble`]
/// turns this into typed values.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Free-text question from the user (required, non-empty)
    #[serde(default)]
    #[schema(value_type = String)]
    pub query: serde_json::Value,
    #[serde(default)]
    #[schema(value_type = Option<HealthProfile>)]
    pub profile: serde_json::Value,
    #[serde(default)]
    #[schema(value_type = Option<HealthMetrics>)]
    pub metrics: serde_json::Value,
    #[serde(default)]
    #[schema(value_type = Option<Vec<Symptom>>)]
    pub symptoms: serde_json::Value,
    #[serde(default)]
    #[schema(value_type = Option<Vec<MedicalReport>>)]
    pub medical_reports: serde_json::Value,
    /// Prior turns, oldest first
    #[serde(default)]
    #[schema(value_type = Option<Vec<Message>>)]
    pub message_history: serde_json::Value,
}

/// Static attributes of the person asking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthProfile {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(
        default,
        alias = "gender",
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub sex: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(
        default,
        alias = "medicalConditions",
        deserialize_with = "lenient_string_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub conditions: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string_list", skip_serializing_if = "Vec::is_empty")]
    pub allergies: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string_list", skip_serializing_if = "Vec::is_empty")]
    pub medications: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BloodPressure {
    pub systolic: f64,
    pub diastolic: f64,
}

/// Most recent vital readings. A missing `timestamp` means unknown recency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetrics {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub blood_pressure: Option<BloodPressure>,
    /// Blood glucose, mg/dL
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub glucose: Option<f64>,
    /// Beats per minute
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Body temperature, °C
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub oxygen_saturation: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl HealthMetrics {
    pub fn is_empty(&self) -> bool {
        self.blood_pressure.is_none()
            && self.glucose.is_none()
            && self.heart_rate.is_none()
            && self.weight.is_none()
            && self.temperature.is_none()
            && self.oxygen_saturation.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Symptom {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub symptom_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub severity: Option<Severity>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, deserialize_with = "string_set", skip_serializing_if = "BTreeSet::is_empty")]
    pub accompanied_by: BTreeSet<String>,
}

impl Symptom {
    /// A symptom with neither a type nor a description carries no signal.
    pub fn is_blank(&self) -> bool {
        self.symptom_type.as_deref().is_none_or(|s| s.trim().is_empty())
            && self.description.as_deref().is_none_or(|s| s.trim().is_empty())
    }
}

fn string_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_string_list(deserializer).map(|items| items.into_iter().collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MedicalReport {
    #[serde(rename = "type", default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub report_type: Option<String>,
    /// `YYYY-MM-DD` or RFC 3339
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub doctor: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub facility: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub findings: Option<String>,
    #[serde(default, deserialize_with = "lenient_string_list", skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub follow_up: bool,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub follow_up_date: Option<String>,
}

impl MedicalReport {
    /// Parsed report date, used to order reports newest first.
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        let raw = self.date.as_deref()?.trim();
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One prior conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}
