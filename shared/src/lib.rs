use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Category of organism in an uploaded photo. Decides which provider is called.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SubjectType {
    #[default]
    Plant,
    Crop,
    Insect,
    Mushroom,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFinding {
    pub name: String,
    /// Whole percentage, 0 to 100.
    pub probability: u8,
    pub description: String,
    pub treatment_text: String,
    pub source: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdentifiedSubject {
    pub name: String,
    pub probability: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub subject_type: SubjectType,
    pub is_healthy: bool,
    /// Fraction in 0.0..=1.0.
    pub confidence: f32,
    /// Ordered by descending probability.
    pub findings: Vec<ProviderFinding>,
    pub identified_subject: Option<IdentifiedSubject>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}
