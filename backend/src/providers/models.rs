use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProviderContract;

/// Outbound JSON body. Untagged: each variant serializes as a plain object.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ProviderRequest {
    HealthAssessment {
        images: Vec<String>,
        similar_images: bool,
        health: &'static str,
    },
    LegacyHealthAssessment {
        images: Vec<String>,
        modifiers: Vec<&'static str>,
        disease_details: Vec<&'static str>,
        language: &'static str,
    },
    Identification {
        images: Vec<String>,
        similar_images: bool,
    },
}

impl ProviderRequest {
    pub fn for_contract(contract: ProviderContract, base64_image: String) -> Self {
        let images = vec![base64_image];
        match contract {
            ProviderContract::HealthAssessment => ProviderRequest::HealthAssessment {
                images,
                similar_images: true,
                health: "only",
            },
            ProviderContract::LegacyHealthAssessment => ProviderRequest::LegacyHealthAssessment {
                images,
                modifiers: vec!["crops_fast", "similar_images"],
                disease_details: vec!["description", "treatment"],
                language: "en",
            },
            ProviderContract::Identification => ProviderRequest::Identification {
                images,
                similar_images: true,
            },
        }
    }
}

/// Extra detail fields requested through the query string, if the contract takes them.
pub fn details_query(contract: ProviderContract) -> Option<&'static str> {
    match contract {
        ProviderContract::HealthAssessment => Some("description,treatment"),
        ProviderContract::LegacyHealthAssessment => None,
        ProviderContract::Identification => Some("common_names,description"),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthSignal {
    pub binary: Option<bool>,
    pub probability: Option<f64>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestionDetails {
    /// Plain string on health endpoints, `{ "value": ... }` on identification endpoints.
    pub description: Option<Value>,
    pub treatment: Option<Value>,
    pub common_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Suggestion {
    pub name: Option<String>,
    pub probability: Option<f64>,
    pub redundant: Option<bool>,
    pub details: Option<SuggestionDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestionGroup {
    pub suggestions: Option<Vec<Suggestion>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthResult {
    pub is_healthy: Option<HealthSignal>,
    pub disease: Option<SuggestionGroup>,
    pub crop: Option<SuggestionGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthAssessmentResponse {
    pub result: Option<HealthResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyDisease {
    pub name: Option<String>,
    pub probability: Option<f64>,
    pub redundant: Option<bool>,
    pub disease_details: Option<SuggestionDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyAssessment {
    pub is_healthy: Option<bool>,
    pub is_healthy_probability: Option<f64>,
    pub diseases: Option<Vec<LegacyDisease>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyHealthResponse {
    pub health_assessment: Option<LegacyAssessment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentificationResult {
    pub classification: Option<SuggestionGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentificationResponse {
    pub result: Option<IdentificationResult>,
}

/// A decoded provider body, one variant per provider contract.
#[derive(Debug, Clone)]
pub enum ProviderResponse {
    HealthAssessment(HealthAssessmentResponse),
    LegacyHealthAssessment(LegacyHealthResponse),
    Identification(IdentificationResponse),
}

impl ProviderResponse {
    pub fn parse(contract: ProviderContract, body: &[u8]) -> Result<Self, serde_json::Error> {
        let response = match contract {
            ProviderContract::HealthAssessment => {
                ProviderResponse::HealthAssessment(serde_json::from_slice(body)?)
            }
            ProviderContract::LegacyHealthAssessment => {
                ProviderResponse::LegacyHealthAssessment(serde_json::from_slice(body)?)
            }
            ProviderContract::Identification => {
                ProviderResponse::Identification(serde_json::from_slice(body)?)
            }
        };
        Ok(response)
    }
}
