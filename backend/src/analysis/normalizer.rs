use serde_json::Value;
use shared::{AnalysisResult, IdentifiedSubject, ProviderFinding, SubjectType};

use crate::providers::dispatcher::DispatchError;
use crate::providers::models::{
    HealthAssessmentResponse, HealthSignal, IdentificationResponse, LegacyHealthResponse,
    ProviderResponse, Suggestion, SuggestionDetails,
};

pub const NO_TREATMENT: &str = "No treatment information available";
pub const NO_DESCRIPTION: &str = "No description available";

const DEFAULT_HEALTH_THRESHOLD: f64 = 0.5;
const UNKNOWN_DISEASE: &str = "Unknown Disease";
const UNKNOWN_SUBJECT: &str = "Unknown";

/// A finding plus the provider's raw fraction, kept for the confidence score.
struct Candidate {
    fraction: f64,
    finding: ProviderFinding,
}

/// Maps a decoded provider body onto the single result contract.
pub fn normalize(subject: SubjectType, source: &str, response: ProviderResponse) -> AnalysisResult {
    match response {
        ProviderResponse::HealthAssessment(body) => from_health_assessment(subject, source, body),
        ProviderResponse::LegacyHealthAssessment(body) => {
            from_legacy_health_assessment(subject, source, body)
        }
        ProviderResponse::Identification(body) => from_identification(subject, source, body),
    }
}

fn from_health_assessment(
    subject: SubjectType,
    source: &str,
    body: HealthAssessmentResponse,
) -> AnalysisResult {
    let result = body.result.unwrap_or_default();
    let signal = result.is_healthy.as_ref();
    let is_healthy = health_verdict(signal);

    let suggestions = result
        .disease
        .and_then(|group| group.suggestions)
        .unwrap_or_default();
    let candidates = suggestions
        .into_iter()
        .filter(|s| !s.redundant.unwrap_or(false))
        .map(|s| candidate(s.name, s.probability, s.details, UNKNOWN_DISEASE, source))
        .collect();

    let identified_subject = result
        .crop
        .and_then(|group| group.suggestions)
        .and_then(top_suggestion);

    let health_probability = signal.and_then(|s| s.probability);
    assemble(subject, is_healthy, health_probability, candidates, identified_subject)
}

fn from_legacy_health_assessment(
    subject: SubjectType,
    source: &str,
    body: LegacyHealthResponse,
) -> AnalysisResult {
    let assessment = body.health_assessment.unwrap_or_default();
    let is_healthy = assessment
        .is_healthy
        .or_else(|| {
            assessment
                .is_healthy_probability
                .map(|p| p >= DEFAULT_HEALTH_THRESHOLD)
        })
        .unwrap_or(false);

    let candidates = assessment
        .diseases
        .unwrap_or_default()
        .into_iter()
        .filter(|d| !d.redundant.unwrap_or(false))
        .map(|d| candidate(d.name, d.probability, d.disease_details, UNKNOWN_DISEASE, source))
        .collect();

    assemble(
        subject,
        is_healthy,
        assessment.is_healthy_probability,
        candidates,
        None,
    )
}

/// Identification providers report no health signal, so the result is never healthy.
fn from_identification(
    subject: SubjectType,
    source: &str,
    body: IdentificationResponse,
) -> AnalysisResult {
    let suggestions = body
        .result
        .and_then(|r| r.classification)
        .and_then(|group| group.suggestions)
        .unwrap_or_default();

    let identified_subject = top_suggestion(suggestions.clone());
    let candidates = suggestions
        .into_iter()
        .filter(|s| !s.redundant.unwrap_or(false))
        .map(|s| candidate(s.name, s.probability, s.details, UNKNOWN_SUBJECT, source))
        .collect();

    assemble(subject, false, None, candidates, identified_subject)
}

fn assemble(
    subject: SubjectType,
    is_healthy: bool,
    health_probability: Option<f64>,
    mut candidates: Vec<Candidate>,
    identified_subject: Option<IdentifiedSubject>,
) -> AnalysisResult {
    // Stable: equal percentages keep the provider's order.
    candidates.sort_by(|a, b| b.finding.probability.cmp(&a.finding.probability));

    let top_fraction = candidates.first().map(|c| c.fraction);
    let confidence = if is_healthy {
        health_probability.unwrap_or(1.0)
    } else {
        top_fraction.unwrap_or(0.0)
    };

    AnalysisResult {
        subject_type: subject,
        is_healthy,
        confidence: confidence.clamp(0.0, 1.0) as f32,
        findings: candidates.into_iter().map(|c| c.finding).collect(),
        identified_subject,
    }
}

/// Missing signal counts as unhealthy. A bare probability is compared to the threshold.
fn health_verdict(signal: Option<&HealthSignal>) -> bool {
    match signal {
        Some(signal) => signal.binary.unwrap_or_else(|| {
            signal
                .probability
                .map(|p| p >= signal.threshold.unwrap_or(DEFAULT_HEALTH_THRESHOLD))
                .unwrap_or(false)
        }),
        None => false,
    }
}

fn candidate(
    name: Option<String>,
    probability: Option<f64>,
    details: Option<SuggestionDetails>,
    unknown_name: &str,
    source: &str,
) -> Candidate {
    let details = details.unwrap_or_default();
    let fraction = probability.unwrap_or(0.0);

    Candidate {
        fraction,
        finding: ProviderFinding {
            name: name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| unknown_name.to_string()),
            probability: to_percentage(probability),
            description: describe(details.description.as_ref())
                .or_else(|| common_names(details.common_names.as_deref()))
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            treatment_text: flatten_treatment(details.treatment.as_ref()),
            source: source.to_string(),
        },
    }
}

fn top_suggestion(suggestions: Vec<Suggestion>) -> Option<IdentifiedSubject> {
    suggestions
        .into_iter()
        .filter(|s| !s.redundant.unwrap_or(false))
        .fold(None::<Suggestion>, |best, s| match best {
            Some(b) if b.probability.unwrap_or(0.0) >= s.probability.unwrap_or(0.0) => Some(b),
            _ => Some(s),
        })
        .map(|s| IdentifiedSubject {
            name: s.name.unwrap_or_else(|| UNKNOWN_SUBJECT.to_string()),
            probability: to_percentage(s.probability),
        })
}

/// Fraction in 0..=1 to a whole percentage in 0..=100.
pub fn to_percentage(probability: Option<f64>) -> u8 {
    let p = probability.unwrap_or(0.0);
    if !p.is_finite() {
        return 0;
    }
    (p * 100.0).round().clamp(0.0, 100.0) as u8
}

fn describe(description: Option<&Value>) -> Option<String> {
    let text = match description? {
        Value::String(s) => s.trim().to_string(),
        Value::Object(map) => map.get("value")?.as_str()?.trim().to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn common_names(names: Option<&[String]>) -> Option<String> {
    let names: Vec<&str> = names?
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect();
    (!names.is_empty()).then(|| format!("Common names: {}", names.join(", ")))
}

/// Treatment arrives as a string, a list, or an object of prevention/biological/chemical lists.
pub fn flatten_treatment(treatment: Option<&Value>) -> String {
    let text = match treatment {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => bullets(items).unwrap_or_default(),
        Some(Value::Object(map)) => {
            let sections: Vec<String> = [
                ("prevention", "Prevention"),
                ("biological", "Biological Control"),
                ("chemical", "Chemical Control"),
            ]
            .iter()
            .filter_map(|(key, header)| {
                let items = map.get(*key)?.as_array()?;
                Some(format!("{}:\n{}", header, bullets(items)?))
            })
            .collect();
            sections.join("\n\n")
        }
        _ => String::new(),
    };

    if text.is_empty() {
        NO_TREATMENT.to_string()
    } else {
        text
    }
}

fn bullets(items: &[Value]) -> Option<String> {
    let lines: Vec<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("• {}", s))
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

/// Well-formed stand-in result when the provider could not be reached or understood.
pub fn degraded(subject: SubjectType, error: &DispatchError) -> AnalysisResult {
    let (name, description) = match error {
        DispatchError::InvalidBody(_) => (
            "Service Response Error",
            "The disease detection service returned a response that could not be read.",
        ),
        e if e.is_timeout() => (
            "API Connection Error",
            "The disease detection service did not respond in time.",
        ),
        _ => (
            "API Connection Error",
            "Unable to connect to the plant disease detection service. This might be due to API rate limits or connection issues.",
        ),
    };

    AnalysisResult {
        subject_type: subject,
        is_healthy: false,
        confidence: 0.0,
        findings: vec![ProviderFinding {
            name: name.to_string(),
            probability: 100,
            description: description.to_string(),
            treatment_text: "Please try again later or contact support if the issue persists."
                .to_string(),
            source: "System".to_string(),
        }],
        identified_subject: None,
    }
}
