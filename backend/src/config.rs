use serde::{Deserialize, Serialize};
use shared::SubjectType;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;
use strum::IntoEnumIterator;

const DEFAULT_PORT: &str = "5000";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read provider config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid provider config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Response/request shape spoken by a provider endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderContract {
    /// plant.id v3 and crop.health: `result.is_healthy`, `result.disease.suggestions`.
    HealthAssessment,
    /// plant.id v2: `health_assessment.diseases[].disease_details`.
    LegacyHealthAssessment,
    /// insect.id and mushroom.id: `result.classification.suggestions`.
    Identification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    pub base_url: String,
    pub endpoint: String,
    pub contract: ProviderContract,
}

#[derive(Debug, Deserialize)]
struct ProvidersFile {
    #[serde(default)]
    providers: HashMap<SubjectType, ProviderSpec>,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    pub endpoint: String,
    pub contract: ProviderContract,
    pub api_key: Option<String>,
}

impl ProviderConfig {
    pub fn from_spec(spec: ProviderSpec, api_key: Option<String>) -> Self {
        Self {
            name: spec.name,
            base_url: spec.base_url,
            endpoint: spec.endpoint,
            contract: spec.contract,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<SubjectType, ProviderConfig>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, subject: SubjectType, provider: ProviderConfig) -> Self {
        self.providers.insert(subject, provider);
        self
    }

    pub fn get(&self, subject: SubjectType) -> Option<&ProviderConfig> {
        self.providers.get(&subject)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub upstream_timeout: Duration,
    pub providers: ProviderRegistry,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port_value = lookup("PORT").unwrap_or_else(|| DEFAULT_PORT.to_string());
        let port: u16 = port_value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: "PORT".to_string(),
            value: port_value.clone(),
        })?;

        let upstream_timeout = match lookup("UPSTREAM_TIMEOUT_SECS") {
            Some(value) => {
                let secs: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "UPSTREAM_TIMEOUT_SECS".to_string(),
                    value: value.clone(),
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        };

        let mut specs = load_provider_specs(&lookup)?;
        let mut providers = ProviderRegistry::new();

        for subject in SubjectType::iter() {
            let prefix = env_prefix(subject);
            let mut spec = specs
                .remove(&subject)
                .unwrap_or_else(|| default_provider_spec(subject));

            if let Some(base_url) = lookup(&format!("{}_BASE_URL", prefix)) {
                if !base_url.trim().is_empty() {
                    spec.base_url = base_url.trim().to_string();
                }
            }

            let api_key = lookup(&format!("{}_API_KEY", prefix));
            providers = providers.with_provider(subject, ProviderConfig::from_spec(spec, api_key));
        }

        Ok(Self {
            bind_address: format!("0.0.0.0:{}", port),
            upstream_timeout,
            providers,
        })
    }

    pub fn log_provider_status(&self) {
        for subject in SubjectType::iter() {
            match self.providers.get(subject) {
                Some(provider) if provider.is_enabled() => {
                    log::info!(
                        "Provider for '{}' enabled: {} ({}{})",
                        subject,
                        provider.name,
                        provider.base_url,
                        provider.endpoint
                    );
                }
                Some(provider) => {
                    log::warn!(
                        "{}_API_KEY is not set; '{}' analysis via {} is disabled",
                        env_prefix(subject),
                        subject,
                        provider.name
                    );
                }
                None => log::warn!("No provider configured for '{}'", subject),
            }
        }
    }
}

fn env_prefix(subject: SubjectType) -> &'static str {
    match subject {
        SubjectType::Plant => "PLANT_ID",
        SubjectType::Crop => "CROP_HEALTH",
        SubjectType::Insect => "INSECT_ID",
        SubjectType::Mushroom => "MUSHROOM_ID",
    }
}

fn load_provider_specs<F>(lookup: &F) -> Result<HashMap<SubjectType, ProviderSpec>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (path, explicit) = match lookup("PROVIDERS_CONFIG") {
        Some(path) => (path, true),
        None => match lookup("CARGO_MANIFEST_DIR") {
            Some(manifest_dir) => (format!("{}/../config/providers.yaml", manifest_dir), false),
            None => ("config/providers.yaml".to_string(), false),
        },
    };

    if !explicit && !Path::new(&path).exists() {
        log::debug!("No provider config at {}, using built-in defaults", path);
        return Ok(HashMap::new());
    }

    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let file: ProvidersFile = serde_yaml::from_str(&contents)?;
    log::info!("Loaded {} provider definitions from {}", file.providers.len(), path);
    Ok(file.providers)
}

pub fn default_provider_spec(subject: SubjectType) -> ProviderSpec {
    let (name, base_url, endpoint, contract) = match subject {
        SubjectType::Plant => (
            "Plant.id",
            "https://plant.id",
            "/api/v3/health_assessment",
            ProviderContract::HealthAssessment,
        ),
        SubjectType::Crop => (
            "crop.health",
            "https://crop.kindwise.com",
            "/api/v1/identification",
            ProviderContract::HealthAssessment,
        ),
        SubjectType::Insect => (
            "insect.id",
            "https://insect.kindwise.com",
            "/api/v1/identification",
            ProviderContract::Identification,
        ),
        SubjectType::Mushroom => (
            "mushroom.id",
            "https://mushroom.kindwise.com",
            "/api/v1/identification",
            ProviderContract::Identification,
        ),
    };

    ProviderSpec {
        name: name.to_string(),
        base_url: base_url.to_string(),
        endpoint: endpoint.to_string(),
        contract,
    }
}
