use reqwest::Client as HttpClient;
use reqwest::StatusCode;
use shared::SubjectType;
use url::Url;

use crate::config::{AppConfig, ProviderConfig, ProviderRegistry};
use crate::upload::validator::UploadedImage;

use super::models::{details_query, ProviderRequest, ProviderResponse};

const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("{service} service is not configured")]
    NotConfigured { service: String },
    #[error("Invalid provider URL for {service}: {source}")]
    InvalidUrl {
        service: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Upstream response could not be decoded: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

impl DispatchError {
    /// Configuration problems are detected before any network traffic.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DispatchError::NotConfigured { .. } | DispatchError::InvalidUrl { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, DispatchError::Transport(e) if e.is_timeout())
    }
}

/// Sends one image to the provider configured for a subject type. At most one call, no retries.
#[derive(Clone)]
pub struct ProviderDispatcher {
    http_client: HttpClient,
    providers: ProviderRegistry,
}

impl ProviderDispatcher {
    pub fn new(config: &AppConfig) -> Result<Self, DispatchError> {
        let http_client = HttpClient::builder()
            .timeout(config.upstream_timeout)
            .build()?;
        Ok(Self::with_client(http_client, config.providers.clone()))
    }

    pub fn with_client(http_client: HttpClient, providers: ProviderRegistry) -> Self {
        Self {
            http_client,
            providers,
        }
    }

    /// Display name of the provider serving `subject`, used as the finding source.
    pub fn provider_name(&self, subject: SubjectType) -> Option<&str> {
        self.providers.get(subject).map(|p| p.name.as_str())
    }

    pub async fn dispatch(
        &self,
        subject: SubjectType,
        image: &UploadedImage,
    ) -> Result<ProviderResponse, DispatchError> {
        let provider = self
            .providers
            .get(subject)
            .ok_or_else(|| DispatchError::NotConfigured {
                service: subject.to_string(),
            })?;

        let api_key = provider
            .api_key
            .as_deref()
            .ok_or_else(|| DispatchError::NotConfigured {
                service: provider.name.clone(),
            })?;

        let url = endpoint_url(provider)?;
        let request = ProviderRequest::for_contract(provider.contract, image.to_base64());

        log::info!(
            "Sending {} analysis to {} ({} bytes)",
            subject,
            provider.name,
            image.byte_length()
        );

        let response = self
            .http_client
            .post(url)
            .header("Api-Key", api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        log::debug!("{} responded with status {}", provider.name, status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::error!("{} API error ({}): {}", provider.name, status, error_text);
            return Err(DispatchError::Status {
                status,
                body: error_text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let body = response.bytes().await?;
        log::debug!("{} response size: {} bytes", provider.name, body.len());

        Ok(ProviderResponse::parse(provider.contract, &body)?)
    }
}

fn endpoint_url(provider: &ProviderConfig) -> Result<Url, DispatchError> {
    let raw = format!(
        "{}/{}",
        provider.base_url.trim_end_matches('/'),
        provider.endpoint.trim_start_matches('/')
    );
    let mut url = Url::parse(&raw).map_err(|source| DispatchError::InvalidUrl {
        service: provider.name.clone(),
        source,
    })?;

    if let Some(details) = details_query(provider.contract) {
        url.query_pairs_mut().append_pair("details", details);
    }

    Ok(url)
}
