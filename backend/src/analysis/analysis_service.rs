use shared::{AnalysisResult, SubjectType};

use crate::config::AppConfig;
use crate::providers::dispatcher::{DispatchError, ProviderDispatcher};
use crate::upload::validator::UploadedImage;

use super::normalizer::{degraded, normalize};

/// Runs one validated image through dispatch and normalization. Holds no per-request state.
#[derive(Clone)]
pub struct AnalysisService {
    dispatcher: ProviderDispatcher,
}

impl AnalysisService {
    pub fn new(config: &AppConfig) -> Result<Self, DispatchError> {
        Ok(Self::with_dispatcher(ProviderDispatcher::new(config)?))
    }

    pub fn with_dispatcher(dispatcher: ProviderDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Only configuration errors are returned; upstream failures become a degraded result.
    pub async fn analyze(
        &self,
        subject: SubjectType,
        image: &UploadedImage,
    ) -> Result<AnalysisResult, DispatchError> {
        match self.dispatcher.dispatch(subject, image).await {
            Ok(response) => {
                let source = self.dispatcher.provider_name(subject).unwrap_or("Unknown");
                let result = normalize(subject, source, response);
                log::info!(
                    "{} analysis complete: healthy={}, findings={}",
                    subject,
                    result.is_healthy,
                    result.findings.len()
                );
                Ok(result)
            }
            Err(e) if e.is_configuration() => {
                log::warn!("Rejecting {} analysis: {}", subject, e);
                Err(e)
            }
            Err(e) => {
                log::error!("{} analysis failed upstream: {}", subject, e);
                Ok(degraded(subject, &e))
            }
        }
    }
}
