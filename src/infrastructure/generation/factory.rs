use std::sync::Arc;
use std::time::Duration;

use super::http_client::HttpClient;
use super::openai::{ImageOptions, OpenAiImageGenerator, OpenAiReferenceDescriber};
use crate::config::GenerationConfig;
use crate::domain::{DomainError, ImageGenerator, ReferenceDescriber};

/// Upstream handles shared by every request
#[derive(Debug, Clone)]
pub struct GenerationProviders {
    pub generator: Arc<dyn ImageGenerator>,
    pub describer: Arc<dyn ReferenceDescriber>,
}

/// Factory for creating the generation providers
#[derive(Debug)]
pub struct GenerationProviderFactory;

impl GenerationProviderFactory {
    /// Build providers over one shared HTTP client
    pub fn create(config: &GenerationConfig) -> Result<GenerationProviders, DomainError> {
        Self::create_with_key(config, config.resolve_api_key())
    }

    fn create_with_key(
        config: &GenerationConfig,
        api_key: Option<String>,
    ) -> Result<GenerationProviders, DomainError> {
        let api_key = api_key.ok_or_else(|| {
            DomainError::configuration(
                "No API key configured; set OPENAI_API_KEY or APP__GENERATION__API_KEY",
            )
        })?;

        let http_client = Arc::new(HttpClient::with_timeout(Duration::from_secs(
            config.timeout_secs.max(1),
        ))?);

        let generator = OpenAiImageGenerator::with_base_url(
            http_client.clone(),
            api_key.clone(),
            config.model.clone(),
            config.base_url.clone(),
        )
        .with_options(ImageOptions {
            size: config.size.clone(),
            quality: config.quality.clone(),
            style: config.style.clone(),
            response_format: config.response_format.clone(),
        });

        let describer = OpenAiReferenceDescriber::with_base_url(
            http_client,
            api_key,
            config.vision_model.clone(),
            config.base_url.clone(),
        );

        Ok(GenerationProviders {
            generator: Arc::new(generator),
            describer: Arc::new(describer),
        })
    }
}
