use std::fmt::Debug;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;

use super::ReferenceImage;
use crate::domain::DomainError;

/// Image returned by a generation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedImage {
    /// Fetchable reference hosted by the provider
    Url(String),
    /// Inline base64 payload (no `data:` prefix)
    Base64(String),
}

impl GeneratedImage {
    /// Decode inline bytes; `None` for URL results
    pub fn decode_inline(&self) -> Option<Result<Bytes, DomainError>> {
        match self {
            Self::Url(_) => None,
            Self::Base64(payload) => Some(
                BASE64
                    .decode(payload.trim())
                    .map(Bytes::from)
                    .map_err(|e| {
                        DomainError::provider("image", format!("Invalid base64 image payload: {}", e))
                    }),
            ),
        }
    }
}

/// Trait for text-to-image services
#[async_trait]
pub trait ImageGenerator: Send + Sync + Debug {
    /// Generate one image for the prompt
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, DomainError>;

    /// Download the bytes behind a URL result
    async fn fetch(&self, url: &str) -> Result<Bytes, DomainError>;

    fn provider_name(&self) -> &'static str;
}

/// Trait for services that turn reference images into prompt notes
#[async_trait]
pub trait ReferenceDescriber: Send + Sync + Debug {
    async fn describe(&self, images: &[ReferenceImage]) -> Result<String, DomainError>;
}
