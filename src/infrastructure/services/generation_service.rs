//! Generation service - prompt, acquire, optionally convert, deliver

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::{FeatureConfig, OutputFormat};
use crate::domain::{
    DomainError, Face, Finish, GeneratedImage, GenerationRequest, ImageGenerator, ModelArtifact,
    ModelPipeline, PipelineOutput, PromptBuilder, PromptStyle, ReferenceDescriber,
};
use crate::infrastructure::artifacts::ArtifactStore;

pub const REFERENCE_FALLBACK_MESSAGE: &str = "Your reference images could not be used because \
they were flagged by the content policy. The design was generated from your description only.";

/// How an artifact reaches the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Url(String),
    Base64(String),
}

/// Everything produced for one design
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub image: Delivery,
    pub model: Option<Delivery>,
    pub shape: Option<String>,
    /// Set when reference images were supplied
    pub images_used: Option<bool>,
    pub message: Option<String>,
    pub empty_model: bool,
    /// Ids of artifacts persisted for this design
    pub artifacts: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct FacesOutcome {
    pub front: GenerationOutcome,
    pub back: GenerationOutcome,
}

/// Per-face description overrides for two-sided generation
#[derive(Debug, Clone, Default)]
pub struct FaceDescriptions {
    pub front: Option<String>,
    pub back: Option<String>,
}

struct Acquired {
    image: GeneratedImage,
    images_used: Option<bool>,
    message: Option<String>,
}

/// Orchestrates one request end to end
#[derive(Debug, Clone)]
pub struct GenerationService {
    generator: Arc<dyn ImageGenerator>,
    describer: Arc<dyn ReferenceDescriber>,
    prompts: PromptBuilder,
    pipeline: Arc<ModelPipeline>,
    artifacts: Arc<ArtifactStore>,
    features: FeatureConfig,
}

impl GenerationService {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        describer: Arc<dyn ReferenceDescriber>,
        pipeline: ModelPipeline,
        artifacts: Arc<ArtifactStore>,
        features: FeatureConfig,
    ) -> Self {
        let pipeline = pipeline.with_reject_empty(features.reject_empty_outline);
        Self {
            generator,
            describer,
            prompts: PromptBuilder,
            pipeline: Arc::new(pipeline),
            artifacts,
            features,
        }
    }

    pub fn features(&self) -> &FeatureConfig {
        &self.features
    }

    pub fn artifacts(&self) -> &Arc<ArtifactStore> {
        &self.artifacts
    }

    pub fn provider_name(&self) -> &'static str {
        self.generator.provider_name()
    }

    #[instrument(skip_all, fields(product = %request.product, face = request.face.map(|f| f.as_str())))]
    pub async fn generate(&self, mut request: GenerationRequest) -> Result<GenerationOutcome, DomainError> {
        request.validate()?;
        if !self.features.multiple_reference_images {
            request.images.truncate(1);
        }

        let style = if self.features.generate_model {
            PromptStyle::ReliefStencil
        } else {
            PromptStyle::ProductPhoto
        };

        let acquired = self.acquire(&request, style).await?;

        let needs_bytes = self.features.generate_model
            || matches!(
                (&acquired.image, self.features.output_format),
                (GeneratedImage::Url(_), OutputFormat::Base64)
                    | (GeneratedImage::Base64(_), OutputFormat::Url)
            );
        let image_bytes = if needs_bytes {
            Some(self.image_bytes(&acquired.image).await?)
        } else {
            None
        };

        let converted = match (&image_bytes, self.features.generate_model) {
            (Some(bytes), true) => {
                let finish = Finish::from_hint(request.finish.as_deref());
                Some(self.convert(bytes.clone(), finish).await?)
            }
            _ => None,
        };

        // Nothing is persisted until every stage has succeeded
        let mut stored = Vec::new();
        let delivered = self
            .deliver(&acquired.image, image_bytes.as_ref(), converted.as_ref(), &mut stored)
            .await;
        let (image, model) = match delivered {
            Ok(delivered) => delivered,
            Err(e) => {
                self.artifacts.release(&stored).await;
                return Err(e);
            }
        };
        let empty_model = converted.as_ref().is_some_and(|output| output.empty);

        info!(
            images_used = ?acquired.images_used,
            model = model.is_some(),
            empty_model,
            stored = stored.len(),
            "Design generated"
        );

        Ok(GenerationOutcome {
            image,
            model,
            shape: request.shape.clone(),
            images_used: acquired.images_used,
            message: acquired.message,
            empty_model,
            artifacts: stored,
        })
    }

    /// Generate front and back concurrently; either failure fails both and
    /// releases whatever the other branch stored
    pub async fn generate_faces(
        &self,
        request: GenerationRequest,
        descriptions: FaceDescriptions,
    ) -> Result<FacesOutcome, DomainError> {
        let front = face_request(&request, Face::Front, descriptions.front);
        let back = face_request(&request, Face::Back, descriptions.back);
        front.validate()?;
        back.validate()?;

        let (front, back) = tokio::join!(self.generate(front), self.generate(back));
        match (front, back) {
            (Ok(front), Ok(back)) => Ok(FacesOutcome { front, back }),
            (Err(e), other) | (other, Err(e)) => {
                if let Ok(done) = other {
                    self.artifacts.release(&done.artifacts).await;
                }
                Err(e)
            }
        }
    }

    async fn acquire(&self, request: &GenerationRequest, style: PromptStyle) -> Result<Acquired, DomainError> {
        if !request.has_images() {
            let prompt = self.prompts.build(request, style)?;
            return Ok(Acquired {
                image: self.generator.generate(&prompt).await?,
                images_used: None,
                message: None,
            });
        }

        let guided = match self.describer.describe(&request.images).await {
            Ok(notes) => {
                let prompt = self.prompts.build_with_reference(request, style, &notes)?;
                self.generator.generate(&prompt).await
            }
            Err(e) => Err(e),
        };

        match guided {
            Ok(image) => Ok(Acquired {
                image,
                images_used: Some(true),
                message: None,
            }),
            Err(e) if e.is_content_policy() && self.features.vision_fallback => {
                warn!(error = %e, "Reference images rejected, retrying with description only");
                let prompt = self.prompts.build(request, style)?;
                Ok(Acquired {
                    image: self.generator.generate(&prompt).await?,
                    images_used: Some(false),
                    message: Some(REFERENCE_FALLBACK_MESSAGE.to_string()),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn image_bytes(&self, image: &GeneratedImage) -> Result<Bytes, DomainError> {
        match image {
            GeneratedImage::Url(url) => self.generator.fetch(url).await,
            GeneratedImage::Base64(_) => image
                .decode_inline()
                .unwrap_or_else(|| Err(DomainError::internal("Inline image without payload"))),
        }
    }

    async fn deliver(
        &self,
        image: &GeneratedImage,
        bytes: Option<&Bytes>,
        converted: Option<&PipelineOutput>,
        stored: &mut Vec<Uuid>,
    ) -> Result<(Delivery, Option<Delivery>), DomainError> {
        let image = self.deliver_image(image, bytes, stored).await?;
        let model = match converted {
            Some(output) => Some(self.deliver_model(&output.artifact, stored).await?),
            None => None,
        };
        Ok((image, model))
    }

    async fn deliver_image(
        &self,
        image: &GeneratedImage,
        bytes: Option<&Bytes>,
        stored: &mut Vec<Uuid>,
    ) -> Result<Delivery, DomainError> {
        match (self.features.output_format, image) {
            (OutputFormat::Url, GeneratedImage::Url(url)) => Ok(Delivery::Url(url.clone())),
            (OutputFormat::Base64, GeneratedImage::Base64(payload)) => {
                Ok(Delivery::Base64(payload.clone()))
            }
            (OutputFormat::Base64, GeneratedImage::Url(_)) => {
                let bytes = required(bytes)?;
                Ok(Delivery::Base64(BASE64.encode(bytes)))
            }
            (OutputFormat::Url, GeneratedImage::Base64(_)) => {
                let bytes = required(bytes)?;
                let format = image::guess_format(bytes).unwrap_or(image::ImageFormat::Png);
                let extension = format.extensions_str().first().copied().unwrap_or("png");
                let artifact = self
                    .artifacts
                    .put(bytes.clone(), format.to_mime_type(), extension)
                    .await?;
                stored.push(artifact.id);
                Ok(Delivery::Url(self.artifacts.url_for(&artifact)))
            }
        }
    }

    async fn deliver_model(
        &self,
        model: &ModelArtifact,
        stored: &mut Vec<Uuid>,
    ) -> Result<Delivery, DomainError> {
        match self.features.output_format {
            OutputFormat::Base64 => Ok(Delivery::Base64(BASE64.encode(&model.bytes))),
            OutputFormat::Url => {
                let artifact = self
                    .artifacts
                    .put(Bytes::from(model.bytes.clone()), model.media_type(), "glb")
                    .await?;
                stored.push(artifact.id);
                Ok(Delivery::Url(self.artifacts.url_for(&artifact)))
            }
        }
    }

    async fn convert(&self, bytes: Bytes, finish: Finish) -> Result<PipelineOutput, DomainError> {
        let pipeline = Arc::clone(&self.pipeline);
        let output = tokio::task::spawn_blocking(move || pipeline.run(&bytes, finish))
            .await
            .map_err(|e| DomainError::internal(format!("Model task failed: {}", e)))??;
        Ok(output)
    }
}

fn required(bytes: Option<&Bytes>) -> Result<&Bytes, DomainError> {
    bytes.ok_or_else(|| DomainError::internal("Image bytes were not acquired"))
}

fn face_request(base: &GenerationRequest, face: Face, description: Option<String>) -> GenerationRequest {
    let mut request = base.clone().with_face(face);
    if let Some(description) = description.filter(|d| !d.trim().is_empty()) {
        request.description = description;
    }
    request
}
