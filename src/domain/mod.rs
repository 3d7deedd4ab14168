//! Domain layer - Core business logic and entities

pub mod error;
pub mod generation;
pub mod pipeline;
pub mod prompt;

pub use error::DomainError;
pub use generation::{
    Face, GeneratedImage, GenerationRequest, ImageGenerator, ProductKind, ReferenceDescriber,
    ReferenceImage,
};
pub use pipeline::{Finish, ModelArtifact, ModelPipeline, PipelineError, PipelineOutput};
pub use prompt::{PromptBuilder, PromptStyle, PromptTemplate, PromptVariable, TemplateError};
