//! Generation domain - client requests and the image service seams

mod provider;
mod request;

pub use provider::{GeneratedImage, ImageGenerator, ReferenceDescriber};
pub use request::{Face, GenerationRequest, ProductKind, ReferenceImage};
