//! Image generation provider implementations

mod factory;
mod http_client;
mod openai;

pub use factory::{GenerationProviderFactory, GenerationProviders};
pub use http_client::{HttpClient, HttpClientTrait, upstream_error};
pub use openai::{ImageOptions, OpenAiImageGenerator, OpenAiReferenceDescriber};

#[cfg(test)]
pub use http_client::mock;
