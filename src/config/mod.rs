//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, ArtifactConfig, CorsConfig, FeatureConfig, GenerationConfig, LogFormat,
    LoggingConfig, OutputFormat, PipelineConfig, ServerConfig,
};
