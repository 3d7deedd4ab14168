use std::path::PathBuf;

use serde::Deserialize;

/// Environment variable holding the image service credential
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub generation: GenerationConfig,
    pub cors: CorsConfig,
    pub features: FeatureConfig,
    pub pipeline: PipelineConfig,
    pub artifacts: ArtifactConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for request bodies, reference images included
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Settings for the external image generation service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub vision_model: String,
    pub size: String,
    pub quality: Option<String>,
    pub style: Option<String>,
    pub response_format: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// `*` for development, a single origin in production
    pub allowed_origin: String,
}

/// How generated artifacts are handed back to the caller
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Url,
    #[default]
    Base64,
}

/// Feature switches for the consolidated generation endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub vision_fallback: bool,
    pub output_format: OutputFormat,
    pub multiple_reference_images: bool,
    pub generate_model: bool,
    pub reject_empty_outline: bool,
}

/// Fixed constants of the image to 3D conversion
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub canvas_size: u32,
    pub fill_color: [u8; 3],
    pub threshold: u8,
    pub speck_area: f32,
    pub tolerance: f32,
    pub unit_scale: f32,
    pub depth: f32,
    pub bevel_enabled: bool,
    pub bevel_thickness: f32,
    pub bevel_size: f32,
    pub bevel_segments: u32,
    pub preview_light: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Parent directory for the transient store; system temp dir when unset
    pub directory: Option<PathBuf>,
    pub ttl_secs: u64,
    pub public_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-image-1".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            size: "1024x1024".to_string(),
            quality: None,
            style: None,
            response_format: None,
            timeout_secs: 120,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin: "*".to_string(),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            vision_fallback: true,
            output_format: OutputFormat::default(),
            multiple_reference_images: true,
            generate_model: false,
            reject_empty_outline: false,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            canvas_size: 512,
            fill_color: [255, 255, 255],
            threshold: 128,
            speck_area: 2.0,
            tolerance: 1.0,
            unit_scale: 0.01,
            depth: 0.2,
            bevel_enabled: true,
            bevel_thickness: 0.03,
            bevel_size: 0.02,
            bevel_segments: 3,
            preview_light: false,
        }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            directory: None,
            ttl_secs: 900,
            public_path: "/api/artifacts".to_string(),
        }
    }
}

impl GenerationConfig {
    /// Configured credential, falling back to `OPENAI_API_KEY`
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(std::env::var(API_KEY_ENV).ok())
    }

    /// A blank configured key does not shadow the environment one
    fn resolve_api_key_with(&self, env_key: Option<String>) -> Option<String> {
        let not_blank = |key: &String| !key.trim().is_empty();
        self.api_key
            .clone()
            .filter(not_blank)
            .or_else(|| env_key.filter(not_blank))
    }
}

impl CorsConfig {
    pub fn is_wildcard(&self) -> bool {
        self.allowed_origin.trim() == "*"
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_with(Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with(environment: config::Environment) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(environment)
            .build()?;

        config.try_deserialize()
    }
}
