//! Application state for shared services

use std::sync::Arc;

use crate::config::{AppConfig, CorsConfig};
use crate::infrastructure::artifacts::ArtifactStore;
use crate::infrastructure::services::GenerationService;

/// Handles constructed once per process and cloned into every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub generation_service: Arc<GenerationService>,
    pub artifacts: Arc<ArtifactStore>,
    pub cors: CorsConfig,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(generation_service: GenerationService, config: &AppConfig) -> Self {
        let artifacts = Arc::clone(generation_service.artifacts());
        Self {
            generation_service: Arc::new(generation_service),
            artifacts,
            cors: config.cors.clone(),
            max_body_bytes: config.server.max_body_bytes,
        }
    }
}
