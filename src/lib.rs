//! Coinforge
//!
//! Generates challenge coin and embroidered patch designs through an external
//! image model, optionally guided by customer reference images, and converts
//! the result into an extruded metallic relief exported as GLB.

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use api::state::AppState;
use domain::ModelPipeline;
use infrastructure::artifacts::ArtifactStore;
use infrastructure::generation::GenerationProviderFactory;
use infrastructure::services::GenerationService;
use tracing::info;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Create the application state from configuration.
///
/// Fails when no upstream credential is configured or the artifact directory
/// cannot be created.
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let providers = GenerationProviderFactory::create(&config.generation)?;
    info!(
        provider = providers.generator.provider_name(),
        model = %config.generation.model,
        "Image provider configured"
    );

    let artifacts = Arc::new(ArtifactStore::new(&config.artifacts)?);
    let sweep_every = Duration::from_secs(config.artifacts.ttl_secs / 3).max(MIN_SWEEP_INTERVAL);
    ArtifactStore::spawn_sweeper(&artifacts, sweep_every);

    let service = GenerationService::new(
        providers.generator,
        providers.describer,
        ModelPipeline::from_config(&config.pipeline),
        artifacts,
        config.features.clone(),
    );

    Ok(AppState::new(service, config))
}
