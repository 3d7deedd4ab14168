//! Image to 3D model conversion
//!
//! The stages run strictly in order, in memory:
//! [`RasterPreprocessor`] → [`VectorTracer`] → [`MeshExtruder`] → [`GlbExporter`].

mod error;
mod export;
mod extrude;
mod mesh;
pub(crate) mod raster;
mod trace;

pub use error::{PipelineError, Result};
pub use export::{GLB_MEDIA_TYPE, GlbExporter, ModelArtifact};
pub use extrude::{BevelParams, MeshExtruder};
pub use mesh::{Finish, Material, Mesh};
pub use raster::{RasterImage, RasterPreprocessor};
pub use trace::{OutlinePath, VectorOutline, VectorTracer};

use tracing::info;

use crate::config::PipelineConfig;

/// Result of one conversion
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub artifact: ModelArtifact,
    pub path_count: usize,
    /// The trace found nothing; the artifact holds no geometry
    pub empty: bool,
}

/// Stateless image → GLB converter built from fixed parameters
#[derive(Debug, Clone, Default)]
pub struct ModelPipeline {
    pub preprocessor: RasterPreprocessor,
    pub tracer: VectorTracer,
    pub extruder: MeshExtruder,
    pub exporter: GlbExporter,
    /// Fail with [`PipelineError::EmptyOutline`] instead of exporting nothing
    pub reject_empty: bool,
}

impl ModelPipeline {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let bevel = config.bevel_enabled.then(|| BevelParams {
            thickness: config.bevel_thickness,
            size: config.bevel_size,
            segments: config.bevel_segments,
        });

        Self {
            preprocessor: RasterPreprocessor {
                canvas_size: config.canvas_size,
                fill_color: config.fill_color,
                threshold: config.threshold,
            },
            tracer: VectorTracer {
                speck_area: config.speck_area,
                tolerance: config.tolerance,
            },
            extruder: MeshExtruder {
                depth: config.depth,
                unit_scale: config.unit_scale,
                bevel,
            },
            exporter: GlbExporter {
                preview_light: config.preview_light,
            },
            reject_empty: false,
        }
    }

    pub fn with_reject_empty(mut self, reject_empty: bool) -> Self {
        self.reject_empty = reject_empty;
        self
    }

    /// Convert encoded image bytes into a GLB model with the given finish
    pub fn run(&self, image: &[u8], finish: Finish) -> Result<PipelineOutput> {
        let raster = self.preprocessor.process(image)?;
        let outline = self.tracer.trace(&raster);

        if outline.is_empty() && self.reject_empty {
            return Err(PipelineError::EmptyOutline);
        }

        let mesh = self.extruder.extrude(&outline, finish.material())?;
        let artifact = self.exporter.export(&mesh, "design")?;

        info!(
            paths = outline.paths.len(),
            triangles = artifact.triangle_count,
            bytes = artifact.bytes.len(),
            finish = %finish.material().name,
            "Model generated"
        );

        Ok(PipelineOutput {
            path_count: outline.paths.len(),
            empty: outline.is_empty(),
            artifact,
        })
    }
}
