use thiserror::Error;

use crate::domain::DomainError;

/// Failures of the image to 3D conversion
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Tracing failed: {0}")]
    Trace(String),

    #[error("Extrusion failed: {0}")]
    Extrude(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("No traceable design found in the image")]
    EmptyOutline,
}

impl PipelineError {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Decode(_) => "raster",
            Self::Trace(_) | Self::EmptyOutline => "trace",
            Self::Extrude(_) => "extrude",
            Self::Export(_) => "export",
        }
    }
}

impl From<PipelineError> for DomainError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::EmptyOutline => {
                DomainError::validation("No traceable design found in the generated image")
            }
            other => DomainError::processing(other.stage(), other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineError::Trace("x".into()).stage(), "trace");
        assert_eq!(PipelineError::Export("x".into()).stage(), "export");
    }

    #[test]
    fn test_conversion_to_domain_error() {
        let err: DomainError = PipelineError::Extrude("degenerate ring".into()).into();
        assert!(matches!(err, DomainError::Processing { ref stage, .. } if stage == "extrude"));

        let err: DomainError = PipelineError::EmptyOutline.into();
        assert!(matches!(err, DomainError::Validation { .. }));
    }
}
