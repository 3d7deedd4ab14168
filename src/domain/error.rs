use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Content policy rejection: {message}")]
    ContentPolicy { message: String },

    #[error("Processing error in {stage}: {message}")]
    Processing { stage: String, message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn content_policy(message: impl Into<String>) -> Self {
        Self::ContentPolicy {
            message: message.into(),
        }
    }

    pub fn processing(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Processing {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn is_content_policy(&self) -> bool {
        matches!(self, Self::ContentPolicy { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = DomainError::validation("Description is required");
        assert_eq!(error.to_string(), "Validation error: Description is required");
    }

    #[test]
    fn test_processing_error_names_stage() {
        let error = DomainError::processing("trace", "no contours");
        assert_eq!(error.to_string(), "Processing error in trace: no contours");
    }

    #[test]
    fn test_content_policy_detection() {
        assert!(DomainError::content_policy("rejected").is_content_policy());
        assert!(!DomainError::provider("openai", "timeout").is_content_policy());
    }
}
