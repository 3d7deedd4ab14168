use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use crate::domain::DomainError;

/// Trait for HTTP client operations (for mocking)
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError>;

    async fn get_bytes(&self, url: &str) -> Result<Bytes, DomainError>;
}

#[async_trait]
impl<C: HttpClientTrait> HttpClientTrait for Arc<C> {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        self.as_ref().post_json(url, headers, body).await
    }

    async fn get_bytes(&self, url: &str) -> Result<Bytes, DomainError> {
        self.as_ref().get_bytes(url).await
    }
}

/// Real HTTP client using reqwest
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        let mut request = self.client.post(url);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::provider("http", format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_body = response.text().await.unwrap_or_default();
            return Err(upstream_error(status, &error_body));
        }

        response
            .json()
            .await
            .map_err(|e| DomainError::provider("http", format!("Failed to parse response: {}", e)))
    }

    async fn get_bytes(&self, url: &str) -> Result<Bytes, DomainError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DomainError::provider("http", format!("Download failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_body = response.text().await.unwrap_or_default();
            return Err(upstream_error(status, &error_body));
        }

        response
            .bytes()
            .await
            .map_err(|e| DomainError::provider("http", format!("Failed to read body: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: UpstreamError,
}

#[derive(Debug, Deserialize)]
struct UpstreamError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// Map a failed upstream response onto a domain error.
///
/// OpenAI-style `{"error": {"message", "code"}}` bodies are unwrapped; a
/// `content_policy_violation` code or a safety-system message becomes
/// [`DomainError::ContentPolicy`].
pub fn upstream_error(status: u16, body: &str) -> DomainError {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return DomainError::provider("http", format!("HTTP {}: {}", status, body));
    };
    let error = envelope.error;

    if is_content_policy(error.code.as_deref(), &error.message) {
        return DomainError::content_policy(error.message);
    }

    DomainError::provider("http", format!("HTTP {}: {}", status, error.message))
}

fn is_content_policy(code: Option<&str>, message: &str) -> bool {
    code == Some("content_policy_violation") || message.to_ascii_lowercase().contains("safety system")
}
