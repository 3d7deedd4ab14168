use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use super::http_client::HttpClientTrait;
use crate::domain::{DomainError, GeneratedImage, ImageGenerator, ReferenceDescriber, ReferenceImage};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

const DESCRIBE_INSTRUCTIONS: &str = "Describe the key visual elements of these reference images \
so an illustrator can reproduce them on a coin or patch: subjects, symbols, lettering, \
composition and colors. Answer in one short paragraph without preamble.";

/// Optional knobs forwarded to the images endpoint
#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    pub size: String,
    pub quality: Option<String>,
    pub style: Option<String>,
    pub response_format: Option<String>,
}

/// OpenAI images API provider
#[derive(Debug)]
pub struct OpenAiImageGenerator<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    model: String,
    options: ImageOptions,
}

impl<C: HttpClientTrait> OpenAiImageGenerator<C> {
    pub fn new(client: C, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, model, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            auth_header: format!("Bearer {}", api_key.into()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            options: ImageOptions {
                size: "1024x1024".to_string(),
                ..Default::default()
            },
        }
    }

    pub fn with_options(mut self, options: ImageOptions) -> Self {
        self.options = options;
        self
    }

    fn generations_url(&self) -> String {
        format!("{}/v1/images/generations", self.base_url)
    }

    fn build_request(&self, prompt: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "size": self.options.size,
        });

        if let Some(ref quality) = self.options.quality {
            body["quality"] = serde_json::json!(quality);
        }

        if let Some(ref style) = self.options.style {
            body["style"] = serde_json::json!(style);
        }

        if let Some(ref response_format) = self.options.response_format {
            body["response_format"] = serde_json::json!(response_format);
        }

        body
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<GeneratedImage, DomainError> {
        let response: ImagesResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider("openai", format!("Failed to parse response: {}", e))
        })?;

        let image = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::provider("openai", "No image returned"))?;

        match (image.b64_json, image.url) {
            (Some(payload), _) if !payload.is_empty() => Ok(GeneratedImage::Base64(payload)),
            (_, Some(url)) if !url.is_empty() => Ok(GeneratedImage::Url(url)),
            _ => Err(DomainError::provider("openai", "No image returned")),
        }
    }
}

#[async_trait]
impl<C: HttpClientTrait> ImageGenerator for OpenAiImageGenerator<C> {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, DomainError> {
        let url = self.generations_url();
        let body = self.build_request(prompt);
        let response = self.client.post_json(&url, self.headers(), &body).await?;

        self.parse_response(response)
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, DomainError> {
        self.client.get_bytes(url).await
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Vision chat model that summarizes reference images into prompt notes
#[derive(Debug)]
pub struct OpenAiReferenceDescriber<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    model: String,
}

impl<C: HttpClientTrait> OpenAiReferenceDescriber<C> {
    pub fn new(client: C, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, model, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            auth_header: format!("Bearer {}", api_key.into()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_request(&self, images: &[ReferenceImage]) -> serde_json::Value {
        let mut content = vec![serde_json::json!({
            "type": "text",
            "text": DESCRIBE_INSTRUCTIONS,
        })];
        content.extend(images.iter().map(|image| {
            serde_json::json!({
                "type": "image_url",
                "image_url": { "url": image.to_data_url() },
            })
        }));

        serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": content }],
            "max_tokens": 300,
        })
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<String, DomainError> {
        let response: ChatResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider("openai", format!("Failed to parse response: {}", e))
        })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::provider("openai", "No choices in response"))?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(DomainError::content_policy(
                "Reference images were rejected by the vision model",
            ));
        }
        if let Some(refusal) = choice.message.refusal.filter(|r| !r.trim().is_empty()) {
            return Err(DomainError::content_policy(refusal));
        }

        let notes = choice.message.content.unwrap_or_default().trim().to_string();
        if notes.is_empty() {
            return Err(DomainError::provider("openai", "Vision model returned no description"));
        }
        Ok(notes)
    }
}

#[async_trait]
impl<C: HttpClientTrait> ReferenceDescriber for OpenAiReferenceDescriber<C> {
    async fn describe(&self, images: &[ReferenceImage]) -> Result<String, DomainError> {
        let url = self.chat_completions_url();
        let body = self.build_request(images);
        let response = self.client.post_json(&url, self.headers(), &body).await?;

        self.parse_response(response)
    }
}

// OpenAI API types

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::generation::http_client::mock::MockHttpClient;
    use std::sync::Arc;

    const IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";
    const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

    #[tokio::test]
    async fn test_generate_inline_image() {
        let client = MockHttpClient::new()
            .with_response(IMAGES_URL, serde_json::json!({"data": [{"b64_json": "aGVsbG8="}]}));

        let generator = OpenAiImageGenerator::new(client, "test-key", "gpt-image-1");
        let image = generator.generate("eagle with shield").await.unwrap();

        assert_eq!(image, GeneratedImage::Base64("aGVsbG8=".to_string()));
    }

    #[tokio::test]
    async fn test_generate_url_image() {
        let client = MockHttpClient::new().with_response(
            IMAGES_URL,
            serde_json::json!({"data": [{"url": "https://cdn.example.com/a.png"}]}),
        );

        let generator = OpenAiImageGenerator::new(client, "test-key", "dall-e-3");
        let image = generator.generate("eagle").await.unwrap();

        assert_eq!(image, GeneratedImage::Url("https://cdn.example.com/a.png".to_string()));
    }

    #[tokio::test]
    async fn test_request_body_carries_options() {
        let client = Arc::new(
            MockHttpClient::new().with_response(IMAGES_URL, serde_json::json!({"data": [{"url": "u"}]})),
        );

        let generator = OpenAiImageGenerator::new(client.clone(), "k", "dall-e-3").with_options(ImageOptions {
            size: "512x512".to_string(),
            quality: Some("hd".to_string()),
            style: None,
            response_format: Some("url".to_string()),
        });
        generator.generate("a lion").await.unwrap();

        let (_, body) = &client.requests()[0];
        assert_eq!(body["model"], "dall-e-3");
        assert_eq!(body["prompt"], "a lion");
        assert_eq!(body["size"], "512x512");
        assert_eq!(body["quality"], "hd");
        assert_eq!(body["response_format"], "url");
        assert!(body.get("style").is_none());
    }

    #[tokio::test]
    async fn test_no_image_returned() {
        let client = MockHttpClient::new().with_response(IMAGES_URL, serde_json::json!({"data": []}));

        let generator = OpenAiImageGenerator::new(client, "k", "gpt-image-1");
        let err = generator.generate("eagle").await.unwrap_err();

        assert!(err.to_string().contains("No image returned"));
    }

    #[tokio::test]
    async fn test_content_policy_propagates() {
        let client = MockHttpClient::new().with_content_policy_error(IMAGES_URL, "rejected");

        let generator = OpenAiImageGenerator::new(client, "k", "gpt-image-1");
        let err = generator.generate("eagle").await.unwrap_err();

        assert!(err.is_content_policy());
    }

    #[tokio::test]
    async fn test_custom_base_url() {
        let client = MockHttpClient::new().with_response(
            "http://localhost:9000/v1/images/generations",
            serde_json::json!({"data": [{"b64_json": "AA=="}]}),
        );

        let generator =
            OpenAiImageGenerator::with_base_url(client, "k", "gpt-image-1", "http://localhost:9000/");
        assert!(generator.generate("eagle").await.is_ok());
    }

    #[tokio::test]
    async fn test_describe_sends_data_urls() {
        let client = Arc::new(MockHttpClient::new().with_response(
            CHAT_URL,
            serde_json::json!({
                "choices": [{
                    "message": {"role": "assistant", "content": " A bald eagle holding a shield. "},
                    "finish_reason": "stop"
                }]
            }),
        ));

        let describer = OpenAiReferenceDescriber::new(client.clone(), "k", "gpt-4o-mini");
        let images = vec![ReferenceImage::new(&b"png"[..], "image/png")];
        let notes = describer.describe(&images).await.unwrap();

        assert_eq!(notes, "A bald eagle holding a shield.");

        let (_, body) = &client.requests()[0];
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,cG5n");
    }

    #[tokio::test]
    async fn test_describe_refusal_is_content_policy() {
        let client = MockHttpClient::new().with_response(
            CHAT_URL,
            serde_json::json!({
                "choices": [{
                    "message": {"role": "assistant", "content": null, "refusal": "I can't help with that."},
                    "finish_reason": "stop"
                }]
            }),
        );

        let describer = OpenAiReferenceDescriber::new(client, "k", "gpt-4o-mini");
        let images = vec![ReferenceImage::new(&b"png"[..], "image/png")];
        let err = describer.describe(&images).await.unwrap_err();

        assert!(err.is_content_policy());
    }
}
