//! The content-generation collaborator trait and built-in backends.

use crate::error::GenerateError;
use amber_relay_workflow::ContentValue;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// The kind of content requested from the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Generated text.
    Text,
    /// A generated image reference.
    Image,
}

/// A request to the generation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// The kind of content to produce.
    pub kind: ContentKind,
    /// The prompt to generate from.
    pub prompt: String,
    /// Model identifier.
    pub model: String,
    /// Additional provider-specific parameters.
    pub params: HashMap<String, JsonValue>,
}

impl GenerateRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new(kind: ContentKind, prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
            model: model.into(),
            params: HashMap::new(),
        }
    }

    /// Adds a provider-specific parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// Trait for content-generation collaborators.
///
/// Call timeouts are the caller's responsibility; implementations only
/// report their own failures.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generates content for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if the collaborator is unreachable or rejects the
    /// request.
    async fn generate(&self, request: &GenerateRequest) -> Result<ContentValue, GenerateError>;
}

/// A deterministic local backend that renders the prompt as text.
///
/// Useful as a development default; image requests are rejected.
pub struct TemplateBackend;

#[async_trait]
impl ContentGenerator for TemplateBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<ContentValue, GenerateError> {
        match request.kind {
            ContentKind::Text => Ok(ContentValue::Text(request.prompt.clone())),
            ContentKind::Image => Err(GenerateError::Rejected {
                message: "template backend cannot produce images".to_string(),
            }),
        }
    }
}

/// A test generator that always returns the same value.
pub struct StaticGenerator {
    /// The value returned for every request.
    pub output: ContentValue,
}

impl StaticGenerator {
    /// Creates a generator returning `output` for every request.
    #[must_use]
    pub fn new(output: ContentValue) -> Self {
        Self { output }
    }
}

#[async_trait]
impl ContentGenerator for StaticGenerator {
    async fn generate(&self, _request: &GenerateRequest) -> Result<ContentValue, GenerateError> {
        Ok(self.output.clone())
    }
}

/// A test generator that always fails.
pub struct FailingGenerator {
    /// The failure message.
    pub message: String,
}

impl FailingGenerator {
    /// Creates a generator failing with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl ContentGenerator for FailingGenerator {
    async fn generate(&self, _request: &GenerateRequest) -> Result<ContentValue, GenerateError> {
        Err(GenerateError::Unavailable {
            message: self.message.clone(),
        })
    }
}

/// A test generator that never completes, for exercising call timeouts.
pub struct PendingGenerator;

#[async_trait]
impl ContentGenerator for PendingGenerator {
    async fn generate(&self, _request: &GenerateRequest) -> Result<ContentValue, GenerateError> {
        std::future::pending().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let request = GenerateRequest::new(ContentKind::Text, "write a post", "standard")
            .with_param("temperature", serde_json::json!(0.2));

        assert_eq!(request.prompt, "write a post");
        assert_eq!(
            request.params.get("temperature"),
            Some(&serde_json::json!(0.2))
        );
    }

    #[tokio::test]
    async fn template_backend_renders_text() {
        let backend = TemplateBackend;
        let request = GenerateRequest::new(ContentKind::Text, "release day!", "standard");

        let content = backend.generate(&request).await.unwrap();
        assert_eq!(content, ContentValue::Text("release day!".to_string()));
    }

    #[tokio::test]
    async fn template_backend_rejects_images() {
        let backend = TemplateBackend;
        let request = GenerateRequest::new(ContentKind::Image, "header", "image-v1");

        let result = backend.generate(&request).await;
        assert!(matches!(result, Err(GenerateError::Rejected { .. })));
    }

    #[tokio::test]
    async fn failing_generator_fails() {
        let backend = FailingGenerator::new("backend down");
        let request = GenerateRequest::new(ContentKind::Text, "p", "m");

        let result = backend.generate(&request).await;
        assert!(matches!(result, Err(GenerateError::Unavailable { .. })));
    }

    #[test]
    fn request_serde_roundtrip() {
        let request = GenerateRequest::new(ContentKind::Image, "art", "image-v1");
        let json = serde_json::to_string(&request).expect("serialize");
        let parsed: GenerateRequest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.kind, ContentKind::Image);
        assert_eq!(parsed.prompt, "art");
    }
}
