use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::schema::StructuredOutput;

// =============================================================================
// Generation Request
// =============================================================================

/// Backend-neutral request for one completion.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub enable_search: bool,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// Ask the backend to ground the answer with web search, where supported.
    pub fn enable_search(mut self) -> Self {
        self.enable_search = true;
        self
    }
}

// =============================================================================
// TextGenerator Trait
// =============================================================================

/// Object-safe interface over a text generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Free-form text generation.
    async fn generate(&self, request: GenerationRequest) -> Result<String>;

    /// JSON generation constrained by `schema`. Backends without native
    /// schema enforcement return best-effort JSON; callers validate on decode.
    async fn generate_json(
        &self,
        request: GenerationRequest,
        schema: serde_json::Value,
    ) -> Result<serde_json::Value>;

    /// Short backend label for logs.
    fn name(&self) -> &str;
}

// =============================================================================
// Structured helper
// =============================================================================

/// Generate and decode a typed value in one step.
pub async fn generate_structured<T: StructuredOutput>(
    generator: &dyn TextGenerator,
    request: GenerationRequest,
) -> Result<T> {
    let schema = T::response_schema();
    let value = generator.generate_json(request, schema).await?;
    serde_json::from_value(value).map_err(|e| anyhow!("Failed to deserialize response: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("summarize this")
            .system("You are terse.")
            .temperature(0.2)
            .max_output_tokens(512)
            .enable_search();

        assert_eq!(request.prompt, "summarize this");
        assert_eq!(request.system.as_deref(), Some("You are terse."));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_output_tokens, Some(512));
        assert!(request.enable_search);
    }

    #[test]
    fn test_request_defaults() {
        let request = GenerationRequest::new("hi");
        assert!(request.system.is_none());
        assert!(request.temperature.is_none());
        assert!(!request.enable_search);
    }
}
