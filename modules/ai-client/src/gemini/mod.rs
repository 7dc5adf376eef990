mod client;
pub(crate) mod types;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::traits::{GenerationRequest, TextGenerator};
use crate::util::strip_code_blocks;
use client::GeminiClient;
use types::{GenerateContentRequest, GenerationConfig};

// =============================================================================
// Gemini Backend
// =============================================================================

#[derive(Clone)]
pub struct Gemini {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
}

impl Gemini {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow!("GEMINI_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn client(&self) -> GeminiClient {
        let client = GeminiClient::new(&self.api_key);
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }

    fn build_request(
        request: &GenerationRequest,
        response_schema: Option<serde_json::Value>,
    ) -> GenerateContentRequest {
        let json_mode = response_schema.is_some();
        let mut wire = GenerateContentRequest::new(&request.prompt);
        if let Some(ref system) = request.system {
            wire = wire.system(system);
        }

        let config = GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
            response_mime_type: json_mode.then(|| "application/json".to_string()),
            response_schema,
        };
        wire = wire.config(config);

        // Search grounding and JSON mode are mutually exclusive upstream.
        if request.enable_search && !json_mode {
            wire = wire.with_search();
        }
        wire
    }
}

#[async_trait]
impl TextGenerator for Gemini {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let wire = Self::build_request(&request, None);
        let response = self.client().generate(&self.model, &wire).await?;
        response
            .text()
            .ok_or_else(|| anyhow!("No text in Gemini response"))
    }

    async fn generate_json(
        &self,
        request: GenerationRequest,
        schema: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let wire = Self::build_request(&request, Some(schema));
        let response = self.client().generate(&self.model, &wire).await?;
        let text = response
            .text()
            .ok_or_else(|| anyhow!("No JSON in Gemini response"))?;

        serde_json::from_str(strip_code_blocks(&text))
            .map_err(|e| anyhow!("Gemini returned invalid JSON: {}", e))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_new() {
        let ai = Gemini::new("test-key", "gemini-2.0-flash");
        assert_eq!(ai.model, "gemini-2.0-flash");
        assert_eq!(ai.name(), "gemini");
    }

    #[test]
    fn test_search_dropped_in_json_mode() {
        let request = GenerationRequest::new("classify").enable_search();
        let wire = Gemini::build_request(&request, Some(serde_json::json!({"type": "object"})));
        assert!(wire.tools.is_none());
        let config = wire.generation_config.unwrap();
        assert_eq!(config.response_mime_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn test_search_attached_in_text_mode() {
        let request = GenerationRequest::new("write").enable_search();
        let wire = Gemini::build_request(&request, None);
        assert!(wire.tools.is_some());
    }
}
