// crates/llm_connector/src/openai.rs

use async_trait::async_trait;
use hisho_core::{HishoError, HishoResult};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::{
    extract_message_content, CompletionProvider, CompletionRequest, CompletionResponse, LlmConfig,
    Usage,
};

/// Chat-completions client for OpenAI and compatible endpoints.
pub struct OpenAiProvider {
    config: LlmConfig,
    client: Client,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(config: LlmConfig, api_key: impl Into<String>) -> HishoResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(HishoError::Config("Completion API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_s))
            .build()
            .map_err(|e| HishoError::Network(e.to_string()))?;

        Ok(Self {
            config,
            client,
            api_key,
        })
    }

    pub fn from_env(config: LlmConfig, api_key_env: &str) -> HishoResult<Self> {
        let api_key = std::env::var(api_key_env)
            .map_err(|_| HishoError::Config(format!("API key not found: {}", api_key_env)))?;
        Self::new(config, api_key)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, request: CompletionRequest) -> HishoResult<CompletionResponse> {
        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.config.model,
                "messages": request.messages,
                "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
                "temperature": request.temperature.unwrap_or(self.config.temperature),
            }))
            .send()
            .await
            .map_err(|e| HishoError::Network(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(HishoError::Network(format!("API error {}: {}", status, text)));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| HishoError::Nlu(format!("Failed to parse response: {}", e)))?;

        let content = extract_message_content(&json)?;
        let usage = Usage {
            prompt_tokens: json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as usize,
            completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as usize,
            total_tokens: json["usage"]["total_tokens"].as_u64().unwrap_or(0) as usize,
        };

        Ok(CompletionResponse { content, usage })
    }

    fn name(&self) -> &str {
        "OpenAI"
    }
}
