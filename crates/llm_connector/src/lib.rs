// crates/llm_connector/src/lib.rs

use async_trait::async_trait;
use hisho_core::{HishoError, HishoResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub mod cache;
pub mod openai;
pub mod prompt_builder;

use cache::LlmCache;

pub use openai::OpenAiProvider;
pub use prompt_builder::PromptBuilder;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Completion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_ttl_s")]
    pub cache_ttl_s: u64,
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

const fn default_max_tokens() -> usize {
    200
}

const fn default_temperature() -> f32 {
    0.1
}

const fn default_timeout_s() -> u64 {
    10
}

const fn default_cache_enabled() -> bool {
    true
}

const fn default_cache_ttl_s() -> u64 {
    300
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_s: default_timeout_s(),
            cache_enabled: default_cache_enabled(),
            cache_ttl_s: default_cache_ttl_s(),
        }
    }
}

impl LlmConfig {
    pub fn completions_url(&self) -> String {
        let base = self
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{}/chat/completions", base)
    }
}

/// Anything that turns a chat request into text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> HishoResult<CompletionResponse>;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            max_tokens: None,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: Usage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LlmMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cache_hits: u64,
    pub total_tokens_used: usize,
    pub average_response_time_ms: f64,
}

/// Provider plus response cache and counters. Failures are returned once; there is no retry.
pub struct LlmConnector {
    config: LlmConfig,
    provider: Arc<dyn CompletionProvider>,
    cache: Option<LlmCache>,
    metrics: Arc<RwLock<LlmMetrics>>,
}

impl LlmConnector {
    pub fn new(config: LlmConfig, provider: Arc<dyn CompletionProvider>) -> Self {
        let cache = config
            .cache_enabled
            .then(|| LlmCache::new(config.cache_ttl_s));

        Self {
            config,
            provider,
            cache,
            metrics: Arc::new(RwLock::new(LlmMetrics::default())),
        }
    }

    /// Connector backed by an OpenAI-compatible endpoint with the given key.
    pub fn openai(config: LlmConfig, api_key: impl Into<String>) -> HishoResult<Self> {
        let provider = OpenAiProvider::new(config.clone(), api_key)?;
        Ok(Self::new(config, Arc::new(provider)))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub async fn complete(&self, mut request: CompletionRequest) -> HishoResult<CompletionResponse> {
        request.max_tokens.get_or_insert(self.config.max_tokens);
        request.temperature.get_or_insert(self.config.temperature);

        let cache_key = cache_key(&request);
        if let Some(cache) = &self.cache {
            if let Some(response) = cache.get(&cache_key) {
                self.metrics.write().cache_hits += 1;
                debug!("LLM cache hit");
                return Ok(response);
            }
        }

        let start = Instant::now();
        self.metrics.write().total_requests += 1;

        match self.provider.complete(request).await {
            Ok(response) => {
                let elapsed_ms = start.elapsed().as_millis() as f64;
                {
                    let mut metrics = self.metrics.write();
                    metrics.successful_requests += 1;
                    metrics.total_tokens_used += response.usage.total_tokens;
                    metrics.average_response_time_ms = (metrics.average_response_time_ms
                        * (metrics.successful_requests - 1) as f64
                        + elapsed_ms)
                        / metrics.successful_requests as f64;
                }

                if let Some(cache) = &self.cache {
                    cache.set(cache_key, response.clone());
                }
                Ok(response)
            }
            Err(err) => {
                self.metrics.write().failed_requests += 1;
                warn!(provider = self.provider.name(), error = %err, "Completion request failed");
                Err(err)
            }
        }
    }

    pub fn metrics(&self) -> LlmMetrics {
        self.metrics.read().clone()
    }

    pub fn clear_expired(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_expired();
        }
    }
}

fn cache_key(request: &CompletionRequest) -> String {
    let mut hasher = DefaultHasher::new();
    for message in &request.messages {
        message.content.hash(&mut hasher);
    }
    request.max_tokens.hash(&mut hasher);
    request.temperature.map(f32::to_bits).hash(&mut hasher);
    format!("llm:{}", hasher.finish())
}

/// Pulls the first choice's message text out of a chat-completions reply.
pub fn extract_message_content(json: &serde_json::Value) -> HishoResult<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| HishoError::Nlu("Completion reply has no message content".to_string()))
}
