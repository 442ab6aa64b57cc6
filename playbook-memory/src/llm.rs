//! LLM access for reflection
//!
//! [`LlmClient`] is the seam the reflective extractor talks through;
//! [`AnthropicClient`] implements it over the Anthropic Messages API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::ExtractorConfig;
use crate::error::{Error, Result};

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Output tokens reserved for the visible reply, on top of any thinking budget
const REPLY_TOKENS: u32 = 8192;

/// A single-turn completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmRequest {
    /// User prompt for this turn
    pub prompt: String,

    /// Optional system preamble, sent as a cacheable block
    pub system: Option<String>,

    /// Extended-thinking budget in tokens, 0 disables thinking
    pub thinking_budget: u32,
}

impl LlmRequest {
    /// Create a request with no system preamble and thinking disabled
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            thinking_budget: 0,
        }
    }

    /// Attach a system preamble
    pub fn with_system(mut self, system: Option<String>) -> Self {
        self.system = system;
        self
    }

    /// Set the thinking budget
    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = budget;
        self
    }
}

/// A language model that turns a prompt into reply text
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one request and return the model's text reply
    async fn complete(&self, request: &LlmRequest) -> Result<String>;
}

/// Client for the Anthropic Messages API
pub struct AnthropicClient {
    api_key: String,
    model: String,
    endpoint: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    /// Create a client from extractor settings; fails when no credential is configured
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::config("no API key configured for reflection"))?;

        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            api_key,
            model: config.model.clone(),
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            client,
        })
    }

    /// Get the messages endpoint this client posts to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the JSON request body
    fn build_request_body(&self, request: &LlmRequest) -> Value {
        let max_tokens = REPLY_TOKENS.saturating_add(request.thinking_budget);
        let mut body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [{
                "role": "user",
                "content": request.prompt,
            }],
        });

        if let Some(system) = &request.system {
            body["system"] = json!([{
                "type": "text",
                "text": system,
                "cache_control": { "type": "ephemeral" }
            }]);
        }

        if request.thinking_budget > 0 {
            body["thinking"] = json!({
                "type": "enabled",
                "budget_tokens": request.thinking_budget
            });
        }

        body
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &LlmRequest) -> Result<String> {
        let body = self.build_request_body(request);

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let body_text = response.text().await?;

        if !status.is_success() {
            return Err(Error::api(status.as_u16(), body_text));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body_text)?;
        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                "Reflection call used {} input / {} output tokens ({} cached)",
                usage.input_tokens,
                usage.output_tokens,
                usage.cache_read_input_tokens.unwrap_or(0)
            );
        }
        Ok(parsed.text())
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

impl MessagesResponse {
    /// Concatenate the text blocks, ignoring thinking and other block types
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
    #[serde(default)]
    cache_read_input_tokens: Option<u32>,
}
