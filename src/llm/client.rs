use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::GatewayError;
use crate::llm::SYSTEM_PROMPT;

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// The text-generation oracle: one rendered prompt in, raw response text out.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError>;
}

/// Configuration for the Anthropic API client
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key (from ANTHROPIC_API_KEY env var)
    pub api_key: String,
    /// Model to use (SURVEY_MODEL env var overrides the default)
    pub model: String,
    /// Temperature (0-1); drafting prose wants some variety
    pub temperature: f64,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// Upper bound on a single request
    pub timeout: Duration,
}

impl AnthropicConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set")?;
        let model = std::env::var("SURVEY_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self::new(api_key, model))
    }

    /// Create with custom settings
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            temperature: 0.7,
            max_tokens: 4096,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Anthropic API client
pub struct AnthropicClient {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send a message to Claude and get a response
    pub async fn send_message(&self, system: &str, user: &str) -> Result<String, GatewayError> {
        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
            system: Some(system.to_string()),
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                GatewayError::new(format!("Failed to send request to Anthropic API: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::with_status(
                format!("Anthropic API error: {} - {}", status, body),
                status.as_u16(),
            ));
        }

        let response: AnthropicResponse = response.json().await.map_err(|e| {
            GatewayError::new(format!("Failed to parse Anthropic API response: {e}"))
        })?;

        // Concatenate text blocks; the tagged payload may follow a preamble block
        let text: String = response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect();

        if text.is_empty() {
            return Err(GatewayError::new("No text content in response"));
        }
        Ok(text)
    }
}

#[async_trait]
impl ModelGateway for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        self.send_message(SYSTEM_PROMPT, prompt).await
    }
}

/// Caps the number of in-flight calls to the wrapped gateway
pub struct ThrottledGateway {
    inner: Arc<dyn ModelGateway>,
    permits: Arc<Semaphore>,
}

impl ThrottledGateway {
    pub fn new(inner: Arc<dyn ModelGateway>, max_in_flight: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }
}

#[async_trait]
impl ModelGateway for ThrottledGateway {
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GatewayError::new("gateway limiter closed"))?;
        self.inner.complete(prompt).await
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}
