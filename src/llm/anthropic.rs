//! Anthropic completion client.
//!
//! Implements the CompletionClient trait for the Messages API. System
//! messages travel in the dedicated `system` field rather than the
//! message list.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{QuestError, Result};
use crate::llm::types::{CompletionRequest, Role};
use crate::llm::CompletionClient;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default Anthropic API base URL.
const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic client configuration.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use (e.g., "claude-sonnet-4-20250514").
    pub model: String,
    /// API base URL.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl AnthropicConfig {
    /// Creates a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: ANTHROPIC_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Sets the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Anthropic completion client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicClient {
    /// Creates a new Anthropic client with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QuestError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Creates a client from environment variables.
    ///
    /// Reads `ANTHROPIC_API_KEY` for the API key.
    /// Optionally reads `ANTHROPIC_MODEL` for the model (defaults to
    /// "claude-sonnet-4-20250514").
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| QuestError::llm("ANTHROPIC_API_KEY environment variable not set"))?;

        let model = std::env::var("ANTHROPIC_MODEL")
            .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());

        Self::new(AnthropicConfig::new(api_key, model))
    }

    /// Extracts the system message and converts the rest to API format.
    fn convert_request(&self, request: &CompletionRequest) -> AnthropicRequest {
        let mut system = None;
        let mut messages = Vec::new();

        for msg in &request.messages {
            match msg.role {
                Role::System => {
                    // Anthropic uses a separate system parameter
                    system = Some(msg.content.clone());
                }
                Role::User | Role::Assistant => {
                    messages.push(AnthropicMessage {
                        role: msg.role.as_str().to_string(),
                        content: msg.content.clone(),
                    });
                }
            }
        }

        AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system,
            messages,
        }
    }

    /// Parses an API error response.
    fn parse_error(status: reqwest::StatusCode, body: &str) -> QuestError {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return QuestError::llm("Authentication failed. Check your ANTHROPIC_API_KEY.");
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return QuestError::llm("Rate limited. Please wait and try again.");
        }

        // Try to parse error message from response
        if let Ok(error_response) = serde_json::from_str::<AnthropicErrorResponse>(body) {
            return QuestError::llm(format!(
                "Anthropic API error: {}",
                error_response.error.message
            ));
        }

        QuestError::llm(format!("Anthropic API error ({}): {}", status, body))
    }

    async fn send(&self, request: &AnthropicRequest) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QuestError::llm("Request timed out. Try again.")
                } else if e.is_connect() {
                    QuestError::llm("Failed to connect to Anthropic API. Check your network.")
                } else {
                    QuestError::llm(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QuestError::llm(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Self::parse_error(status, &body));
        }

        let response: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| QuestError::llm(format!("Failed to parse response: {}", e)))?;

        // Extract text from content blocks
        let text = response
            .content
            .into_iter()
            .filter_map(|block| {
                if block.content_type == "text" {
                    Some(block.text)
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(QuestError::llm("No response from Anthropic"));
        }

        Ok(text)
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let api_request = self.convert_request(request);
        debug!(model = %self.config.model, "Sending Anthropic completion request");
        self.send(&api_request).await
    }

    async fn ping(&self) -> Result<()> {
        // There is no free health endpoint; a one-token request is the
        // cheapest reachability check available.
        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: 1,
            temperature: 0.0,
            system: None,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: "ping".to_string(),
            }],
        };
        self.send(&request).await.map(|_| ())
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    message: String,
}
