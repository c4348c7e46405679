//! Completion client factory.
//!
//! Centralizes provider-specific logic for creating completion clients.

use std::str::FromStr;

use crate::config::LlmConfig;
use crate::error::{QuestError, Result};
use crate::llm::{
    AnthropicClient, AnthropicConfig, CompletionClient, LlmProvider, MockCompletionClient,
    OpenAiClient, OpenAiConfig,
};

/// Creates a completion client from the `[llm]` config section.
///
/// The API key is resolved in order:
/// 1. `api_key` from the config
/// 2. Environment variable (`OPENAI_API_KEY` or `ANTHROPIC_API_KEY`)
///
/// The model is resolved in order:
/// 1. `model` from the config
/// 2. Environment variable (`OPENAI_MODEL` or `ANTHROPIC_MODEL`)
/// 3. Provider default ("gpt-4o" / "claude-sonnet-4-20250514")
///
/// A base URL override (`base_url` or `OPENAI_BASE_URL` /
/// `ANTHROPIC_BASE_URL`) points the client at a compatible gateway.
pub fn create_client(config: &LlmConfig) -> Result<Box<dyn CompletionClient>> {
    let provider = LlmProvider::from_str(&config.provider).map_err(QuestError::config)?;

    match provider {
        LlmProvider::OpenAi => {
            let key = config
                .api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .ok_or_else(|| {
                    QuestError::llm("No API key configured. Set OPENAI_API_KEY or [llm] api_key.")
                })?;
            let model = config
                .model
                .clone()
                .or_else(|| std::env::var("OPENAI_MODEL").ok())
                .unwrap_or_else(|| "gpt-4o".to_string());
            let mut api = OpenAiConfig::new(key, model).with_timeout(config.timeout_secs);
            if let Some(base) = config
                .base_url
                .clone()
                .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
            {
                api = api.with_base_url(base);
            }
            Ok(Box::new(OpenAiClient::new(api)?))
        }
        LlmProvider::Anthropic => {
            let key = config
                .api_key
                .clone()
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
                .ok_or_else(|| {
                    QuestError::llm(
                        "No API key configured. Set ANTHROPIC_API_KEY or [llm] api_key.",
                    )
                })?;
            let model = config
                .model
                .clone()
                .or_else(|| std::env::var("ANTHROPIC_MODEL").ok())
                .unwrap_or_else(|| "claude-sonnet-4-20250514".to_string());
            let mut api = AnthropicConfig::new(key, model).with_timeout(config.timeout_secs);
            if let Some(base) = config
                .base_url
                .clone()
                .or_else(|| std::env::var("ANTHROPIC_BASE_URL").ok())
            {
                api = api.with_base_url(base);
            }
            Ok(Box::new(AnthropicClient::new(api)?))
        }
        LlmProvider::Mock => Ok(Box::new(MockCompletionClient::new())),
    }
}
