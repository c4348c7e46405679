//! Completion endpoint integration for Quest.
//!
//! Provides the trait and provider implementations used by the SQL
//! generator and the summarizer. Every call is single-shot; retry policy
//! lives in the pipeline, not here.

pub mod anthropic;
pub mod factory;
pub mod generator;
pub mod mock;
pub mod openai;
pub mod prompt;
pub mod summarize;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use factory::create_client;
pub use generator::{GenerationError, SqlGenerator};
pub use mock::MockCompletionClient;
pub use openai::{OpenAiClient, OpenAiConfig};
pub use summarize::Summarizer;
pub use types::{CompletionRequest, Message, Role};

use async_trait::async_trait;
use std::str::FromStr;

use crate::error::Result;

/// Trait for completion clients.
///
/// Implementations must be thread-safe (Send + Sync) so concurrent runs
/// can share one client.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends a single completion request and returns the full response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Cheap reachability check against the provider.
    async fn ping(&self) -> Result<()>;
}

/// Completion provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    /// OpenAI (GPT-4o, etc.)
    #[default]
    OpenAi,
    /// Anthropic (Claude)
    Anthropic,
    /// Mock client for testing (no API key required)
    Mock,
}

impl LlmProvider {
    /// Returns the provider as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_str() {
        assert_eq!(
            "openai".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenAi
        );
        assert_eq!(
            "OpenAI".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenAi
        );
        assert_eq!(
            "anthropic".parse::<LlmProvider>().unwrap(),
            LlmProvider::Anthropic
        );
        assert_eq!("mock".parse::<LlmProvider>().unwrap(), LlmProvider::Mock);
        assert!("unknown".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_provider_as_str() {
        assert_eq!(LlmProvider::OpenAi.as_str(), "openai");
        assert_eq!(LlmProvider::Anthropic.as_str(), "anthropic");
        assert_eq!(LlmProvider::Mock.as_str(), "mock");
    }

    #[test]
    fn test_provider_display() {
        assert_eq!(format!("{}", LlmProvider::Anthropic), "anthropic");
    }

    #[test]
    fn test_provider_default() {
        assert_eq!(LlmProvider::default(), LlmProvider::OpenAi);
    }

    #[tokio::test]
    async fn test_mock_client_implements_trait() {
        let client: Box<dyn CompletionClient> = Box::new(MockCompletionClient::new());
        let request = CompletionRequest::new(vec![Message::user("how many instances")]);
        let response = client.complete(&request).await.unwrap();
        assert!(response.contains("SELECT"));
    }
}
