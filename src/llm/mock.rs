//! Mock completion client for testing.
//!
//! Supports scripted reply sequences for retry scenarios, pattern-matched
//! canned responses, and error simulation.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{QuestError, Result};
use crate::llm::types::CompletionRequest;
use crate::llm::CompletionClient;

/// A mock completion client that returns canned responses.
pub struct MockCompletionClient {
    /// Scripted replies consumed in order. Takes priority over patterns.
    script: Mutex<VecDeque<Result<String>>>,
    /// Pattern-matched responses checked against the last user message.
    custom_responses: Vec<(String, String)>,
    /// Whether to simulate an unreachable endpoint.
    fail: bool,
    /// Records the last user message of every request received.
    requests: Mutex<Vec<String>>,
}

impl MockCompletionClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            custom_responses: Vec::new(),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Appends a scripted reply. Scripted replies are consumed in order
    /// before any pattern matching happens.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.script.lock().unwrap().push_back(Ok(reply.into()));
        self
    }

    /// Appends a scripted error.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(QuestError::llm(message)));
        self
    }

    /// Adds a custom response for prompts containing the given pattern.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Creates a mock client that simulates a connection error.
    pub fn with_unreachable_endpoint() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Returns the last user message of every request seen so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Generates a response based on the prompt content.
    fn mock_response(&self, prompt: &str) -> String {
        let prompt_lower = prompt.to_lowercase();

        // Check custom responses first
        for (pattern, response) in &self.custom_responses {
            if prompt_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        if prompt_lower.contains("count") {
            return "SELECT COUNT(*) AS total FROM dbo.workflow_instances".to_string();
        }

        if prompt_lower.contains("failed") {
            return "```sql\nSELECT TOP 50 instance_id, status, error_message FROM dbo.workflow_instances WHERE status = 'Failed' ORDER BY started_at DESC\n```"
                .to_string();
        }

        "SELECT TOP 100 * FROM dbo.workflow_instances ORDER BY started_at DESC".to_string()
    }
}

impl Default for MockCompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if self.fail {
            return Err(QuestError::llm(
                "Failed to connect to LLM endpoint. Check your network.",
            ));
        }

        let prompt = request.last_user_content().unwrap_or("").to_string();
        self.requests.lock().unwrap().push(prompt.clone());

        if let Some(scripted) = self.script.lock().unwrap().pop_front() {
            return scripted;
        }

        Ok(self.mock_response(&prompt))
    }

    async fn ping(&self) -> Result<()> {
        if self.fail {
            return Err(QuestError::llm(
                "Failed to connect to LLM endpoint. Check your network.",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::Message;

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest::new(vec![Message::user(text)])
    }

    #[tokio::test]
    async fn test_default_response() {
        let client = MockCompletionClient::new();
        let response = client
            .complete(&request("show me everything"))
            .await
            .unwrap();
        assert!(response.starts_with("SELECT"));
    }

    #[tokio::test]
    async fn test_count_response() {
        let client = MockCompletionClient::new();
        let response = client
            .complete(&request("how many workflows ran? count them"))
            .await
            .unwrap();
        assert!(response.contains("COUNT(*)"));
    }

    #[tokio::test]
    async fn test_custom_response() {
        let client = MockCompletionClient::new()
            .with_response("revenue", "SELECT SUM(amount) FROM dbo.orders");
        let response = client
            .complete(&request("what was the total revenue?"))
            .await
            .unwrap();
        assert_eq!(response, "SELECT SUM(amount) FROM dbo.orders");
    }

    #[tokio::test]
    async fn test_scripted_replies_consumed_in_order() {
        let client = MockCompletionClient::new()
            .with_reply("SELECT 1")
            .with_reply("SELECT 2");

        assert_eq!(client.complete(&request("a")).await.unwrap(), "SELECT 1");
        assert_eq!(client.complete(&request("b")).await.unwrap(), "SELECT 2");
        // Script exhausted, falls back to pattern matching
        let fallback = client.complete(&request("c")).await.unwrap();
        assert!(fallback.starts_with("SELECT"));
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let client = MockCompletionClient::new().with_failure("model overloaded");
        let error = client.complete(&request("q")).await.unwrap_err();
        assert!(error.to_string().contains("model overloaded"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let client = MockCompletionClient::with_unreachable_endpoint();
        assert!(client.complete(&request("hello")).await.is_err());
        assert!(client.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_requests_are_recorded() {
        let client = MockCompletionClient::new();
        client.complete(&request("first")).await.unwrap();
        client.complete(&request("second")).await.unwrap();
        assert_eq!(client.requests(), vec!["first", "second"]);
    }
}
