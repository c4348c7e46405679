//! Executive summaries for result sets.
//!
//! Summarization is best-effort. A failed endpoint call degrades to a
//! fixed placeholder and never fails the run that produced the rows.

use std::sync::Arc;

use tracing::warn;

use crate::db::QueryResult;
use crate::llm::prompt::build_summary_messages;
use crate::llm::types::CompletionRequest;
use crate::llm::CompletionClient;

/// Placeholder returned when the summary call fails.
pub const SUMMARY_PLACEHOLDER: &str = "Failed to generate summary due to LLM error.";

const SUMMARY_MAX_TOKENS: u32 = 400;
const SAMPLE_ROWS: usize = 6;

/// Writes a short narrative for a completed query.
pub struct Summarizer {
    client: Arc<dyn CompletionClient>,
}

impl Summarizer {
    /// Creates a summarizer bound to a completion client.
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Summarizes the result set for the original question.
    pub async fn summarize(&self, question: &str, result: &QueryResult) -> String {
        let exec_time_secs = (result.execution_time.as_secs_f64() * 1000.0).round() / 1000.0;
        let stats = serde_json::json!({
            "rows_returned": result.row_count,
            "exec_time_secs": exec_time_secs,
        });
        let sample = serde_json::Value::Array(result.sample_records(SAMPLE_ROWS));

        let messages = build_summary_messages(question, &stats.to_string(), &sample.to_string());
        let request = CompletionRequest::new(messages).with_max_tokens(SUMMARY_MAX_TOKENS);

        match self.client.complete(&request).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Summarization failed, falling back to placeholder");
                SUMMARY_PLACEHOLDER.to_string()
            }
        }
    }
}
