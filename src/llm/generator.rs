//! SQL generation against the completion endpoint.
//!
//! One call per candidate statement. Every failure mode is terminal for
//! the call and surfaces as a `GenerationError`; whether a fresh call is
//! made afterwards is the pipeline's decision.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::QuestError;
use crate::llm::prompt::{build_generation_messages, UNABLE_SENTINEL};
use crate::llm::types::CompletionRequest;
use crate::llm::CompletionClient;
use crate::sql::{extract_sql, sanitize_sql};

/// Second line of defense: the validator performs the authoritative check.
static MUTATING_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(INSERT|UPDATE|DELETE|DROP|ALTER|TRUNCATE|CREATE|EXEC|MERGE)\b").unwrap()
});

static READ_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^\s*(WITH\b.*\bSELECT|SELECT\b)").unwrap());

/// How a single generation call failed.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The endpoint call itself failed (network, auth, malformed response).
    #[error("{0}")]
    Endpoint(#[from] QuestError),

    /// The model answered with the explicit inability sentinel. Carries the
    /// full trimmed reply, which names the missing field.
    #[error("{0}")]
    Declined(String),

    /// No statement could be extracted from the response. Carries a
    /// flattened excerpt of the raw reply so feedback stays useful.
    #[error("No SQL found in LLM response; raw reply excerpt: {0}")]
    NoSql(String),

    /// The sanitized candidate contains a mutating keyword.
    #[error("Forbidden non-SELECT statement detected in SQL candidate.")]
    Forbidden,

    /// The sanitized candidate does not start with SELECT or a CTE.
    #[error("SQL candidate does not begin with SELECT/CTE.")]
    NotSelect,
}

/// Turns a natural-language question into a sanitized SELECT statement.
pub struct SqlGenerator {
    client: Arc<dyn CompletionClient>,
    schema_text: String,
    examples: String,
}

impl SqlGenerator {
    /// Creates a generator bound to a completion client, a rendered schema
    /// excerpt and a block of worked SQL examples.
    pub fn new(
        client: Arc<dyn CompletionClient>,
        schema_text: impl Into<String>,
        examples: impl Into<String>,
    ) -> Self {
        Self {
            client,
            schema_text: schema_text.into(),
            examples: examples.into(),
        }
    }

    /// Generates a sanitized SQL candidate for the question.
    ///
    /// `feedback` carries the reason the previous attempt failed, if any,
    /// and is appended to the user message verbatim.
    pub async fn generate(
        &self,
        question: &str,
        feedback: Option<&str>,
    ) -> std::result::Result<String, GenerationError> {
        let messages =
            build_generation_messages(&self.schema_text, &self.examples, question, feedback);
        let request = CompletionRequest::new(messages);

        info!(retry = feedback.is_some(), "Requesting SQL from LLM");
        let content = self.client.complete(&request).await?;
        debug!(chars = content.len(), "Raw LLM response received");

        if content.trim().to_uppercase().starts_with(UNABLE_SENTINEL) {
            return Err(GenerationError::Declined(content.trim().to_string()));
        }

        let candidate = extract_sql(&content);
        if candidate.is_empty() {
            let excerpt: String = content.chars().take(500).collect();
            return Err(GenerationError::NoSql(excerpt.replace('\n', " ")));
        }

        let sanitized = sanitize_sql(&candidate);
        debug!(sql = %sanitized, "Sanitized SQL candidate");

        if MUTATING_KEYWORD_RE.is_match(&sanitized) {
            return Err(GenerationError::Forbidden);
        }

        if !READ_SHAPE_RE.is_match(&sanitized) {
            return Err(GenerationError::NotSelect);
        }

        Ok(sanitized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockCompletionClient;
    use pretty_assertions::assert_eq;

    fn generator(client: MockCompletionClient) -> SqlGenerator {
        SqlGenerator::new(
            Arc::new(client),
            "dbo.workflow_instances: instance_id(int), status(nvarchar)",
            "-- none",
        )
    }

    #[tokio::test]
    async fn test_generates_from_fenced_reply() {
        let client = MockCompletionClient::new()
            .with_reply("```sql\nSELECT TOP 10 * FROM dbo.workflow_instances\n```");
        let sql = generator(client).generate("latest runs", None).await.unwrap();
        assert_eq!(sql, "SELECT TOP 10 * FROM dbo.workflow_instances");
    }

    #[tokio::test]
    async fn test_limit_clause_rewritten() {
        let client = MockCompletionClient::new()
            .with_reply("```sql\nSELECT name FROM dbo.workflow_instances LIMIT 5\n```");
        let sql = generator(client).generate("five names", None).await.unwrap();
        assert_eq!(sql, "SELECT TOP 5 name FROM dbo.workflow_instances");
    }

    #[tokio::test]
    async fn test_sentinel_reply_is_declined() {
        let client = MockCompletionClient::new()
            .with_reply("UNABLE_TO_GENERATE_SQL: missing orders.revenue");
        let err = generator(client)
            .generate("total revenue", None)
            .await
            .unwrap_err();
        match err {
            GenerationError::Declined(reply) => {
                assert_eq!(reply, "UNABLE_TO_GENERATE_SQL: missing orders.revenue");
            }
            other => panic!("expected Declined, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_prose_reply_yields_no_sql() {
        let client =
            MockCompletionClient::new().with_reply("I am sorry, I cannot help\nwith that request.");
        let err = generator(client).generate("question", None).await.unwrap_err();
        match err {
            GenerationError::NoSql(excerpt) => {
                // Newlines flattened so the excerpt stays one line
                assert_eq!(excerpt, "I am sorry, I cannot help with that request.");
            }
            other => panic!("expected NoSql, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mutating_keyword_rejected() {
        let client = MockCompletionClient::new()
            .with_reply("SELECT * FROM dbo.workflow_instances; DELETE FROM dbo.workflow_instances");
        let err = generator(client).generate("question", None).await.unwrap_err();
        assert!(matches!(err, GenerationError::Forbidden));
        assert_eq!(
            err.to_string(),
            "Forbidden non-SELECT statement detected in SQL candidate."
        );
    }

    #[tokio::test]
    async fn test_non_select_shape_rejected() {
        let client = MockCompletionClient::new().with_reply("```sql\nSHOW TABLES\n```");
        let err = generator(client).generate("question", None).await.unwrap_err();
        assert!(matches!(err, GenerationError::NotSelect));
    }

    #[tokio::test]
    async fn test_endpoint_error_passes_through() {
        let client = MockCompletionClient::with_unreachable_endpoint();
        let err = generator(client).generate("question", None).await.unwrap_err();
        assert!(matches!(err, GenerationError::Endpoint(_)));
    }

    #[tokio::test]
    async fn test_feedback_reaches_the_prompt() {
        let client = MockCompletionClient::new().with_reply("SELECT 1 AS one");
        let client = Arc::new(client);
        let generator = SqlGenerator::new(Arc::clone(&client) as Arc<dyn CompletionClient>, "", "");

        generator
            .generate("count rows", Some("Validation failed: bad table."))
            .await
            .unwrap();

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains("count rows"));
        assert!(requests[0].contains("Previous attempt feedback: Validation failed: bad table."));
    }

    #[tokio::test]
    async fn test_cte_candidate_accepted() {
        let client = MockCompletionClient::new().with_reply(
            "```sql\nWITH recent AS (SELECT * FROM dbo.workflow_instances)\nSELECT COUNT(*) FROM recent\n```",
        );
        let sql = generator(client).generate("count recent", None).await.unwrap();
        assert!(sql.starts_with("WITH recent AS"));
    }
}
