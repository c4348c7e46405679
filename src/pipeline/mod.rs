//! The question-to-answer pipeline.
//!
//! Drives one question through generate → validate → execute →
//! summarize with a bounded feedback-retry loop. Transitions:
//! a generation failure ends the run at once; a validation rejection
//! feeds the reason back into the next generation; an execution failure
//! is classified first: transient faults pause and retry the same
//! question without feedback, auth faults end the run, everything else
//! feeds the raw error back. Exhausting the budget ends the run. Every
//! terminal state appends one audit record.

mod types;

pub use types::{Attempt, PipelineResult};

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::audit::{AuditLog, AuditRecord};
use crate::catalog::AllowedTables;
use crate::classify::{classify, ErrorClass};
use crate::config::PipelineConfig;
use crate::db::{QueryResult, StoreClient};
use crate::llm::{SqlGenerator, Summarizer};
use crate::sql::{apply_row_cap, validate_sql};

/// Orchestrates a run per question. Shared read-only across concurrent
/// runs; every run keeps its own attempt trail and feedback.
pub struct Pipeline {
    generator: SqlGenerator,
    summarizer: Summarizer,
    store: Arc<dyn StoreClient>,
    allowed: AllowedTables,
    audit: AuditLog,
    config: PipelineConfig,
}

impl Pipeline {
    /// Wires the pipeline together. The allow-list must not be empty;
    /// catalog loading enforces that before this point.
    pub fn new(
        generator: SqlGenerator,
        summarizer: Summarizer,
        store: Arc<dyn StoreClient>,
        allowed: AllowedTables,
        audit: AuditLog,
        config: PipelineConfig,
    ) -> Self {
        Self {
            generator,
            summarizer,
            store,
            allowed,
            audit,
            config,
        }
    }

    /// Runs the full pipeline for one question.
    ///
    /// Total attempts are bounded by `max_retries + 1`. The returned
    /// result carries the complete attempt trail either way.
    pub async fn run(&self, question: &str) -> PipelineResult {
        let mut attempts: Vec<Attempt> = Vec::new();
        let mut feedback: Option<String> = None;

        info!(
            max_retries = self.config.max_retries,
            "Starting pipeline run"
        );

        for attempt in 0..=self.config.max_retries {
            let index = attempt + 1;

            let sql = match self.generator.generate(question, feedback.as_deref()).await {
                Ok(sql) => sql,
                Err(e) => {
                    let error = format!("LLM generation error: {e}");
                    error!(attempt = index, %error, "Generation failed, ending run");
                    attempts.push(Attempt::generation_failure(index, &error));
                    return self.finish_failed(question, attempts, error);
                }
            };

            if let Err(reason) = validate_sql(&sql, &self.allowed) {
                warn!(attempt = index, %reason, sql = %sql, "SQL validation failed");
                feedback = Some(format!(
                    "Validation failed: {reason}. Regenerate a correct SELECT using the schema and examples. Return SQL only."
                ));
                attempts.push(Attempt::rejected(index, sql, reason));
                continue;
            }

            let statement = match self.config.row_limit {
                Some(limit) => apply_row_cap(&sql, limit),
                None => sql.clone(),
            };

            match self.store.execute_query(&statement).await {
                Ok(result) => {
                    info!(
                        attempt = index,
                        rows = result.row_count,
                        elapsed_ms = result.execution_time.as_millis() as u64,
                        "Query executed"
                    );
                    attempts.push(Attempt::succeeded(index, &sql));
                    let summary = self.summarizer.summarize(question, &result).await;
                    return self.finish_success(question, attempts, statement, result, summary);
                }
                Err(e) => {
                    let error_text = e.to_string();
                    let class = classify(&error_text);
                    warn!(
                        attempt = index,
                        class = class.as_str(),
                        error = %error_text,
                        sql = %statement,
                        "SQL execution failed"
                    );
                    attempts.push(Attempt::execution_failure(index, &sql, &error_text, class));

                    match class {
                        ErrorClass::Transient => {
                            // The statement itself may be fine; wait and
                            // retry the same question without feedback.
                            let delay = self.config.backoff_base_ms * u64::from(index);
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                            feedback = None;
                        }
                        ErrorClass::Auth => {
                            // Credentials cannot be repaired by
                            // regenerating the statement.
                            error!(attempt = index, "Authentication failure, ending run");
                            return self.finish_failed(question, attempts, error_text);
                        }
                        ErrorClass::Semantic | ErrorClass::Unknown => {
                            feedback = Some(format!(
                                "Execution failed with error: {error_text}. Please regenerate SQL avoiding the error (likely column/table issue)."
                            ));
                        }
                    }
                }
            }
        }

        warn!(attempts = attempts.len(), "All retries exhausted");
        self.finish_failed(question, attempts, "Failed after retries")
    }

    fn finish_success(
        &self,
        question: &str,
        attempts: Vec<Attempt>,
        sql: String,
        result: QueryResult,
        summary: String,
    ) -> PipelineResult {
        let exec_time_secs = (result.execution_time.as_secs_f64() * 1000.0).round() / 1000.0;

        let mut record = AuditRecord::new(question);
        record.sanitized_sql = Some(sql.clone());
        record.rows = Some(result.row_count as u64);
        record.exec_time_secs = Some(exec_time_secs);
        record.attempts = attempts.clone();
        self.append_audit(&record);

        PipelineResult {
            success: true,
            sql: Some(sql),
            result: Some(result),
            summary: Some(summary),
            attempts,
            error: None,
        }
    }

    fn finish_failed(
        &self,
        question: &str,
        attempts: Vec<Attempt>,
        error: impl Into<String>,
    ) -> PipelineResult {
        let error = error.into();

        let mut record = AuditRecord::new(question);
        record.sanitized_sql = attempts.last().and_then(|a| a.sql.clone());
        record.error = Some(error.clone());
        record.attempts = attempts.clone();
        self.append_audit(&record);

        PipelineResult {
            success: false,
            sql: None,
            result: None,
            summary: None,
            attempts,
            error: Some(error),
        }
    }

    fn append_audit(&self, record: &AuditRecord) {
        if let Err(e) = self.audit.append(record) {
            error!(error = %e, "Failed to write audit record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockStoreClient;
    use crate::llm::{CompletionClient, MockCompletionClient, SqlGenerator, Summarizer};
    use tempfile::TempDir;

    fn test_pipeline(
        llm: MockCompletionClient,
        store: MockStoreClient,
        config: PipelineConfig,
        dir: &TempDir,
    ) -> (Pipeline, Arc<MockStoreClient>) {
        let llm: Arc<dyn CompletionClient> = Arc::new(llm);
        let store = Arc::new(store);
        let pipeline = Pipeline::new(
            SqlGenerator::new(Arc::clone(&llm), "dbo.workflow_instances: instance_id(int)", ""),
            Summarizer::new(llm),
            Arc::clone(&store) as Arc<dyn StoreClient>,
            AllowedTables::from_names(["dbo.workflow_instances"]),
            AuditLog::new(dir.path().join("audit.jsonl")),
            config,
        );
        (pipeline, store)
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            max_retries: 2,
            backoff_base_ms: 1,
            row_limit: None,
        }
    }

    #[tokio::test]
    async fn test_single_attempt_success() {
        let dir = TempDir::new().unwrap();
        let llm = MockCompletionClient::new()
            .with_reply("```sql\nSELECT * FROM dbo.workflow_instances\n```")
            .with_reply("All instances are healthy.");
        let (pipeline, store) = test_pipeline(llm, MockStoreClient::new(), fast_config(), &dir);

        let result = pipeline.run("show everything").await;

        assert!(result.success);
        assert_eq!(result.sql.as_deref(), Some("SELECT * FROM dbo.workflow_instances"));
        assert_eq!(result.summary.as_deref(), Some("All instances are healthy."));
        assert_eq!(result.attempts.len(), 1);
        assert!(result.attempts[0].error.is_none());
        assert_eq!(store.executed(), vec!["SELECT * FROM dbo.workflow_instances"]);
    }

    #[tokio::test]
    async fn test_row_cap_applied_to_executed_statement() {
        let dir = TempDir::new().unwrap();
        let llm = MockCompletionClient::new()
            .with_reply("SELECT * FROM dbo.workflow_instances")
            .with_reply("summary");
        let config = PipelineConfig {
            row_limit: Some(100),
            ..fast_config()
        };
        let (pipeline, store) = test_pipeline(llm, MockStoreClient::new(), config, &dir);

        let result = pipeline.run("show everything").await;

        assert!(result.success);
        assert_eq!(
            store.executed(),
            vec!["SELECT TOP 100 * FROM dbo.workflow_instances"]
        );
        // The executed statement is the statement of record
        assert_eq!(
            result.sql.as_deref(),
            Some("SELECT TOP 100 * FROM dbo.workflow_instances")
        );
        // The attempt trail keeps the candidate as generated
        assert_eq!(
            result.attempts[0].sql.as_deref(),
            Some("SELECT * FROM dbo.workflow_instances")
        );
    }

    #[tokio::test]
    async fn test_validation_exhaustion_records_every_attempt() {
        let dir = TempDir::new().unwrap();
        // Every reply references a table outside the allow-list
        let llm = MockCompletionClient::new().with_response("", "SELECT * FROM dbo.secrets");
        let (pipeline, store) = test_pipeline(llm, MockStoreClient::new(), fast_config(), &dir);

        let result = pipeline.run("question").await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Failed after retries"));
        assert_eq!(result.attempts.len(), 3);
        for attempt in &result.attempts {
            let reason = attempt.error.as_deref().unwrap();
            assert!(reason.contains("non-allowed tables"), "got {reason}");
        }
        // Nothing invalid ever reached the store
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_ends_run_with_recorded_attempt() {
        let dir = TempDir::new().unwrap();
        let llm = MockCompletionClient::new().with_reply("UNABLE_TO_GENERATE_SQL: missing t.f .");
        let (pipeline, _) = test_pipeline(llm, MockStoreClient::new(), fast_config(), &dir);

        let result = pipeline.run("question").await;

        assert!(!result.success);
        assert_eq!(result.attempts.len(), 1);
        assert!(result.attempts[0].sql.is_none());
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .starts_with("LLM generation error: UNABLE_TO_GENERATE_SQL"));
    }

    #[tokio::test]
    async fn test_audit_record_written_on_success() {
        let dir = TempDir::new().unwrap();
        let llm = MockCompletionClient::new()
            .with_reply("SELECT * FROM dbo.workflow_instances")
            .with_reply("summary text");
        let (pipeline, _) = test_pipeline(llm, MockStoreClient::new(), fast_config(), &dir);

        pipeline.run("how are the workflows?").await;

        let content = std::fs::read_to_string(dir.path().join("audit.jsonl")).unwrap();
        let record: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(record["user_query"], "how are the workflows?");
        assert_eq!(record["sanitized_sql"], "SELECT * FROM dbo.workflow_instances");
        assert_eq!(record["rows"], 1);
        assert!(record["error"].is_null());
        assert_eq!(record["attempts"].as_array().unwrap().len(), 1);
    }
}
