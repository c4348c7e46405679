//! Run records: the attempt trail and the terminal result.

use serde::Serialize;

use crate::classify::ErrorClass;
use crate::db::QueryResult;

/// One generate→validate→execute cycle within a run.
///
/// Appended to the trail exactly once, when its outcome is known, and
/// never touched again.
#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    /// 1-based attempt index.
    pub attempt: u32,

    /// Sanitized candidate statement. Absent when generation itself failed.
    pub sql: Option<String>,

    /// Why the attempt failed. Absent for the successful attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Classification of an execution error. Absent for other outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<ErrorClass>,
}

impl Attempt {
    /// The attempt never produced a statement.
    pub fn generation_failure(attempt: u32, error: impl Into<String>) -> Self {
        Self {
            attempt,
            sql: None,
            error: Some(error.into()),
            error_class: None,
        }
    }

    /// The candidate was rejected by the validator.
    pub fn rejected(attempt: u32, sql: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            attempt,
            sql: Some(sql.into()),
            error: Some(reason.into()),
            error_class: None,
        }
    }

    /// The candidate passed validation but failed in the store.
    pub fn execution_failure(
        attempt: u32,
        sql: impl Into<String>,
        error: impl Into<String>,
        class: ErrorClass,
    ) -> Self {
        Self {
            attempt,
            sql: Some(sql.into()),
            error: Some(error.into()),
            error_class: Some(class),
        }
    }

    /// The candidate ran to completion.
    pub fn succeeded(attempt: u32, sql: impl Into<String>) -> Self {
        Self {
            attempt,
            sql: Some(sql.into()),
            error: None,
            error_class: None,
        }
    }
}

/// Terminal value of a run. Constructed exactly once, at the point the
/// run reaches `Success` or `Failed`.
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    /// True when a statement executed and its rows came back.
    pub success: bool,

    /// The statement that was executed, on success.
    pub sql: Option<String>,

    /// Rows plus execution metadata, on success.
    pub result: Option<QueryResult>,

    /// Narrative summary of the rows, on success.
    pub summary: Option<String>,

    /// Every attempt of the run, in order.
    pub attempts: Vec<Attempt>,

    /// Terminal error, on failure.
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_serialization_skips_empty_outcome() {
        let attempt = Attempt::succeeded(1, "SELECT 1");
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["attempt"], 1);
        assert_eq!(json["sql"], "SELECT 1");
        assert!(json.get("error").is_none());
        assert!(json.get("error_class").is_none());
    }

    #[test]
    fn test_generation_failure_has_no_sql() {
        let attempt = Attempt::generation_failure(1, "LLM generation error: timed out");
        let json = serde_json::to_value(&attempt).unwrap();
        assert!(json["sql"].is_null());
        assert_eq!(json["error"], "LLM generation error: timed out");
    }

    #[test]
    fn test_execution_failure_carries_class() {
        let attempt =
            Attempt::execution_failure(2, "SELECT x FROM t", "Invalid column name 'x'", ErrorClass::Semantic);
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["error_class"], "semantic");
    }
}
