//! Prompt construction for SQL generation and result summarization.

use crate::llm::types::Message;

/// Reply prefix the model must use when it cannot produce a statement.
pub const UNABLE_SENTINEL: &str = "UNABLE_TO_GENERATE_SQL";

/// Strict system instruction for SQL generation.
///
/// The model gets exactly one job: a single fenced SELECT, or the
/// sentinel naming the missing field. Anything else is treated as a
/// generation failure downstream.
const SQL_SYSTEM_PROMPT: &str = "You are a strict SQL generator for SQL Server. \
OUTPUT ONLY the SQL SELECT statement in a single triple-backtick code block labeled sql (```sql ... ```). \
Do not output any explanatory text, JSON, or prose. \
Use only tables/columns from the provided schema. \
If you cannot produce a valid SELECT because fields are missing, return exactly: \
UNABLE_TO_GENERATE_SQL: missing <table.field> .";

/// Worked examples shipped with the binary, used when no examples file
/// is configured. Kept short so the schema block stays the bulk of the
/// prompt.
pub const DEFAULT_SQL_EXAMPLES: &str = "\
-- How many workflow instances are currently open?
SELECT COUNT(*) FROM dbo.wp_instance WHERE status = 'open'

-- Workitems per participant, busiest first
SELECT p.participant_name, COUNT(*) AS workitems
FROM dbo.wp_workitem w
JOIN dbo.wp_participant p ON p.participant_id = w.participant_id
GROUP BY p.participant_name
ORDER BY workitems DESC

-- Ten most recent transitions
SELECT TOP 10 * FROM dbo.wp_transition_history ORDER BY transition_date DESC";

/// System instruction for the result summarizer.
const SUMMARY_SYSTEM_PROMPT: &str = "You are an expert report writer for workflow data. \
Generate a concise executive summary (4-8 sentences), followed by 3 bullet insights. \
Be factual, include provenance tokens for key facts if available, and avoid hallucination.";

/// Builds the message list for a SQL generation request.
///
/// The system message carries the strict instruction plus the schema and
/// worked examples; the user message carries the question and, on a
/// retry, the feedback from the prior failed attempt.
pub fn build_generation_messages(
    schema_text: &str,
    examples: &str,
    question: &str,
    feedback: Option<&str>,
) -> Vec<Message> {
    let schema_block = if schema_text.is_empty() {
        "NO SCHEMA PROVIDED"
    } else {
        schema_text
    };
    let examples_block = if examples.is_empty() {
        "NO EXAMPLES PROVIDED"
    } else {
        examples
    };

    let system = format!(
        "{SQL_SYSTEM_PROMPT}\n\nSchema (table -> columns):\n{schema_block}\n\nSQL examples:\n{examples_block}"
    );

    let mut user = format!("User natural-language request (generate SQL only): {question}");
    if let Some(fb) = feedback {
        user.push_str(&format!("\n\nPrevious attempt feedback: {fb}"));
    }

    vec![Message::system(system), Message::user(user)]
}

/// Builds the message list for a summarization request.
///
/// `stats` and `sample` arrive pre-serialized so the payload stays small
/// and deterministic regardless of result-set size.
pub fn build_summary_messages(question: &str, stats: &str, sample: &str) -> Vec<Message> {
    let user = format!(
        "Original user request: {question}\n\nStats: {stats}\n\nSample rows (up to 6): {sample}\n\n\
         Provide a concise executive summary (4-8 sentences) and 3 bullet-point insights (if any)."
    );

    vec![Message::system(SUMMARY_SYSTEM_PROMPT), Message::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::Role;

    #[test]
    fn test_generation_messages_structure() {
        let messages =
            build_generation_messages("dbo.wp_instance: id(int)", "SELECT 1", "How many?", None);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);

        assert!(messages[0].content.contains("strict SQL generator"));
        assert!(messages[0].content.contains("Schema (table -> columns):"));
        assert!(messages[0].content.contains("dbo.wp_instance: id(int)"));
        assert!(messages[0].content.contains("SQL examples:"));
        assert!(messages[0].content.contains(UNABLE_SENTINEL));

        assert!(messages[1]
            .content
            .starts_with("User natural-language request (generate SQL only): How many?"));
        assert!(!messages[1].content.contains("Previous attempt feedback"));
    }

    #[test]
    fn test_generation_messages_with_feedback() {
        let messages = build_generation_messages(
            "schema",
            "examples",
            "How many?",
            Some("Validation failed: Only SELECT queries are allowed."),
        );

        assert!(messages[1]
            .content
            .contains("Previous attempt feedback: Validation failed"));
    }

    #[test]
    fn test_generation_messages_empty_blocks() {
        let messages = build_generation_messages("", "", "q", None);
        assert!(messages[0].content.contains("NO SCHEMA PROVIDED"));
        assert!(messages[0].content.contains("NO EXAMPLES PROVIDED"));
    }

    #[test]
    fn test_summary_messages_structure() {
        let messages = build_summary_messages(
            "How many open?",
            r#"{"rows_returned":3}"#,
            r#"[{"n":3}]"#,
        );

        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("executive summary"));
        assert!(messages[1].content.contains("Original user request: How many open?"));
        assert!(messages[1].content.contains(r#"Stats: {"rows_returned":3}"#));
        assert!(messages[1].content.contains(r#"Sample rows (up to 6): [{"n":3}]"#));
    }
}
