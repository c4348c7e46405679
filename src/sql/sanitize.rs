//! Canonicalizes an extracted SQL candidate.

use once_cell::sync::Lazy;
use regex::Regex;

static TRAILING_LIMIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)LIMIT\s+(\d+)\s*$").unwrap());

static LEADING_SELECT_TOP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*SELECT\s+TOP\b").unwrap());

static LEADING_SELECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*SELECT\s+").unwrap());

static LIMIT_TAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+LIMIT\s+\d+\s*$").unwrap());

static INTRA_WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

/// Normalizes a SQL candidate into its canonical form.
///
/// Steps, in order: strip fence artifacts still present, normalize line
/// endings, drop trailing semicolons, collapse intra-line whitespace and
/// blank lines, and rewrite a trailing `LIMIT n` into a leading `TOP n`
/// (the statement targets SQL Server, which has no LIMIT clause).
///
/// Pure text transform. The result is stable: sanitizing twice yields the
/// same string as sanitizing once.
pub fn sanitize_sql(sql: &str) -> String {
    if sql.is_empty() {
        return String::new();
    }

    let mut s = sql.trim().to_string();

    // Strip a code fence that survived extraction
    if s.starts_with("```") && s.ends_with("```") {
        let parts: Vec<&str> = s.lines().collect();
        if parts.len() >= 3 {
            s = parts[1..parts.len() - 1].join("\n");
        } else {
            s = s.trim_matches('`').to_string();
        }
    }
    let s = s
        .trim_matches(|c: char| matches!(c, '`' | ' ' | '\n' | '\r' | '\t'))
        .to_string();

    let s = s.replace("\r\n", "\n").replace('\r', "\n");
    let s = s.trim_end().trim_end_matches(';');

    let mut s = s
        .lines()
        .filter(|ln| !ln.trim().is_empty())
        .map(|ln| INTRA_WS_RE.replace_all(ln, " ").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n");

    // Rewrite trailing LIMIT n as TOP n unless a row cap is already there
    if let Some(caps) = TRAILING_LIMIT_RE.captures(&s) {
        if !LEADING_SELECT_TOP_RE.is_match(&s) {
            if let Ok(limit_n) = caps[1].parse::<u64>() {
                let with_top = LEADING_SELECT_RE
                    .replace(&s, format!("SELECT TOP {limit_n} "))
                    .into_owned();
                s = LIMIT_TAIL_RE.replace(&with_top, "").into_owned();
            }
        }
    }

    s.trim().to_string()
}

/// Caps the number of rows a statement may return.
///
/// Inserts `TOP limit` right after the leading `SELECT` unless the
/// statement already opens with `SELECT TOP`. Statements that start with
/// a CTE are returned unchanged; rewriting inside a `WITH` chain is not
/// worth the risk of producing invalid SQL.
pub fn apply_row_cap(sql: &str, limit: u32) -> String {
    if LEADING_SELECT_TOP_RE.is_match(sql) || !LEADING_SELECT_RE.is_match(sql) {
        return sql.to_string();
    }
    LEADING_SELECT_RE
        .replace(sql, format!("SELECT TOP {limit} "))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_limit_becomes_top() {
        assert_eq!(
            sanitize_sql("SELECT * FROM wp_instance LIMIT 50"),
            "SELECT TOP 50 * FROM wp_instance"
        );
    }

    #[test]
    fn test_limit_case_insensitive() {
        assert_eq!(
            sanitize_sql("select name from portal_user limit 10"),
            "SELECT TOP 10 name from portal_user"
        );
    }

    #[test]
    fn test_existing_top_left_alone() {
        assert_eq!(
            sanitize_sql("SELECT TOP 5 * FROM wp_package"),
            "SELECT TOP 5 * FROM wp_package"
        );
    }

    #[test]
    fn test_cte_trailing_limit_removed_without_top() {
        // A CTE has no leading SELECT to attach TOP to; the LIMIT is dropped
        let sql = "WITH recent AS (SELECT * FROM wp_transition)\nSELECT * FROM recent LIMIT 5";
        assert_eq!(
            sanitize_sql(sql),
            "WITH recent AS (SELECT * FROM wp_transition)\nSELECT * FROM recent"
        );
    }

    #[test]
    fn test_strips_trailing_semicolons() {
        assert_eq!(sanitize_sql("SELECT 1;;;"), "SELECT 1");
    }

    #[test]
    fn test_strips_leftover_fence() {
        assert_eq!(
            sanitize_sql("```sql\nSELECT status FROM wp_instance\n```"),
            "SELECT status FROM wp_instance"
        );
    }

    #[test]
    fn test_normalizes_crlf() {
        assert_eq!(
            sanitize_sql("SELECT status\r\nFROM wp_instance\r\n"),
            "SELECT status\nFROM wp_instance"
        );
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(
            sanitize_sql("SELECT   a,\tb\n\n\nFROM   t"),
            "SELECT a, b\nFROM t"
        );
    }

    #[test]
    fn test_empty_input_unchanged() {
        assert_eq!(sanitize_sql(""), "");
    }

    #[test]
    fn test_row_cap_inserted_after_select() {
        assert_eq!(
            apply_row_cap("SELECT name FROM wp_instance", 200),
            "SELECT TOP 200 name FROM wp_instance"
        );
    }

    #[test]
    fn test_row_cap_respects_existing_top() {
        assert_eq!(
            apply_row_cap("SELECT TOP 5 name FROM wp_instance", 200),
            "SELECT TOP 5 name FROM wp_instance"
        );
    }

    #[test]
    fn test_row_cap_leaves_cte_alone() {
        let sql = "WITH c AS (SELECT 1 AS n) SELECT n FROM c";
        assert_eq!(apply_row_cap(sql, 200), sql);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inputs = [
            "SELECT * FROM wp_instance LIMIT 50",
            "```sql\nSELECT a FROM t;\n```",
            "select name   from portal_user\r\nwhere active = 1;",
            "WITH c AS (SELECT 1 AS n) SELECT n FROM c LIMIT 3",
        ];
        for input in inputs {
            let once = sanitize_sql(input);
            assert_eq!(sanitize_sql(&once), once, "not stable for {input:?}");
        }
    }
}
