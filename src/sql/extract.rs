//! Pulls a SQL candidate out of a free-text model reply.

use once_cell::sync::Lazy;
use regex::Regex;

/// Fenced code block, optionally tagged `sql`.
static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```(?:sql)?\s*([\s\S]*?)\s*```").unwrap());

/// Fallback: everything from the first `WITH ... SELECT` or bare `SELECT`.
static BARE_QUERY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)((?:WITH\b[\s\S]*?\bSELECT|SELECT)[\s\S]*)").unwrap());

/// Prose ahead of the first query keyword.
static LEADING_PROSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[\s\S]*?(SELECT|WITH\b)").unwrap());

static INTRA_WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

/// Extracts a SQL candidate from a model reply.
///
/// Prefers a triple-backtick fence; otherwise takes everything from the
/// first `SELECT` (or `WITH ... SELECT`) to the end of the text. Strips
/// surrounding prose, fence markers and trailing semicolons, collapses
/// intra-line whitespace and drops blank lines.
///
/// Returns an empty string when no candidate is found. The caller treats
/// that as a generation failure, not a validation failure.
pub fn extract_sql(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let candidate = if let Some(caps) = FENCE_RE.captures(text) {
        caps[1].trim().to_string()
    } else if let Some(caps) = BARE_QUERY_RE.captures(text) {
        caps[1].trim().to_string()
    } else {
        String::new()
    };

    if candidate.is_empty() {
        return String::new();
    }

    // Drop explanatory text ahead of the first SELECT / WITH
    let candidate = LEADING_PROSE_RE.replace(&candidate, "${1}").into_owned();

    let candidate = candidate
        .trim()
        .trim_matches(|c: char| matches!(c, '`' | ' ' | '\n' | '\r' | '\t'))
        .trim_end_matches(|c: char| matches!(c, ';' | ' ' | '\t' | '\n' | '\r'));

    let collapsed = candidate
        .lines()
        .filter(|ln| !ln.trim().is_empty())
        .map(|ln| INTRA_WS_RE.replace_all(ln, " ").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n");

    collapsed.trim().to_string()
}
