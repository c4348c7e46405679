//! Read-only validation of a canonical SQL statement.
//!
//! Three checks, short-circuiting in order: the statement must be a plain
//! SELECT (optionally behind a CTE), must contain no mutating keyword or
//! statement separator, and may only reference allow-listed tables.
//! Validation never touches the database.

use crate::catalog::AllowedTables;
use once_cell::sync::Lazy;
use regex::Regex;

/// Optional CTE prologue followed by SELECT. `(?s)` lets the CTE span lines.
static SELECT_ONLY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^\s*(WITH\s+.*\s+)?SELECT\s").unwrap());

/// Mutating keywords plus the statement separator, all checked verbatim.
static FORBIDDEN_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bINSERT\b",
        r"(?i)\bUPDATE\b",
        r"(?i)\bDELETE\b",
        r"(?i)\bDROP\b",
        r"(?i)\bTRUNCATE\b",
        r"(?i)\bEXEC\b",
        r"(?i)\bEXECUTE\b",
        r"(?i)\bALTER\b",
        r"(?i)\bCREATE\b",
        r"(?i)\bMERGE\b",
        r";",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Line comments are stripped before the table scan so commented-out text
/// cannot smuggle identifiers past the allow-list.
static LINE_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)--.*$").unwrap());

/// Table identifier after FROM / JOIN, with an optional schema qualifier.
static TABLE_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:FROM|JOIN)\s+((?:\w+\.)?\w+)").unwrap());

/// Returns the text of the first forbidden pattern found, if any.
fn find_forbidden(sql: &str) -> Option<String> {
    for re in FORBIDDEN_RES.iter() {
        if let Some(m) = re.find(sql) {
            return Some(m.as_str().to_string());
        }
    }
    None
}

/// Collects referenced tables absent from the allow-list.
///
/// Offenders are reported as written in the statement, first occurrence
/// only, in statement order.
fn find_disallowed_tables(sql: &str, allowed: &AllowedTables) -> Vec<String> {
    let cleaned = LINE_COMMENT_RE.replace_all(sql, "");

    let mut bad = Vec::new();
    for caps in TABLE_REF_RE.captures_iter(&cleaned) {
        let table = &caps[1];
        if !allowed.contains(table) && !bad.iter().any(|b: &String| b.eq_ignore_ascii_case(table)) {
            bad.push(table.to_string());
        }
    }
    bad
}

/// Validates a statement against the allow-list.
///
/// Returns `Ok(())` or the reason the statement was rejected. The reason
/// text doubles as regeneration feedback, so it names the offending
/// pattern or every disallowed table rather than a generic refusal.
pub fn validate_sql(sql: &str, allowed: &AllowedTables) -> Result<(), String> {
    if !SELECT_ONLY_RE.is_match(sql) {
        return Err("Only SELECT queries are allowed.".to_string());
    }

    if let Some(pattern) = find_forbidden(sql) {
        return Err(format!("Forbidden pattern detected: {pattern}"));
    }

    let bad = find_disallowed_tables(sql, allowed);
    if !bad.is_empty() {
        return Err(format!(
            "Query references non-allowed tables: {}",
            bad.join(", ")
        ));
    }

    Ok(())
}
