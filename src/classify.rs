//! Execution error classification.
//!
//! Failures coming back from the store are sorted into coarse classes by
//! case-insensitive keyword matching. The class is advisory input to the
//! retry policy; it never blocks an attempt on its own.

use serde::{Deserialize, Serialize};

/// Coarse class of an execution error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    /// Infrastructure fault (timeout, lost connection). Worth retrying the
    /// same statement after a pause.
    Transient,
    /// The statement itself is wrong (bad column, bad object, syntax).
    /// Worth regenerating with the error as feedback.
    Semantic,
    /// Rejected credentials or missing permissions. Retrying cannot help.
    Auth,
    /// Anything unrecognized.
    Unknown,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::Semantic => "semantic",
            ErrorClass::Auth => "auth",
            ErrorClass::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered keyword table driving classification.
///
/// Rows are checked top to bottom and the first match wins, so transient
/// markers take priority over semantic ones, which take priority over auth.
/// "Login timeout expired" is transient, not auth, on purpose.
#[derive(Debug, Clone)]
pub struct ClassificationTable {
    rows: Vec<(ErrorClass, &'static [&'static str])>,
}

const TRANSIENT_KEYWORDS: &[&str] = &[
    "timeout",
    "timed out",
    "could not open a connection",
    "login timeout",
    "deadlock",
    "transport-level",
    "network-related",
    "connection refused",
];

const SEMANTIC_KEYWORDS: &[&str] = &[
    "invalid column",
    "invalid object",
    "column not found",
    "does not exist",
    "cannot find column",
    "invalid column name",
    "no such column",
    "syntax error",
    "failed to execute",
];

const AUTH_KEYWORDS: &[&str] = &[
    "login failed",
    "permission",
    "permission denied",
    "access denied",
    "credential",
];

impl Default for ClassificationTable {
    fn default() -> Self {
        Self {
            rows: vec![
                (ErrorClass::Transient, TRANSIENT_KEYWORDS),
                (ErrorClass::Semantic, SEMANTIC_KEYWORDS),
                (ErrorClass::Auth, AUTH_KEYWORDS),
            ],
        }
    }
}

impl ClassificationTable {
    /// Classifies an error message. Empty input is `Unknown`.
    pub fn classify(&self, err_msg: &str) -> ErrorClass {
        if err_msg.is_empty() {
            return ErrorClass::Unknown;
        }
        let lower = err_msg.to_lowercase();
        for (class, keywords) in &self.rows {
            if keywords.iter().any(|k| lower.contains(k)) {
                return *class;
            }
        }
        ErrorClass::Unknown
    }
}

/// Classifies with the default SQL Server keyword table.
pub fn classify(err_msg: &str) -> ErrorClass {
    ClassificationTable::default().classify(err_msg)
}
