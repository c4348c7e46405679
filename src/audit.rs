//! Append-only JSONL audit trail.
//!
//! One line per completed run, written at every terminal state. Appends
//! are serialized through a mutex so concurrent runs never interleave
//! partial lines.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::error::{QuestError, Result};
use crate::pipeline::Attempt;

/// Flattened projection of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// UTC time the run finished.
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,

    /// The question as the user asked it.
    pub user_query: String,

    /// Final sanitized statement, if an attempt got that far.
    pub sanitized_sql: Option<String>,

    /// Rows returned on success.
    pub rows: Option<u64>,

    /// Execution wall-clock time on success.
    pub exec_time_secs: Option<f64>,

    /// Terminal error for failed runs.
    pub error: Option<String>,

    /// Full attempt trail, in order.
    pub attempts: Vec<Attempt>,
}

impl AuditRecord {
    /// Starts a record for the given question, stamped now.
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            user_query: user_query.into(),
            sanitized_sql: None,
            rows: None,
            exec_time_secs: None,
            error: None,
            attempts: Vec::new(),
        }
    }
}

fn serialize_timestamp<S>(ts: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Durable audit log. One JSON object per line, append-only.
pub struct AuditLog {
    path: PathBuf,
    guard: Mutex<()>,
}

impl AuditLog {
    /// Creates an audit log writer for the given path. The file is
    /// created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Returns the log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record as a single JSON line.
    pub fn append(&self, record: &AuditRecord) -> Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| QuestError::audit(format!("Failed to serialize audit record: {e}")))?;

        // A poisoned guard only means another append panicked mid-write;
        // the file itself is still appendable.
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                QuestError::audit(format!(
                    "Failed to open audit log {}: {e}",
                    self.path.display()
                ))
            })?;

        writeln!(file, "{line}")
            .map_err(|e| QuestError::audit(format!("Failed to write audit record: {e}")))
    }
}
