//! Schema catalog loading and the derived table allow-list.
//!
//! The catalog is produced out-of-band by a schema extraction pass and
//! persisted as JSON. It is loaded once at startup and never mutated;
//! every component that needs schema knowledge borrows it read-only.

use crate::error::{QuestError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

/// A single column descriptor: name plus declared SQL type.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ColumnDef {
    pub column: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Row count for a table, or a note when counting failed during extraction.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RowCount {
    Count(u64),
    Note(String),
}

impl fmt::Display for RowCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowCount::Count(n) => write!(f, "{n}"),
            RowCount::Note(s) => write!(f, "{s}"),
        }
    }
}

/// The persisted schema catalog.
///
/// Tables are keyed by schema-qualified name (e.g., `dbo.wp_instance`) with
/// columns in ordinal order. Row counts and sample rows are optional context
/// used only for prompt construction.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SchemaCatalog {
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<ColumnDef>>,
    #[serde(default)]
    pub row_counts: BTreeMap<String, RowCount>,
    #[serde(default)]
    pub samples: BTreeMap<String, Vec<serde_json::Value>>,
}

impl SchemaCatalog {
    /// Loads the catalog from a JSON file.
    ///
    /// Fails if the file is missing, malformed, or lists no tables; running
    /// without a catalog would make every generated statement unverifiable.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QuestError::catalog(format!(
                "Failed to read schema catalog {}: {e}",
                path.display()
            ))
        })?;

        let catalog: SchemaCatalog = serde_json::from_str(&content).map_err(|e| {
            QuestError::catalog(format!(
                "Failed to parse schema catalog {}: {e}",
                path.display()
            ))
        })?;

        if catalog.tables.is_empty() {
            return Err(QuestError::catalog(format!(
                "Schema catalog {} contains no tables",
                path.display()
            )));
        }

        Ok(catalog)
    }

    /// Derives the normalized table allow-list from the catalog keys.
    pub fn allowed_tables(&self) -> AllowedTables {
        AllowedTables::from_catalog(self)
    }

    /// Renders the catalog as compact prompt text.
    ///
    /// One line per table with columns and row count, followed by sample
    /// rows where the extraction captured any:
    ///
    /// ```text
    /// dbo.wp_instance: instance_id(int), status(varchar) [rows=1542]
    ///   sample: [{"instance_id": 1, "status": "open"}]
    /// ```
    pub fn format_for_prompt(&self) -> String {
        let mut lines = Vec::new();
        for (table, columns) in &self.tables {
            let cols = columns
                .iter()
                .map(|c| format!("{}({})", c.column, c.data_type))
                .collect::<Vec<_>>()
                .join(", ");
            let rows = self
                .row_counts
                .get(table)
                .map(|r| r.to_string())
                .unwrap_or_else(|| "?".to_string());
            lines.push(format!("{table}: {cols} [rows={rows}]"));

            if let Some(sample) = self.samples.get(table) {
                if !sample.is_empty() {
                    let rendered = serde_json::to_string(sample).unwrap_or_default();
                    lines.push(format!("  sample: {rendered}"));
                }
            }
        }
        lines.join("\n")
    }
}

/// Normalized set of table names a generated statement may reference.
///
/// Every catalog key is stored lower-cased, both with and without its schema
/// qualifier, so `dbo.WP_Instance`, `wp_instance` and `DBO.wp_instance` all
/// resolve to the same entry.
#[derive(Debug, Clone, Default)]
pub struct AllowedTables {
    names: HashSet<String>,
}

impl AllowedTables {
    pub fn from_catalog(catalog: &SchemaCatalog) -> Self {
        let mut names = HashSet::new();
        for table in catalog.tables.keys() {
            let lower = table.to_lowercase();
            if let Some((_, bare)) = lower.rsplit_once('.') {
                names.insert(bare.to_string());
            }
            names.insert(lower);
        }
        Self { names }
    }

    /// Builds an allow-list directly from names, mainly for tests.
    pub fn from_names<I, S>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names = HashSet::new();
        for table in iter {
            let lower = table.as_ref().to_lowercase();
            if let Some((_, bare)) = lower.rsplit_once('.') {
                names.insert(bare.to_string());
            }
            names.insert(lower);
        }
        Self { names }
    }

    /// Case-insensitive membership check.
    pub fn contains(&self, table: &str) -> bool {
        self.names.contains(&table.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_catalog_json() -> &'static str {
        r#"{
            "tables": {
                "dbo.wp_instance": [
                    {"column": "instance_id", "type": "int"},
                    {"column": "status", "type": "varchar"}
                ],
                "dbo.wp_workitem": [
                    {"column": "workitem_id", "type": "int"},
                    {"column": "instance_id", "type": "int"}
                ]
            },
            "row_counts": {
                "dbo.wp_instance": 1542,
                "dbo.wp_workitem": "error: permission denied"
            },
            "samples": {
                "dbo.wp_instance": [{"instance_id": 1, "status": "open"}],
                "dbo.wp_workitem": []
            }
        }"#
    }

    #[test]
    fn test_load_catalog() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_catalog_json().as_bytes()).unwrap();

        let catalog = SchemaCatalog::load(file.path()).unwrap();

        assert_eq!(catalog.tables.len(), 2);
        let columns = &catalog.tables["dbo.wp_instance"];
        assert_eq!(columns[0].column, "instance_id");
        assert_eq!(columns[0].data_type, "int");
        assert_eq!(
            catalog.row_counts["dbo.wp_instance"],
            RowCount::Count(1542)
        );
        assert_eq!(
            catalog.row_counts["dbo.wp_workitem"],
            RowCount::Note("error: permission denied".to_string())
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = SchemaCatalog::load(Path::new("/nonexistent/schema.json"));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to read schema catalog"));
    }

    #[test]
    fn test_load_rejects_empty_catalog() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"tables": {}}"#).unwrap();

        let result = SchemaCatalog::load(file.path());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("no tables"));
    }

    #[test]
    fn test_allowed_tables_includes_unqualified_names() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_catalog_json().as_bytes()).unwrap();
        let catalog = SchemaCatalog::load(file.path()).unwrap();

        let allowed = catalog.allowed_tables();

        assert!(allowed.contains("dbo.wp_instance"));
        assert!(allowed.contains("wp_instance"));
        assert!(allowed.contains("DBO.WP_INSTANCE"));
        assert!(allowed.contains("WP_WORKITEM"));
        assert!(!allowed.contains("portal_user"));
    }

    #[test]
    fn test_allowed_tables_from_names() {
        let allowed = AllowedTables::from_names(["dbo.wp_package", "portal_user"]);

        assert!(allowed.contains("wp_package"));
        assert!(allowed.contains("dbo.wp_package"));
        assert!(allowed.contains("Portal_User"));
        assert_eq!(allowed.len(), 3);
    }

    #[test]
    fn test_format_for_prompt() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_catalog_json().as_bytes()).unwrap();
        let catalog = SchemaCatalog::load(file.path()).unwrap();

        let text = catalog.format_for_prompt();

        assert!(text.contains("dbo.wp_instance: instance_id(int), status(varchar) [rows=1542]"));
        assert!(text.contains("sample: [{\"instance_id\":1,\"status\":\"open\"}]"));
        // Tables whose count failed keep the note instead of a number
        assert!(text.contains("[rows=error: permission denied]"));
        // Empty sample lists are omitted
        assert!(!text.contains("sample: []"));
    }
}
