use serde::{Deserialize, Serialize};

use crate::datafetch::TableMetadata;

/// Load a file or a partitioned directory into a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadDataRequest {
    pub table_name: String,
    #[serde(default)]
    pub local_path: Option<String>,
    #[serde(default)]
    pub directory: Option<String>,
    pub file_format: String,
    #[serde(default)]
    pub partitioning: Option<Vec<String>>,
    /// `source`, `target`, `postgres` or `sqlite`
    #[serde(alias = "database")]
    pub database_role: String,
}

/// Export a table to a file, or to a partitioned directory when
/// `partitioning` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDataRequest {
    pub table_name: String,
    pub export_path: String,
    pub file_format: String,
    #[serde(default)]
    pub partitioning: Option<Vec<String>>,
    #[serde(alias = "database")]
    pub database_role: String,
}

/// Copy a table between databases. `database` applies to whichever side has
/// no explicit `source_database` / `target_database`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyTableRequest {
    pub source_table: String,
    pub target_table: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub source_database: Option<String>,
    #[serde(default)]
    pub target_database: Option<String>,
    #[serde(default)]
    pub partitioning: Option<Vec<String>>,
}

impl CopyTableRequest {
    pub fn source_selector(&self) -> &str {
        self.source_database
            .as_deref()
            .or(self.database.as_deref())
            .unwrap_or("source")
    }

    pub fn target_selector(&self) -> &str {
        self.target_database
            .as_deref()
            .or(self.database.as_deref())
            .unwrap_or("target")
    }
}

/// Result of one engine operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferOutcome {
    pub status: String,
    pub metadata: Option<TableMetadata>,
}

impl TransferOutcome {
    pub fn new(status: impl Into<String>, metadata: Option<TableMetadata>) -> Self {
        Self {
            status: status.into(),
            metadata,
        }
    }
}

/// First non-empty partition column, used as the parallel split key.
pub(crate) fn partition_key(partitioning: &Option<Vec<String>>) -> Option<&str> {
    partitioning
        .as_ref()
        .and_then(|cols| cols.iter().find(|c| !c.is_empty()))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_request_accepts_database_alias() {
        let request: LoadDataRequest = serde_json::from_str(
            r#"{"table_name": "t", "local_path": "a.csv", "file_format": "csv", "database": "sqlite"}"#,
        )
        .unwrap();
        assert_eq!(request.database_role, "sqlite");
        assert!(request.directory.is_none());
        assert!(request.partitioning.is_none());
    }

    #[test]
    fn copy_request_defaults_to_source_and_target() {
        let request: CopyTableRequest =
            serde_json::from_str(r#"{"source_table": "a", "target_table": "b"}"#).unwrap();
        assert_eq!(request.source_selector(), "source");
        assert_eq!(request.target_selector(), "target");
    }

    #[test]
    fn copy_request_database_sets_both_sides() {
        let request: CopyTableRequest = serde_json::from_str(
            r#"{"source_table": "a", "target_table": "b", "database": "postgres", "target_database": "sqlite"}"#,
        )
        .unwrap();
        assert_eq!(request.source_selector(), "postgres");
        assert_eq!(request.target_selector(), "sqlite");
    }

    #[test]
    fn partition_key_skips_empty_names() {
        assert_eq!(partition_key(&None), None);
        assert_eq!(partition_key(&Some(vec![])), None);
        assert_eq!(
            partition_key(&Some(vec!["".into(), "id".into()])),
            Some("id")
        );
    }
}
