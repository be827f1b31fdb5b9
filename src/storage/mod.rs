// src/storage/mod.rs
use async_trait::async_trait;
use datafusion::arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use datafusion::parquet::errors::ParquetError;
use std::fmt::{self, Debug};
use std::path::PathBuf;
use std::str::FromStr;

pub mod filesystem;

// Re-exports
pub use filesystem::FilesystemStorage;

use crate::datafetch::FetchedTable;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Unknown partition column '{0}'")]
    UnknownPartitionColumn(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("DataFusion error: {0}")]
    DataFusion(#[from] DataFusionError),
}

/// On-disk table formats. `feather` is the Arrow IPC file format and also
/// answers to `arrow` and `ipc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Parquet,
    Feather,
}

impl FileFormat {
    /// Extension (with the leading dot) used when listing a dataset directory.
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => ".csv",
            FileFormat::Parquet => ".parquet",
            FileFormat::Feather => ".arrow",
        }
    }
}

impl FromStr for FileFormat {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "parquet" => Ok(FileFormat::Parquet),
            "feather" | "arrow" | "ipc" => Ok(FileFormat::Feather),
            _ => Err(StorageError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileFormat::Csv => "csv",
            FileFormat::Parquet => "parquet",
            FileFormat::Feather => "feather",
        };
        f.write_str(name)
    }
}

/// Where a table lives on disk: one file, or a directory of files split
/// into hive-style `column=value` subdirectories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableLocation {
    File(String),
    Dataset {
        directory: String,
        partitioning: Vec<String>,
    },
}

#[async_trait]
pub trait StorageManager: Debug + Send + Sync {
    /// Absolute location of a request path. Fails for paths escaping the
    /// storage root.
    fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError>;

    async fn read_table(
        &self,
        location: &TableLocation,
        format: FileFormat,
    ) -> Result<FetchedTable, StorageError>;

    async fn write_table(
        &self,
        location: &TableLocation,
        format: FileFormat,
        data: &FetchedTable,
    ) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_and_aliases() {
        assert_eq!("csv".parse::<FileFormat>().unwrap(), FileFormat::Csv);
        assert_eq!("PARQUET".parse::<FileFormat>().unwrap(), FileFormat::Parquet);
        assert_eq!("arrow".parse::<FileFormat>().unwrap(), FileFormat::Feather);
        assert_eq!("ipc".parse::<FileFormat>().unwrap(), FileFormat::Feather);
        assert!(matches!(
            "orc".parse::<FileFormat>(),
            Err(StorageError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn format_extensions() {
        assert_eq!(FileFormat::Csv.extension(), ".csv");
        assert_eq!(FileFormat::Feather.extension(), ".arrow");
        assert_eq!(FileFormat::Feather.to_string(), "feather");
    }
}
