//! The transfer engine: every operation the HTTP layer exposes, wired over
//! the configured databases, the extraction strategies, ingestion and file
//! storage.

mod builder;
mod requests;

pub use builder::TransferEngineBuilder;
pub use requests::{CopyTableRequest, ExportDataRequest, LoadDataRequest, TransferOutcome};

use datafusion::arrow::array::{Int64Array, StringArray};
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ConfigError;
use crate::database::{DatabaseManager, DatabaseRole, DatabaseSelector, DbPool};
use crate::datafetch::{
    copy_table_binary, DataFetchError, DataFetcher, FetchedTable, NativeFetcher, ParallelFetcher,
};
use crate::ingest::{self, IngestError};
use crate::storage::{FileFormat, StorageError, StorageManager, TableLocation};
use requests::partition_key;

const TEST_DATA_DIR: &str = "test_data";

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] DataFetchError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Which read path an operation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Driver,
    Parallel,
}

#[derive(Debug)]
pub struct TransferEngine {
    databases: DatabaseManager,
    storage: Arc<dyn StorageManager>,
    driver: NativeFetcher,
    parallel: ParallelFetcher,
    batch_size: usize,
}

impl TransferEngine {
    fn fetcher(&self, strategy: Strategy) -> &dyn DataFetcher {
        match strategy {
            Strategy::Driver => &self.driver,
            Strategy::Parallel => &self.parallel,
        }
    }

    fn pool(&self, selector: &str) -> Result<&DbPool, EngineError> {
        let selector: DatabaseSelector = selector.parse().map_err(EngineError::InvalidRequest)?;
        Ok(self.databases.select(selector)?)
    }

    /// Read a file or partitioned directory and append it to a table.
    pub async fn load_data(&self, request: &LoadDataRequest) -> Result<TransferOutcome, EngineError> {
        let format: FileFormat = request.file_format.parse()?;
        // A single file wins when both are given.
        let location = match (non_empty(&request.local_path), non_empty(&request.directory)) {
            (Some(path), _) => TableLocation::File(path.to_string()),
            (None, Some(directory)) => TableLocation::Dataset {
                directory: directory.to_string(),
                partitioning: request.partitioning.clone().unwrap_or_default(),
            },
            (None, None) => {
                return Err(EngineError::InvalidRequest(
                    "Either local_path or directory must be provided.".to_string(),
                ))
            }
        };
        let pool = self.pool(&request.database_role)?;

        let start = Instant::now();
        let data = self.storage.read_table(&location, format).await?;
        let rows = ingest::create_append(pool, &request.table_name, &data).await?;
        tracing::info!(
            "Loaded {} rows from {:?} into {} ({}) in {}ms",
            rows,
            location,
            request.table_name,
            pool.backend(),
            start.elapsed().as_millis()
        );

        Ok(TransferOutcome::new(
            format!(
                "{} data loaded into {}",
                request.file_format.to_uppercase(),
                request.database_role.to_uppercase()
            ),
            Some(data.metadata()),
        ))
    }

    /// Export a table through the single-connection driver path.
    pub async fn export_data(
        &self,
        request: &ExportDataRequest,
    ) -> Result<TransferOutcome, EngineError> {
        let data = self.export(request, Strategy::Driver).await?;
        Ok(TransferOutcome::new(
            format!(
                "Table exported to {} from {}",
                request.file_format.to_uppercase(),
                request.database_role.to_uppercase()
            ),
            Some(data.metadata()),
        ))
    }

    /// Export a table through parallel range-partitioned extraction, split
    /// on the first partitioning column.
    pub async fn export_parallel(
        &self,
        request: &ExportDataRequest,
    ) -> Result<TransferOutcome, EngineError> {
        let data = self.export(request, Strategy::Parallel).await?;
        Ok(TransferOutcome::new(
            format!(
                "Table exported to {} from {} using parallel extraction",
                request.file_format.to_uppercase(),
                request.database_role.to_uppercase()
            ),
            Some(data.metadata()),
        ))
    }

    /// Export a Postgres table to Parquet through binary COPY.
    pub async fn export_copy(
        &self,
        request: &ExportDataRequest,
    ) -> Result<TransferOutcome, EngineError> {
        let format: FileFormat = request.file_format.parse()?;
        if format != FileFormat::Parquet {
            return Err(EngineError::InvalidRequest(format!(
                "Unsupported file format '{}': COPY export writes parquet only",
                request.file_format
            )));
        }
        let pool = self.pool(&request.database_role)?;

        let start = Instant::now();
        let data = copy_table_binary(pool, &request.table_name, self.batch_size).await?;
        let location = export_location(request);
        self.storage.write_table(&location, format, &data).await?;
        tracing::info!(
            "Exported {} rows from {} with COPY in {}ms",
            data.num_rows(),
            request.table_name,
            start.elapsed().as_millis()
        );

        Ok(TransferOutcome::new(
            "Table exported to PARQUET using COPY",
            Some(data.metadata()),
        ))
    }

    /// Copy a table from one database to another over the driver path.
    pub async fn copy_table(
        &self,
        request: &CopyTableRequest,
    ) -> Result<TransferOutcome, EngineError> {
        let data = self.copy(request, Strategy::Driver).await?;
        Ok(TransferOutcome::new(
            "Table copied successfully",
            Some(data.metadata()),
        ))
    }

    pub async fn copy_table_parallel(
        &self,
        request: &CopyTableRequest,
    ) -> Result<TransferOutcome, EngineError> {
        let data = self.copy(request, Strategy::Parallel).await?;
        Ok(TransferOutcome::new(
            "Table copied successfully using parallel extraction",
            Some(data.metadata()),
        ))
    }

    /// Write the sample table (`ints`, `strs`) as single files and as
    /// datasets partitioned by `ints`, one per format.
    pub async fn generate_test_data(&self) -> Result<TransferOutcome, EngineError> {
        let data = sample_table()?;

        let files = [
            ("example.csv", FileFormat::Csv),
            ("example.arrow", FileFormat::Feather),
            ("example.parquet", FileFormat::Parquet),
        ];
        for (name, format) in files {
            let location = TableLocation::File(format!("{}/{}", TEST_DATA_DIR, name));
            self.storage.write_table(&location, format, &data).await?;
        }

        let datasets = [
            ("csv_dataset", FileFormat::Csv),
            ("ipc_dataset", FileFormat::Feather),
            ("parquet_dataset", FileFormat::Parquet),
        ];
        for (name, format) in datasets {
            let location = TableLocation::Dataset {
                directory: format!("{}/{}", TEST_DATA_DIR, name),
                partitioning: vec!["ints".to_string()],
            };
            self.storage.write_table(&location, format, &data).await?;
        }

        tracing::info!("Test data written under {}", TEST_DATA_DIR);
        Ok(TransferOutcome::new("Test data generated successfully", None))
    }

    /// Ping both configured databases.
    pub async fn check_health(&self) -> Result<(), EngineError> {
        for role in [DatabaseRole::Source, DatabaseRole::Target] {
            self.driver.check_health(self.databases.get(role)).await?;
        }
        Ok(())
    }

    async fn export(
        &self,
        request: &ExportDataRequest,
        strategy: Strategy,
    ) -> Result<FetchedTable, EngineError> {
        let format: FileFormat = request.file_format.parse()?;
        let pool = self.pool(&request.database_role)?;
        let fetcher = self.fetcher(strategy);

        let start = Instant::now();
        let data = fetcher
            .fetch_table(pool, &request.table_name, partition_key(&request.partitioning))
            .await?;
        let location = export_location(request);
        self.storage.write_table(&location, format, &data).await?;
        tracing::info!(
            "Exported {} rows from {} to {:?} via {} in {}ms",
            data.num_rows(),
            request.table_name,
            location,
            fetcher.name(),
            start.elapsed().as_millis()
        );

        Ok(data)
    }

    async fn copy(
        &self,
        request: &CopyTableRequest,
        strategy: Strategy,
    ) -> Result<FetchedTable, EngineError> {
        let source = self.pool(request.source_selector())?;
        let target = self.pool(request.target_selector())?;
        let fetcher = self.fetcher(strategy);

        let start = Instant::now();
        let data = fetcher
            .fetch_table(source, &request.source_table, partition_key(&request.partitioning))
            .await?;
        let rows = ingest::create_append(target, &request.target_table, &data).await?;
        tracing::info!(
            "Copied {} rows {} ({}) -> {} ({}) via {} in {}ms",
            rows,
            request.source_table,
            source.backend(),
            request.target_table,
            target.backend(),
            fetcher.name(),
            start.elapsed().as_millis()
        );

        Ok(data)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn export_location(request: &ExportDataRequest) -> TableLocation {
    match &request.partitioning {
        Some(columns) if !columns.is_empty() => TableLocation::Dataset {
            directory: request.export_path.clone(),
            partitioning: columns.clone(),
        },
        _ => TableLocation::File(request.export_path.clone()),
    }
}

fn sample_table() -> Result<FetchedTable, EngineError> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("ints", DataType::Int64, true),
        Field::new("strs", DataType::Utf8, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![1, 1, 2])),
            Arc::new(StringArray::from(vec!["foo", "bar", "baz"])),
        ],
    )
    .map_err(DataFetchError::from)?;
    Ok(FetchedTable::new(schema, vec![batch]))
}
