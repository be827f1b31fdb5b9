// src/storage/filesystem.rs
use async_trait::async_trait;
use datafusion::arrow::csv::WriterBuilder as CsvWriterBuilder;
use datafusion::arrow::datatypes::DataType;
use datafusion::arrow::ipc::writer::FileWriter;
use datafusion::common::config::CsvOptions;
use datafusion::datasource::file_format::arrow::ArrowFormatFactory;
use datafusion::datasource::file_format::csv::CsvFormatFactory;
use datafusion::datasource::file_format::options::ArrowReadOptions;
use datafusion::datasource::file_format::parquet::ParquetFormatFactory;
use datafusion::datasource::file_format::{format_as_file_type, FileFormatFactory};
use datafusion::datasource::MemTable;
use datafusion::logical_expr::LogicalPlanBuilder;
use datafusion::parquet::arrow::ArrowWriter;
use datafusion::prelude::{CsvReadOptions, ParquetReadOptions, SessionConfig, SessionContext};
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use super::{FileFormat, StorageError, StorageManager, TableLocation};
use crate::datafetch::FetchedTable;

/// Local directory holding every file the service reads or writes.
#[derive(Debug)]
pub struct FilesystemStorage {
    base_dir: PathBuf,
}

impl FilesystemStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    async fn read_dataframe(
        &self,
        path: String,
        format: FileFormat,
        extension: &str,
        partition_cols: Vec<(String, DataType)>,
    ) -> Result<FetchedTable, StorageError> {
        let ctx = session();
        let df = match format {
            FileFormat::Csv => {
                let options = CsvReadOptions::new()
                    .has_header(true)
                    .file_extension(extension)
                    .table_partition_cols(partition_cols);
                ctx.read_csv(path, options).await?
            }
            FileFormat::Parquet => {
                let options = ParquetReadOptions {
                    file_extension: extension,
                    ..Default::default()
                }
                .table_partition_cols(partition_cols);
                ctx.read_parquet(path, options).await?
            }
            FileFormat::Feather => {
                let options = ArrowReadOptions {
                    file_extension: extension,
                    table_partition_cols: partition_cols,
                    ..Default::default()
                };
                ctx.read_arrow(path, options).await?
            }
        };

        let schema = df.schema().inner().clone();
        let batches = df.collect().await?;
        Ok(FetchedTable::new(schema, batches))
    }

    async fn write_dataset(
        &self,
        directory: &Path,
        partitioning: &[String],
        format: FileFormat,
        data: &FetchedTable,
    ) -> Result<(), StorageError> {
        for column in partitioning {
            if data.schema.field_with_name(column).is_err() {
                return Err(StorageError::UnknownPartitionColumn(column.clone()));
            }
        }
        fs::create_dir_all(directory)?;

        let ctx = session();
        let source = MemTable::try_new(data.schema.clone(), vec![data.batches.clone()])?;
        let input = ctx.read_table(Arc::new(source))?.into_unoptimized_plan();

        // Partition columns go straight into the plan so any column name
        // the schema accepts is usable, quoted or not.
        let target = format!("{}/", directory.display());
        let plan = LogicalPlanBuilder::copy_to(
            input,
            target.clone(),
            format_as_file_type(format_factory(format)),
            HashMap::new(),
            partitioning.to_vec(),
        )?
        .build()?;
        tracing::debug!(
            "dataset write: {} as {} partitioned by {:?}",
            target,
            format,
            partitioning
        );

        ctx.execute_logical_plan(plan).await?.collect().await?;
        Ok(())
    }
}

#[async_trait]
impl StorageManager for FilesystemStorage {
    fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let invalid = |reason: &str| StorageError::InvalidPath {
            path: relative.to_string(),
            reason: reason.to_string(),
        };
        if relative.trim().is_empty() {
            return Err(invalid("path is empty"));
        }

        let path = Path::new(relative);
        for component in path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => return Err(invalid("'..' is not allowed")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("absolute paths are not allowed"))
                }
            }
        }
        Ok(self.base_dir.join(path))
    }

    async fn read_table(
        &self,
        location: &TableLocation,
        format: FileFormat,
    ) -> Result<FetchedTable, StorageError> {
        match location {
            TableLocation::File(relative) => {
                let path = self.resolve(relative)?;
                if !path.is_file() {
                    return Err(StorageError::NotFound(relative.clone()));
                }
                // Match the file's own extension so `.feather`, `.ipc` or
                // extension-less files are still picked up.
                let extension = path
                    .extension()
                    .map(|ext| format!(".{}", ext.to_string_lossy()))
                    .unwrap_or_default();
                self.read_dataframe(
                    path.to_string_lossy().into_owned(),
                    format,
                    &extension,
                    Vec::new(),
                )
                .await
            }
            TableLocation::Dataset {
                directory,
                partitioning,
            } => {
                let path = self.resolve(directory)?;
                if !path.is_dir() {
                    return Err(StorageError::NotFound(directory.clone()));
                }
                let partition_cols = partitioning
                    .iter()
                    .map(|name| (name.clone(), DataType::Utf8))
                    .collect();
                self.read_dataframe(
                    format!("{}/", path.display()),
                    format,
                    format.extension(),
                    partition_cols,
                )
                .await
            }
        }
    }

    async fn write_table(
        &self,
        location: &TableLocation,
        format: FileFormat,
        data: &FetchedTable,
    ) -> Result<(), StorageError> {
        match location {
            TableLocation::File(relative) => {
                let path = self.resolve(relative)?;
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                write_file(&path, format, data)
            }
            TableLocation::Dataset {
                directory,
                partitioning,
            } => {
                let path = self.resolve(directory)?;
                self.write_dataset(&path, partitioning, format, data).await
            }
        }
    }
}

// Strings stay Utf8 instead of DataFusion's default Utf8View so reported
// schemas and written files use the plain string type.
fn session() -> SessionContext {
    let config = SessionConfig::new()
        .set_bool("datafusion.execution.parquet.schema_force_view_types", false);
    SessionContext::new_with_config(config)
}

fn format_factory(format: FileFormat) -> Arc<dyn FileFormatFactory> {
    match format {
        FileFormat::Csv => Arc::new(CsvFormatFactory::new_with_options(CsvOptions {
            has_header: Some(true),
            ..Default::default()
        })),
        FileFormat::Parquet => Arc::new(ParquetFormatFactory::new()),
        FileFormat::Feather => Arc::new(ArrowFormatFactory::new()),
    }
}

fn write_file(path: &Path, format: FileFormat, data: &FetchedTable) -> Result<(), StorageError> {
    let file = File::create(path)?;
    match format {
        FileFormat::Parquet => {
            let mut writer = ArrowWriter::try_new(file, data.schema.clone(), None)?;
            for batch in &data.batches {
                writer.write(batch)?;
            }
            writer.close()?;
        }
        FileFormat::Feather => {
            let mut writer = FileWriter::try_new(file, &data.schema)?;
            for batch in &data.batches {
                writer.write(batch)?;
            }
            writer.finish()?;
        }
        FileFormat::Csv => {
            let mut writer = CsvWriterBuilder::new().with_header(true).build(file);
            for batch in &data.batches {
                writer.write(batch)?;
            }
        }
    }
    Ok(())
}
