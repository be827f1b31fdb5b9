use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{EngineError, TransferEngine};
use crate::config::{AppConfig, ConfigError, ExtractionConfig};
use crate::database::DatabaseManager;
use crate::datafetch::{NativeFetcher, ParallelFetcher};
use crate::source::Source;
use crate::storage::FilesystemStorage;

/// Builder for [`TransferEngine`].
#[derive(Debug, Default)]
pub struct TransferEngineBuilder {
    base_dir: Option<PathBuf>,
    source: Option<Source>,
    target: Option<Source>,
    extraction: ExtractionConfig,
}

impl TransferEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root directory every request path is resolved against.
    pub fn base_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.base_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn target(mut self, target: Source) -> Self {
        self.target = Some(target);
        self
    }

    pub fn partition_num(mut self, partition_num: usize) -> Self {
        self.extraction.partition_num = partition_num;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.extraction.batch_size = batch_size;
        self
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.extraction.max_connections = max_connections;
        self
    }

    pub fn build(self) -> Result<TransferEngine, EngineError> {
        let base_dir = self
            .base_dir
            .ok_or_else(|| ConfigError::Invalid("base_dir is required".into()))?;
        let source = self
            .source
            .ok_or_else(|| ConfigError::Invalid("a source database is required".into()))?;
        let target = self
            .target
            .ok_or_else(|| ConfigError::Invalid("a target database is required".into()))?;
        let extraction = self.extraction;
        if extraction.partition_num == 0 || extraction.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "partition_num and batch_size must be at least 1".into(),
            )
            .into());
        }

        std::fs::create_dir_all(&base_dir).map_err(|e| {
            ConfigError::Invalid(format!(
                "cannot create base_dir {}: {}",
                base_dir.display(),
                e
            ))
        })?;

        let databases =
            DatabaseManager::from_sources(&source, &target, extraction.max_connections.max(1))?;
        tracing::info!(
            "Databases configured: source={}, target={}",
            source.source_type(),
            target.source_type()
        );

        Ok(TransferEngine {
            databases,
            storage: Arc::new(FilesystemStorage::new(base_dir)),
            driver: NativeFetcher::new(extraction.batch_size),
            parallel: ParallelFetcher::new(extraction.partition_num, extraction.batch_size),
            batch_size: extraction.batch_size,
        })
    }
}

impl TransferEngine {
    pub fn builder() -> TransferEngineBuilder {
        TransferEngineBuilder::new()
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, EngineError> {
        Self::builder()
            .base_dir(&config.local.base_dir)
            .source(config.database.source.clone())
            .target(config.database.target.clone())
            .partition_num(config.extraction.partition_num)
            .batch_size(config.extraction.batch_size)
            .max_connections(config.extraction.max_connections)
            .build()
    }
}
