use async_trait::async_trait;

use super::{DataFetchError, FetchedTable};
use crate::database::DbPool;

/// Trait for reading a whole table out of a database as Arrow batches
#[async_trait]
pub trait DataFetcher: Send + Sync + std::fmt::Debug {
    /// Strategy name reported in logs and status messages
    fn name(&self) -> &'static str;

    /// Read every row of `table`. Strategies that split the read use
    /// `partition_on` to pick the column; others ignore it.
    async fn fetch_table(
        &self,
        pool: &DbPool,
        table: &str,
        partition_on: Option<&str>,
    ) -> Result<FetchedTable, DataFetchError>;

    /// Check connectivity to the database.
    async fn check_health(&self, pool: &DbPool) -> Result<(), DataFetchError> {
        pool.check_health().await
    }
}
