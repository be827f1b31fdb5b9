mod pg_copy;
pub(crate) mod postgres;
pub(crate) mod sqlite;

pub use pg_copy::CopyBinaryDecoder;

use async_trait::async_trait;

use crate::database::DbPool;
use crate::datafetch::{DataFetchError, DataFetcher, FetchedTable};

/// Row-oriented driver reads: one connection, rows streamed sequentially
/// into Arrow builders.
#[derive(Debug)]
pub struct NativeFetcher {
    batch_size: usize,
}

impl NativeFetcher {
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size }
    }
}

impl Default for NativeFetcher {
    fn default() -> Self {
        Self::new(8192)
    }
}

#[async_trait]
impl DataFetcher for NativeFetcher {
    fn name(&self) -> &'static str {
        "driver"
    }

    async fn fetch_table(
        &self,
        pool: &DbPool,
        table: &str,
        _partition_on: Option<&str>,
    ) -> Result<FetchedTable, DataFetchError> {
        match pool {
            DbPool::Postgres(pool) => {
                let mut conn = pool.acquire().await?;
                let plan = postgres::plan_select(&mut conn, table).await?;
                let batches =
                    postgres::fetch_batches(&mut conn, &plan, None, self.batch_size).await?;
                Ok(FetchedTable::new(plan.schema.clone(), batches))
            }
            DbPool::Sqlite(pool) => {
                let mut conn = pool.acquire().await?;
                let plan = sqlite::plan_select(&mut conn, table).await?;
                let batches =
                    sqlite::fetch_batches(&mut conn, &plan, None, self.batch_size).await?;
                Ok(FetchedTable::new(plan.schema.clone(), batches))
            }
        }
    }
}

/// Read a table through PostgreSQL's binary COPY protocol.
pub async fn copy_table_binary(
    pool: &DbPool,
    table: &str,
    batch_size: usize,
) -> Result<FetchedTable, DataFetchError> {
    match pool {
        DbPool::Postgres(pool) => {
            let mut conn = pool.acquire().await?;
            pg_copy::copy_table(&mut conn, table, batch_size).await
        }
        DbPool::Sqlite(_) => Err(DataFetchError::UnsupportedDriver(
            "binary COPY export requires a postgres database".to_string(),
        )),
    }
}
