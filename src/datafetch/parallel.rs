//! Parallel extraction: split a table into range partitions on a numeric
//! column and read them concurrently, one pooled connection per partition.

use async_trait::async_trait;
use datafusion::arrow::record_batch::RecordBatch;
use futures::future::try_join_all;
use std::future::Future;

use super::native::{postgres, sqlite};
use super::{DataFetchError, DataFetcher, FetchedTable};
use crate::database::{DbPool, Dialect, PostgresDialect, SqliteDialect};

/// A half-open slice `[lower, upper)` of a partition column's value range.
/// A missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePartition {
    pub lower: Option<i64>,
    pub upper: Option<i64>,
}

impl RangePartition {
    pub const FULL: RangePartition = RangePartition {
        lower: None,
        upper: None,
    };

    /// WHERE clause for this partition over the quoted column. The partition
    /// without a lower bound also owns NULLs.
    pub fn filter(&self, column: &str) -> Option<String> {
        match (self.lower, self.upper) {
            (None, None) => None,
            (None, Some(upper)) => Some(format!("({c} < {} OR {c} IS NULL)", upper, c = column)),
            (Some(lower), Some(upper)) => {
                Some(format!("{c} >= {} AND {c} < {}", lower, upper, c = column))
            }
            (Some(lower), None) => Some(format!("{} >= {}", column, lower)),
        }
    }
}

/// Split `[min, max]` into at most `partitions` contiguous ranges covering
/// every value. The outer ranges are open-ended so values outside the
/// integer bounds (fractions, late inserts) still land somewhere.
pub fn split_range(min: i64, max: i64, partitions: usize) -> Vec<RangePartition> {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };
    let span = max as i128 - min as i128 + 1;
    let count = (partitions.max(1) as i128).min(span);
    if count <= 1 {
        return vec![RangePartition::FULL];
    }

    let boundaries: Vec<i64> = (1..count)
        .map(|i| (min as i128 + span * i / count) as i64)
        .collect();

    let mut ranges = Vec::with_capacity(count as usize);
    let mut lower = None;
    for boundary in boundaries {
        ranges.push(RangePartition {
            lower,
            upper: Some(boundary),
        });
        lower = Some(boundary);
    }
    ranges.push(RangePartition { lower, upper: None });
    ranges
}

/// Bulk parallel extraction over the connection pool.
#[derive(Debug)]
pub struct ParallelFetcher {
    partition_num: usize,
    batch_size: usize,
}

impl ParallelFetcher {
    pub fn new(partition_num: usize, batch_size: usize) -> Self {
        Self {
            partition_num,
            batch_size,
        }
    }

    fn partitions(&self, bounds: Option<(i64, i64)>) -> Vec<RangePartition> {
        match bounds {
            Some((min, max)) => split_range(min, max, self.partition_num),
            None => vec![RangePartition::FULL],
        }
    }
}

/// Run one fetch per partition concurrently and concatenate the results
/// in partition order.
async fn run_partitions<F, Fut>(
    partitions: &[RangePartition],
    column: Option<&str>,
    fetch: F,
) -> Result<Vec<RecordBatch>, DataFetchError>
where
    F: Fn(Option<String>) -> Fut,
    Fut: Future<Output = Result<Vec<RecordBatch>, DataFetchError>>,
{
    let filters = partitions
        .iter()
        .map(|p| column.and_then(|c| p.filter(c)));
    let results = try_join_all(filters.map(fetch)).await?;
    Ok(results.into_iter().flatten().collect())
}

#[async_trait]
impl DataFetcher for ParallelFetcher {
    fn name(&self) -> &'static str {
        "parallel"
    }

    async fn fetch_table(
        &self,
        pool: &DbPool,
        table: &str,
        partition_on: Option<&str>,
    ) -> Result<FetchedTable, DataFetchError> {
        let batch_size = self.batch_size;

        match pool {
            DbPool::Postgres(pool) => {
                let mut conn = pool.acquire().await?;
                let plan = postgres::plan_select(&mut conn, table).await?;
                let bounds = match partition_on {
                    Some(column) => {
                        ensure_column(&plan.schema, column)?;
                        postgres::column_bounds(&mut conn, &plan, column).await?
                    }
                    None => None,
                };
                drop(conn);

                let partitions = self.partitions(bounds);
                tracing::debug!("postgres partitions for {}: {:?}", table, partitions);
                let column = partition_on.map(PostgresDialect::quote_ident);
                let plan_ref = &plan;
                let batches = run_partitions(&partitions, column.as_deref(), |filter| async move {
                    let mut conn = pool.acquire().await?;
                    postgres::fetch_batches(&mut conn, plan_ref, filter.as_deref(), batch_size)
                        .await
                })
                .await?;
                Ok(FetchedTable::new(plan.schema.clone(), batches))
            }
            DbPool::Sqlite(pool) => {
                let mut conn = pool.acquire().await?;
                let plan = sqlite::plan_select(&mut conn, table).await?;
                let bounds = match partition_on {
                    Some(column) => {
                        ensure_column(&plan.schema, column)?;
                        sqlite::column_bounds(&mut conn, &plan, column).await?
                    }
                    None => None,
                };
                drop(conn);

                let partitions = self.partitions(bounds);
                tracing::debug!("sqlite partitions for {}: {:?}", table, partitions);
                let column = partition_on.map(SqliteDialect::quote_ident);
                let plan_ref = &plan;
                let batches = run_partitions(&partitions, column.as_deref(), |filter| async move {
                    let mut conn = pool.acquire().await?;
                    sqlite::fetch_batches(&mut conn, plan_ref, filter.as_deref(), batch_size)
                        .await
                })
                .await?;
                Ok(FetchedTable::new(plan.schema.clone(), batches))
            }
        }
    }
}

fn ensure_column(
    schema: &datafusion::arrow::datatypes::Schema,
    column: &str,
) -> Result<(), DataFetchError> {
    match schema.field_with_name(column) {
        Ok(field) if field.data_type().is_numeric() => Ok(()),
        Ok(field) => Err(DataFetchError::Partition(format!(
            "column '{}' has type {}, partitioning needs a numeric column",
            column,
            field.data_type()
        ))),
        Err(_) => Err(DataFetchError::Partition(format!(
            "column '{}' not found",
            column
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::datatypes::{DataType, Field, Schema};

    #[test]
    fn split_covers_range_without_gaps() {
        let parts = split_range(1, 100, 4);
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0].lower, None);
        assert_eq!(parts[3].upper, None);
        for pair in parts.windows(2) {
            assert_eq!(pair[0].upper, pair[1].lower);
        }
        assert_eq!(parts[0].upper, Some(26));
        assert_eq!(parts[1].upper, Some(51));
        assert_eq!(parts[2].upper, Some(76));
    }

    #[test]
    fn split_caps_partitions_at_span() {
        // only three distinct values: no more than three partitions
        let parts = split_range(1, 3, 10);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].upper, Some(2));
        assert_eq!(parts[1], RangePartition { lower: Some(2), upper: Some(3) });
        assert_eq!(parts[2].lower, Some(3));
    }

    #[test]
    fn split_single_value_is_one_partition() {
        assert_eq!(split_range(7, 7, 10), vec![RangePartition::FULL]);
        assert_eq!(split_range(0, 100, 1), vec![RangePartition::FULL]);
        assert_eq!(split_range(0, 100, 0), vec![RangePartition::FULL]);
    }

    #[test]
    fn split_handles_extreme_bounds() {
        let parts = split_range(i64::MIN, i64::MAX, 4);
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[1].lower, Some(i64::MIN / 2));
        assert_eq!(parts[2].lower, Some(0));
    }

    #[test]
    fn filters_per_partition_shape() {
        let c = "\"id\"";
        assert_eq!(RangePartition::FULL.filter(c), None);
        assert_eq!(
            RangePartition { lower: None, upper: Some(5) }.filter(c).unwrap(),
            "(\"id\" < 5 OR \"id\" IS NULL)"
        );
        assert_eq!(
            RangePartition { lower: Some(5), upper: Some(9) }.filter(c).unwrap(),
            "\"id\" >= 5 AND \"id\" < 9"
        );
        assert_eq!(
            RangePartition { lower: Some(9), upper: None }.filter(c).unwrap(),
            "\"id\" >= 9"
        );
    }

    #[test]
    fn partition_column_must_be_numeric() {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("name", DataType::Utf8, true),
        ]);
        assert!(ensure_column(&schema, "id").is_ok());
        assert!(ensure_column(&schema, "name").is_err());
        assert!(ensure_column(&schema, "missing").is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn partitions_run_concurrently_and_keep_order() {
        let parts = split_range(0, 9, 3);
        let batches = run_partitions(&parts, Some("\"v\""), |filter| async move {
            let schema = std::sync::Arc::new(Schema::new(vec![Field::new(
                "f",
                DataType::Utf8,
                true,
            )]));
            let array = datafusion::arrow::array::StringArray::from(vec![filter]);
            Ok::<_, DataFetchError>(vec![RecordBatch::try_new(
                schema,
                vec![std::sync::Arc::new(array)],
            )?])
        })
        .await
        .unwrap();

        assert_eq!(batches.len(), 3);
        let first = batches[0]
            .column(0)
            .as_any()
            .downcast_ref::<datafusion::arrow::array::StringArray>()
            .unwrap()
            .value(0)
            .to_string();
        assert!(first.contains("IS NULL"));
    }
}
