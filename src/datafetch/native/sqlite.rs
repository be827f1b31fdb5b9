//! SQLite native driver implementation using sqlx

use datafusion::arrow::datatypes::{Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Column, Executor, Row, Statement, TypeInfo};
use std::sync::Arc;

use crate::database::{Dialect, SqliteDialect};
use crate::datafetch::arrow_convert::{sqlite_type_to_arrow, ColumnBuilder};
use crate::datafetch::{DataFetchError, SelectPlan};

/// Resolve the Arrow schema of a table from its declared column types.
pub async fn plan_select(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<SelectPlan, DataFetchError> {
    let from = SqliteDialect::quote_table(table);
    let sql = format!("SELECT * FROM {}", from);
    let statement = (&mut *conn).prepare(&sql).await?;

    let fields: Vec<Field> = statement
        .columns()
        .iter()
        .map(|column| {
            Field::new(
                column.name(),
                sqlite_type_to_arrow(column.type_info().name()),
                true,
            )
        })
        .collect();
    let projection = fields
        .iter()
        .map(|f| SqliteDialect::quote_ident(f.name()))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(SelectPlan::new(
        Arc::new(Schema::new(fields)),
        projection,
        from,
    ))
}

pub async fn fetch_batches(
    conn: &mut SqliteConnection,
    plan: &SelectPlan,
    filter: Option<&str>,
    batch_size: usize,
) -> Result<Vec<RecordBatch>, DataFetchError> {
    let sql = plan.sql(filter);
    tracing::debug!("sqlite fetch: {}", sql);

    let mut builders = plan.builders(batch_size)?;
    let mut batches = Vec::new();
    let mut pending = 0usize;

    let mut rows = sqlx::query(&sql).fetch(&mut *conn);
    while let Some(row) = rows.try_next().await? {
        for (idx, builder) in builders.iter_mut().enumerate() {
            append_value(builder, &row, idx)?;
        }
        pending += 1;
        if pending == batch_size {
            batches.push(plan.finish_batch(&mut builders, pending)?);
            pending = 0;
        }
    }
    if pending > 0 {
        batches.push(plan.finish_batch(&mut builders, pending)?);
    }

    Ok(batches)
}

pub async fn column_bounds(
    conn: &mut SqliteConnection,
    plan: &SelectPlan,
    column: &str,
) -> Result<Option<(i64, i64)>, DataFetchError> {
    let quoted = SqliteDialect::quote_ident(column);
    let sql = format!(
        "SELECT CAST(MIN({c}) AS BIGINT), CAST(MAX({c}) AS BIGINT) FROM {}",
        plan.table_ref(),
        c = quoted
    );
    let (min, max): (Option<i64>, Option<i64>) =
        sqlx::query_as(&sql).fetch_one(&mut *conn).await?;

    Ok(min.zip(max))
}

// SQLite is dynamically typed, so values are read unchecked and left to
// SQLite's own coercion (e.g. an INTEGER stored in a TEXT column).
fn append_value(
    builder: &mut ColumnBuilder,
    row: &SqliteRow,
    idx: usize,
) -> Result<(), DataFetchError> {
    match builder {
        ColumnBuilder::Boolean(b) => {
            b.append_option(row.try_get_unchecked::<Option<bool>, _>(idx)?)
        }
        ColumnBuilder::Int64(b) => b.append_option(row.try_get_unchecked::<Option<i64>, _>(idx)?),
        ColumnBuilder::Float64(b) => {
            b.append_option(row.try_get_unchecked::<Option<f64>, _>(idx)?)
        }
        ColumnBuilder::Utf8(b) => {
            b.append_option(row.try_get_unchecked::<Option<String>, _>(idx)?)
        }
        ColumnBuilder::Binary(b) => {
            b.append_option(row.try_get_unchecked::<Option<Vec<u8>>, _>(idx)?)
        }
        other => {
            return Err(DataFetchError::Decode(format!(
                "sqlite column {} has no decoder for {:?}",
                idx, other
            )))
        }
    }
    Ok(())
}
