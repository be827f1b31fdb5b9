//! PostgreSQL native driver implementation using sqlx

use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Executor, Row, Statement, TypeInfo};
use std::sync::Arc;

use crate::database::{Dialect, PostgresDialect};
use crate::datafetch::arrow_convert::{
    days_since_epoch, micros_since_midnight, pg_type_to_arrow, timestamp_micros, ColumnBuilder,
};
use crate::datafetch::{DataFetchError, SelectPlan};

/// Resolve the Arrow schema of a table by preparing `SELECT *` against it.
pub async fn plan_select(
    conn: &mut PgConnection,
    table: &str,
) -> Result<SelectPlan, DataFetchError> {
    let from = PostgresDialect::quote_table(table);
    let sql = format!("SELECT * FROM {}", from);
    let statement = (&mut *conn).prepare(&sql).await?;

    let mut fields = Vec::with_capacity(statement.columns().len());
    let mut projection = Vec::with_capacity(statement.columns().len());

    for column in statement.columns() {
        let name = column.name();
        let quoted = PostgresDialect::quote_ident(name);
        match pg_type_to_arrow(column.type_info().name()) {
            Some(data_type) => {
                fields.push(Field::new(name, data_type, true));
                projection.push(quoted);
            }
            None => {
                fields.push(Field::new(name, DataType::Utf8, true));
                projection.push(format!("{}::text AS {}", quoted, quoted));
            }
        }
    }

    Ok(SelectPlan::new(
        Arc::new(Schema::new(fields)),
        projection.join(", "),
        from,
    ))
}

/// Run the plan (optionally filtered) and collect the rows as record batches.
pub async fn fetch_batches(
    conn: &mut PgConnection,
    plan: &SelectPlan,
    filter: Option<&str>,
    batch_size: usize,
) -> Result<Vec<RecordBatch>, DataFetchError> {
    let sql = plan.sql(filter);
    tracing::debug!("postgres fetch: {}", sql);

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

// Just inside the BIGINT range once rounded through DOUBLE PRECISION.
const BIGINT_BOUND_MIN: &str = "-9.2e18";
const BIGINT_BOUND_MAX: &str = "9.2e18";

/// Smallest and largest value of a numeric column, clamped into BIGINT.
/// `None` when the table has no non-null values.
///
/// NaN and values outside the BIGINT range only affect where the outer
/// ranges start, and those ranges are open-ended.
pub async fn column_bounds(
    conn: &mut PgConnection,
    plan: &SelectPlan,
    column: &str,
) -> Result<Option<(i64, i64)>, DataFetchError> {
    let quoted = PostgresDialect::quote_ident(column);
    let sql = format!(
        "SELECT CAST(MIN(GREATEST(v, {lo})) AS BIGINT), CAST(MAX(LEAST(v, {hi})) AS BIGINT) \
         FROM (SELECT CAST({c} AS DOUBLE PRECISION) AS v FROM {}) AS bounds \
         WHERE v IS NOT NULL AND v <> 'NaN'",
        plan.table_ref(),
        c = quoted,
        lo = BIGINT_BOUND_MIN,
        hi = BIGINT_BOUND_MAX,
    );
    let (min, max): (Option<i64>, Option<i64>) =
        sqlx::query_as(&sql).fetch_one(&mut *conn).await?;

    Ok(min.zip(max))
}

fn append_value(
    builder: &mut ColumnBuilder,
    row: &PgRow,
    idx: usize,
) -> Result<(), DataFetchError> {
    match builder {
        ColumnBuilder::Boolean(b) => b.append_option(row.try_get::<Option<bool>, _>(idx)?),
        ColumnBuilder::Int16(b) => b.append_option(row.try_get::<Option<i16>, _>(idx)?),
        ColumnBuilder::Int32(b) => b.append_option(row.try_get::<Option<i32>, _>(idx)?),
        ColumnBuilder::Int64(b) => b.append_option(row.try_get::<Option<i64>, _>(idx)?),
        ColumnBuilder::Float32(b) => b.append_option(row.try_get::<Option<f32>, _>(idx)?),
        ColumnBuilder::Float64(b) => b.append_option(row.try_get::<Option<f64>, _>(idx)?),
        ColumnBuilder::Utf8(b) => b.append_option(row.try_get::<Option<String>, _>(idx)?),
        ColumnBuilder::Binary(b) => b.append_option(row.try_get::<Option<Vec<u8>>, _>(idx)?),
        ColumnBuilder::Date32(b) => b.append_option(
            row.try_get::<Option<chrono::NaiveDate>, _>(idx)?
                .map(days_since_epoch),
        ),
        ColumnBuilder::Time64(b) => b.append_option(
            row.try_get::<Option<chrono::NaiveTime>, _>(idx)?
                .map(micros_since_midnight),
        ),
        ColumnBuilder::Timestamp { builder, utc: true } => builder.append_option(
            row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)?
                .map(|ts| ts.timestamp_micros()),
        ),
        ColumnBuilder::Timestamp { builder, utc: false } => builder.append_option(
            row.try_get::<Option<chrono::NaiveDateTime>, _>(idx)?
                .map(timestamp_micros),
        ),
    }
    Ok(())
}
