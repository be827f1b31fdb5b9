use sqlx::query_builder::Separated;
use sqlx::sqlite::{Sqlite, SqlitePool};
use sqlx::QueryBuilder;

use super::{batch_to_rows, column_defs, insert_prefix, rows_per_statement, IngestError, SqlValue};
use crate::database::{Dialect, SqliteDialect};
use crate::datafetch::FetchedTable;

pub(super) async fn create_append(
    pool: &SqlitePool,
    table: &str,
    data: &FetchedTable,
) -> Result<usize, IngestError> {
    let columns = column_defs(&data.schema);
    let prefix = insert_prefix::<SqliteDialect>(table, &columns);
    let chunk_size = rows_per_statement::<SqliteDialect>(columns.len());

    let mut tx = pool.begin().await?;
    sqlx::query(&SqliteDialect::create_table_sql(table, &columns))
        .execute(&mut *tx)
        .await?;

    let mut written = 0;
    for batch in &data.batches {
        let mut rows = batch_to_rows(batch)?.into_iter().peekable();
        while rows.peek().is_some() {
            let chunk: Vec<Vec<SqlValue>> = rows.by_ref().take(chunk_size).collect();
            written += chunk.len();

            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(&prefix);
            builder.push_values(chunk, |mut row_sql, row| {
                for value in row {
                    push_value(&mut row_sql, value);
                }
            });
            builder.build().execute(&mut *tx).await?;
        }
    }

    tx.commit().await?;
    Ok(written)
}

// Dates and times are stored as ISO-8601 text, SQLite's own convention.
fn push_value<'args>(row: &mut Separated<'_, 'args, Sqlite, &'static str>, value: SqlValue) {
    match value {
        SqlValue::Bool(v) => row.push_bind(v),
        SqlValue::Int(v) => row.push_bind(v),
        SqlValue::Float(v) => row.push_bind(v),
        SqlValue::Text(v) => row.push_bind(v),
        SqlValue::Bytes(v) => row.push_bind(v),
        SqlValue::Date(v) => row.push_bind(v),
        SqlValue::Time(v) => row.push_bind(v),
        SqlValue::Timestamp(v) => row.push_bind(v),
        SqlValue::TimestampTz(v) => row.push_bind(v),
    };
}
