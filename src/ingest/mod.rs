//! Writing fetched tables into a database: create the table if missing and
//! append every row with chunked multi-row INSERTs in one transaction.

mod postgres;
mod sqlite;
mod values;

pub use values::{batch_to_rows, column_values, SqlValue};

use datafusion::arrow::datatypes::{DataType, Schema};
use datafusion::arrow::error::ArrowError;

use crate::database::{Dialect, DbPool};
use crate::datafetch::FetchedTable;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Cannot create table '{0}' without columns")]
    EmptySchema(String),
}

/// Create `table` from the data's schema when it does not exist, then
/// append all rows. Returns the number of rows written.
pub async fn create_append(
    pool: &DbPool,
    table: &str,
    data: &FetchedTable,
) -> Result<usize, IngestError> {
    if data.schema.fields().is_empty() {
        return Err(IngestError::EmptySchema(table.to_string()));
    }

    let written = match pool {
        DbPool::Postgres(pool) => postgres::create_append(pool, table, data).await?,
        DbPool::Sqlite(pool) => sqlite::create_append(pool, table, data).await?,
    };
    tracing::debug!("appended {} rows to {}", written, table);
    Ok(written)
}

pub(crate) fn column_defs(schema: &Schema) -> Vec<(String, DataType)> {
    schema
        .fields()
        .iter()
        .map(|f| (f.name().clone(), f.data_type().clone()))
        .collect()
}

pub(crate) fn insert_prefix<D: Dialect>(table: &str, columns: &[(String, DataType)]) -> String {
    let names = columns
        .iter()
        .map(|(name, _)| D::quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} ({}) ", D::quote_table(table), names)
}

/// Rows per INSERT so one statement stays under the backend's bind limit.
pub(crate) fn rows_per_statement<D: Dialect>(num_columns: usize) -> usize {
    (D::max_bind_params() / num_columns.max(1)).clamp(1, 1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{PostgresDialect, SqliteDialect};
    use datafusion::arrow::datatypes::Field;

    #[test]
    fn insert_prefix_quotes_names() {
        let columns = vec![
            ("id".to_string(), DataType::Int64),
            ("full name".to_string(), DataType::Utf8),
        ];
        assert_eq!(
            insert_prefix::<PostgresDialect>("public.people", &columns),
            "INSERT INTO \"public\".\"people\" (\"id\", \"full name\") "
        );
    }

    #[test]
    fn statement_size_respects_bind_limit() {
        assert_eq!(rows_per_statement::<SqliteDialect>(3), 1000);
        assert_eq!(rows_per_statement::<SqliteDialect>(100), 327);
        assert_eq!(rows_per_statement::<PostgresDialect>(70_000), 1);
    }

    #[test]
    fn column_defs_follow_schema_order() {
        let schema = Schema::new(vec![
            Field::new("b", DataType::Utf8, true),
            Field::new("a", DataType::Int32, true),
        ]);
        let defs = column_defs(&schema);
        assert_eq!(defs[0].0, "b");
        assert_eq!(defs[1].1, DataType::Int32);
    }
}
