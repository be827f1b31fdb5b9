use datafusion::arrow::datatypes::DataType;

/// Trait abstracting SQL differences between the supported backends.
///
/// Defaults follow the ANSI behaviour shared by PostgreSQL and SQLite.
/// Override methods where syntax or limits differ.
pub trait Dialect: Send + Sync + 'static {
    /// Maximum number of bind parameters in one statement.
    fn max_bind_params() -> usize;

    /// SQL column type used when creating a table for an Arrow column.
    fn sql_type(data_type: &DataType) -> String;

    /// Suffix appended after each bind placeholder of a column with this type.
    fn placeholder_cast(_data_type: &DataType) -> Option<String> {
        None
    }

    fn quote_ident(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quote a possibly schema-qualified table name, one part at a time.
    fn quote_table(name: &str) -> String {
        name.split('.')
            .map(Self::quote_ident)
            .collect::<Vec<_>>()
            .join(".")
    }

    fn create_table_sql(table: &str, fields: &[(String, DataType)]) -> String {
        let columns = fields
            .iter()
            .map(|(name, data_type)| {
                format!("{} {}", Self::quote_ident(name), Self::sql_type(data_type))
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            Self::quote_table(table),
            columns
        )
    }
}

// ============================================================================
// PostgreSQL
// ============================================================================

pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn max_bind_params() -> usize {
        u16::MAX as usize
    }

    fn sql_type(data_type: &DataType) -> String {
        match data_type {
            DataType::Boolean => "BOOLEAN".to_string(),
            DataType::Int8 | DataType::Int16 | DataType::UInt8 => "SMALLINT".to_string(),
            DataType::Int32 | DataType::UInt16 => "INTEGER".to_string(),
            DataType::Int64 | DataType::UInt32 | DataType::UInt64 => "BIGINT".to_string(),
            DataType::Float16 | DataType::Float32 => "REAL".to_string(),
            DataType::Float64 => "DOUBLE PRECISION".to_string(),
            DataType::Binary
            | DataType::LargeBinary
            | DataType::BinaryView
            | DataType::FixedSizeBinary(_) => "BYTEA".to_string(),
            DataType::Date32 | DataType::Date64 => "DATE".to_string(),
            DataType::Time32(_) | DataType::Time64(_) => "TIME".to_string(),
            DataType::Timestamp(_, None) => "TIMESTAMP".to_string(),
            DataType::Timestamp(_, Some(_)) => "TIMESTAMPTZ".to_string(),
            DataType::Decimal128(p, s) | DataType::Decimal256(p, s) => {
                format!("NUMERIC({}, {})", p, s)
            }
            DataType::Dictionary(_, value) => Self::sql_type(value),
            _ => "TEXT".to_string(),
        }
    }

    // Parameters are bound as a handful of wide types (BIGINT, TEXT, ...),
    // so each one is cast to the column type explicitly.
    fn placeholder_cast(data_type: &DataType) -> Option<String> {
        Some(format!("::{}", Self::sql_type(data_type)))
    }
}

// ============================================================================
// SQLite
// ============================================================================

pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn max_bind_params() -> usize {
        32766
    }

    fn sql_type(data_type: &DataType) -> String {
        match data_type {
            DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => "INTEGER".to_string(),
            DataType::Float16 | DataType::Float32 | DataType::Float64 => "REAL".to_string(),
            DataType::Binary
            | DataType::LargeBinary
            | DataType::BinaryView
            | DataType::FixedSizeBinary(_) => "BLOB".to_string(),
            DataType::Dictionary(_, value) => Self::sql_type(value),
            _ => "TEXT".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::datatypes::TimeUnit;

    #[test]
    fn quote_ident_doubles_embedded_quotes() {
        assert_eq!(PostgresDialect::quote_ident("id"), "\"id\"");
        assert_eq!(PostgresDialect::quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn quote_table_handles_schema_prefix() {
        assert_eq!(
            PostgresDialect::quote_table("public.flights"),
            "\"public\".\"flights\""
        );
        assert_eq!(SqliteDialect::quote_table("flights"), "\"flights\"");
    }

    #[test]
    fn postgres_type_mapping() {
        assert_eq!(PostgresDialect::sql_type(&DataType::Int64), "BIGINT");
        assert_eq!(PostgresDialect::sql_type(&DataType::Utf8), "TEXT");
        assert_eq!(
            PostgresDialect::sql_type(&DataType::Float64),
            "DOUBLE PRECISION"
        );
        assert_eq!(
            PostgresDialect::sql_type(&DataType::Timestamp(
                TimeUnit::Microsecond,
                Some("UTC".into())
            )),
            "TIMESTAMPTZ"
        );
        assert_eq!(
            PostgresDialect::sql_type(&DataType::Decimal128(10, 2)),
            "NUMERIC(10, 2)"
        );
        assert_eq!(
            PostgresDialect::sql_type(&DataType::Dictionary(
                Box::new(DataType::UInt16),
                Box::new(DataType::Utf8)
            )),
            "TEXT"
        );
    }

    #[test]
    fn sqlite_type_mapping() {
        assert_eq!(SqliteDialect::sql_type(&DataType::Boolean), "INTEGER");
        assert_eq!(SqliteDialect::sql_type(&DataType::Float32), "REAL");
        assert_eq!(SqliteDialect::sql_type(&DataType::Binary), "BLOB");
        assert_eq!(SqliteDialect::sql_type(&DataType::Date32), "TEXT");
    }

    #[test]
    fn placeholder_casts_only_on_postgres() {
        assert_eq!(
            PostgresDialect::placeholder_cast(&DataType::Int16),
            Some("::SMALLINT".to_string())
        );
        assert_eq!(SqliteDialect::placeholder_cast(&DataType::Int16), None);
    }

    #[test]
    fn create_table_sql_lists_columns_in_order() {
        let fields = vec![
            ("ints".to_string(), DataType::Int64),
            ("strs".to_string(), DataType::Utf8),
        ];
        assert_eq!(
            SqliteDialect::create_table_sql("example", &fields),
            "CREATE TABLE IF NOT EXISTS \"example\" (\"ints\" INTEGER, \"strs\" TEXT)"
        );
    }
}
