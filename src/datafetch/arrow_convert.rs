//! Arrow builders for row-at-a-time decoding and the database type mappings
//! that choose them.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use datafusion::arrow::array::{
    ArrayBuilder, ArrayRef, BinaryBuilder, BooleanBuilder, Date32Builder, Float32Builder,
    Float64Builder, Int16Builder, Int32Builder, Int64Builder, StringBuilder,
    Time64MicrosecondBuilder, TimestampMicrosecondBuilder,
};
use datafusion::arrow::datatypes::{DataType, TimeUnit};

use super::DataFetchError;

/// One Arrow builder per decoded column.
#[derive(Debug)]
pub enum ColumnBuilder {
    Boolean(BooleanBuilder),
    Int16(Int16Builder),
    Int32(Int32Builder),
    Int64(Int64Builder),
    Float32(Float32Builder),
    Float64(Float64Builder),
    Utf8(StringBuilder),
    Binary(BinaryBuilder),
    Date32(Date32Builder),
    Time64(Time64MicrosecondBuilder),
    Timestamp {
        builder: TimestampMicrosecondBuilder,
        utc: bool,
    },
}

impl ColumnBuilder {
    pub fn new(data_type: &DataType, capacity: usize) -> Result<Self, DataFetchError> {
        let builder = match data_type {
            DataType::Boolean => ColumnBuilder::Boolean(BooleanBuilder::with_capacity(capacity)),
            DataType::Int16 => ColumnBuilder::Int16(Int16Builder::with_capacity(capacity)),
            DataType::Int32 => ColumnBuilder::Int32(Int32Builder::with_capacity(capacity)),
            DataType::Int64 => ColumnBuilder::Int64(Int64Builder::with_capacity(capacity)),
            DataType::Float32 => ColumnBuilder::Float32(Float32Builder::with_capacity(capacity)),
            DataType::Float64 => ColumnBuilder::Float64(Float64Builder::with_capacity(capacity)),
            DataType::Utf8 => ColumnBuilder::Utf8(StringBuilder::with_capacity(capacity, 0)),
            DataType::Binary => ColumnBuilder::Binary(BinaryBuilder::with_capacity(capacity, 0)),
            DataType::Date32 => ColumnBuilder::Date32(Date32Builder::with_capacity(capacity)),
            DataType::Time64(TimeUnit::Microsecond) => {
                ColumnBuilder::Time64(Time64MicrosecondBuilder::with_capacity(capacity))
            }
            DataType::Timestamp(TimeUnit::Microsecond, tz) => ColumnBuilder::Timestamp {
                builder: TimestampMicrosecondBuilder::with_capacity(capacity)
                    .with_timezone_opt(tz.clone()),
                utc: tz.is_some(),
            },
            other => {
                return Err(DataFetchError::Arrow(format!(
                    "no column builder for {}",
                    other
                )))
            }
        };
        Ok(builder)
    }

    pub fn append_null(&mut self) {
        match self {
            ColumnBuilder::Boolean(b) => b.append_null(),
            ColumnBuilder::Int16(b) => b.append_null(),
            ColumnBuilder::Int32(b) => b.append_null(),
            ColumnBuilder::Int64(b) => b.append_null(),
            ColumnBuilder::Float32(b) => b.append_null(),
            ColumnBuilder::Float64(b) => b.append_null(),
            ColumnBuilder::Utf8(b) => b.append_null(),
            ColumnBuilder::Binary(b) => b.append_null(),
            ColumnBuilder::Date32(b) => b.append_null(),
            ColumnBuilder::Time64(b) => b.append_null(),
            ColumnBuilder::Timestamp { builder, .. } => builder.append_null(),
        }
    }

    /// Build the accumulated array and reset the builder.
    pub fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::Boolean(b) => ArrayBuilder::finish(b),
            ColumnBuilder::Int16(b) => ArrayBuilder::finish(b),
            ColumnBuilder::Int32(b) => ArrayBuilder::finish(b),
            ColumnBuilder::Int64(b) => ArrayBuilder::finish(b),
            ColumnBuilder::Float32(b) => ArrayBuilder::finish(b),
            ColumnBuilder::Float64(b) => ArrayBuilder::finish(b),
            ColumnBuilder::Utf8(b) => ArrayBuilder::finish(b),
            ColumnBuilder::Binary(b) => ArrayBuilder::finish(b),
            ColumnBuilder::Date32(b) => ArrayBuilder::finish(b),
            ColumnBuilder::Time64(b) => ArrayBuilder::finish(b),
            ColumnBuilder::Timestamp { builder, .. } => ArrayBuilder::finish(builder),
        }
    }
}

pub fn days_since_epoch(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (date - epoch).num_days() as i32
}

pub fn micros_since_midnight(time: NaiveTime) -> i64 {
    time.num_seconds_from_midnight() as i64 * 1_000_000 + (time.nanosecond() / 1_000) as i64
}

pub fn timestamp_micros(ts: NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_micros()
}

/// Map a PostgreSQL type name to the Arrow type it is decoded as.
///
/// Returns `None` for types without a native decoder; those columns are
/// selected as `::text` and land as Utf8.
pub fn pg_type_to_arrow(pg_type: &str) -> Option<DataType> {
    let type_lower = pg_type.to_lowercase();

    let data_type = match type_lower.as_str() {
        "boolean" | "bool" => DataType::Boolean,
        "smallint" | "int2" => DataType::Int16,
        "integer" | "int" | "int4" => DataType::Int32,
        "bigint" | "int8" => DataType::Int64,
        "real" | "float4" => DataType::Float32,
        "double precision" | "float8" => DataType::Float64,
        "character varying" | "varchar" | "text" | "character" | "char" | "bpchar" | "name" => {
            DataType::Utf8
        }
        "bytea" => DataType::Binary,
        "date" => DataType::Date32,
        "time" | "time without time zone" => DataType::Time64(TimeUnit::Microsecond),
        "timestamp" | "timestamp without time zone" => {
            DataType::Timestamp(TimeUnit::Microsecond, None)
        }
        "timestamp with time zone" | "timestamptz" => {
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
        }
        _ => return None,
    };
    Some(data_type)
}

/// Map a SQLite declared type to an Arrow type using SQLite's affinity rules.
pub fn sqlite_type_to_arrow(declared: &str) -> DataType {
    let upper = declared.to_uppercase();

    if upper.contains("BOOL") {
        DataType::Boolean
    } else if upper.contains("INT") {
        DataType::Int64
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        DataType::Utf8
    } else if upper.contains("BLOB") {
        DataType::Binary
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        DataType::Float64
    } else {
        DataType::Utf8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::{Array, TimestampMicrosecondArray};
    use datafusion::arrow::datatypes::DataType;

    #[test]
    fn test_pg_type_mapping() {
        assert!(matches!(pg_type_to_arrow("INT4"), Some(DataType::Int32)));
        assert!(matches!(pg_type_to_arrow("varchar"), Some(DataType::Utf8)));
        assert!(matches!(
            pg_type_to_arrow("character varying"),
            Some(DataType::Utf8)
        ));
        assert!(matches!(pg_type_to_arrow("BOOL"), Some(DataType::Boolean)));
        assert!(matches!(pg_type_to_arrow("INT8"), Some(DataType::Int64)));
        assert!(matches!(pg_type_to_arrow("BYTEA"), Some(DataType::Binary)));
        assert!(matches!(
            pg_type_to_arrow("TIMESTAMPTZ"),
            Some(DataType::Timestamp(TimeUnit::Microsecond, Some(_)))
        ));
    }

    #[test]
    fn test_pg_types_without_decoder() {
        assert_eq!(pg_type_to_arrow("NUMERIC"), None);
        assert_eq!(pg_type_to_arrow("UUID"), None);
        assert_eq!(pg_type_to_arrow("JSONB"), None);
    }

    #[test]
    fn test_sqlite_affinity() {
        assert_eq!(sqlite_type_to_arrow("INTEGER"), DataType::Int64);
        assert_eq!(sqlite_type_to_arrow("bigint"), DataType::Int64);
        assert_eq!(sqlite_type_to_arrow("VARCHAR(20)"), DataType::Utf8);
        assert_eq!(sqlite_type_to_arrow("DOUBLE"), DataType::Float64);
        assert_eq!(sqlite_type_to_arrow("BLOB"), DataType::Binary);
        assert_eq!(sqlite_type_to_arrow("BOOLEAN"), DataType::Boolean);
        assert_eq!(sqlite_type_to_arrow("NULL"), DataType::Utf8);
        assert_eq!(sqlite_type_to_arrow("DATETIME"), DataType::Utf8);
    }

    #[test]
    fn test_builder_rejects_unsupported_type() {
        assert!(ColumnBuilder::new(&DataType::Float16, 1).is_err());
    }

    #[test]
    fn test_timestamp_builder_keeps_timezone() {
        let dt = DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()));
        let mut builder = ColumnBuilder::new(&dt, 2).unwrap();
        if let ColumnBuilder::Timestamp { builder: b, utc } = &mut builder {
            assert!(*utc);
            b.append_value(1_000_000);
        }
        builder.append_null();

        let array = builder.finish();
        assert_eq!(array.len(), 2);
        assert_eq!(array.data_type(), &dt);
        let ts = array
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .unwrap();
        assert_eq!(ts.value(0), 1_000_000);
        assert!(ts.is_null(1));
        assert!(builder.finish().is_empty());
    }

    #[test]
    fn test_temporal_helpers() {
        let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        assert_eq!(days_since_epoch(date), 10957);

        let time = NaiveTime::from_hms_micro_opt(0, 0, 1, 5).unwrap();
        assert_eq!(micros_since_midnight(time), 1_000_005);

        let ts = date.and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(timestamp_micros(ts), 946_684_800_000_000);
    }
}
