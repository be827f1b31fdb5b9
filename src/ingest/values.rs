//! Arrow columns flattened into bindable SQL values.
//!
//! Every Arrow type is first cast to one of a few wide types (i64, f64,
//! text, bytes, date, time, timestamp) so each backend only needs one bind
//! path per wide type.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use datafusion::arrow::array::{Array, ArrayRef, AsArray};
use datafusion::arrow::compute::cast;
use datafusion::arrow::compute::kernels::cast::{cast_with_options, CastOptions};
use datafusion::arrow::datatypes::{
    DataType, Date32Type, Float64Type, Int64Type, Time64MicrosecondType, TimeUnit,
    TimestampMicrosecondType,
};
use datafusion::arrow::record_batch::RecordBatch;

use super::IngestError;

/// Days from 0001-01-01 (CE) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Bool(Option<bool>),
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
    Bytes(Option<Vec<u8>>),
    Date(Option<NaiveDate>),
    Time(Option<NaiveTime>),
    Timestamp(Option<NaiveDateTime>),
    TimestampTz(Option<DateTime<Utc>>),
}

/// Convert a record batch into row-major values, one `Vec` per row.
pub fn batch_to_rows(batch: &RecordBatch) -> Result<Vec<Vec<SqlValue>>, IngestError> {
    let columns = batch
        .columns()
        .iter()
        .map(column_values)
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows: Vec<Vec<SqlValue>> = (0..batch.num_rows())
        .map(|_| Vec::with_capacity(columns.len()))
        .collect();
    for column in columns {
        for (row, value) in rows.iter_mut().zip(column) {
            row.push(value);
        }
    }
    Ok(rows)
}

pub fn column_values(array: &ArrayRef) -> Result<Vec<SqlValue>, IngestError> {
    let values = match array.data_type() {
        DataType::Boolean => array.as_boolean().iter().map(SqlValue::Bool).collect(),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => {
            // Unsigned values past i64::MAX fail the cast instead of becoming NULL.
            let checked = CastOptions {
                safe: false,
                ..Default::default()
            };
            let ints = cast_with_options(array, &DataType::Int64, &checked)?;
            ints.as_primitive::<Int64Type>()
                .iter()
                .map(SqlValue::Int)
                .collect()
        }
        DataType::Float16 | DataType::Float32 | DataType::Float64 => {
            let floats = cast(array, &DataType::Float64)?;
            floats
                .as_primitive::<Float64Type>()
                .iter()
                .map(SqlValue::Float)
                .collect()
        }
        DataType::Binary
        | DataType::LargeBinary
        | DataType::BinaryView
        | DataType::FixedSizeBinary(_) => {
            let bytes = cast(array, &DataType::Binary)?;
            bytes
                .as_binary::<i32>()
                .iter()
                .map(|v| SqlValue::Bytes(v.map(|b| b.to_vec())))
                .collect()
        }
        DataType::Date32 | DataType::Date64 => {
            let days = cast(array, &DataType::Date32)?;
            days.as_primitive::<Date32Type>()
                .iter()
                .map(|d| SqlValue::Date(d.and_then(date32_to_naive)))
                .collect()
        }
        DataType::Time32(_) | DataType::Time64(_) => {
            let times = cast(array, &DataType::Time64(TimeUnit::Microsecond))?;
            times
                .as_primitive::<Time64MicrosecondType>()
                .iter()
                .map(|t| SqlValue::Time(t.and_then(time64_to_naive)))
                .collect()
        }
        DataType::Timestamp(_, tz) => {
            let with_tz = tz.is_some();
            let micros = cast(array, &DataType::Timestamp(TimeUnit::Microsecond, tz.clone()))?;
            micros
                .as_primitive::<TimestampMicrosecondType>()
                .iter()
                .map(|v| {
                    let ts = v.and_then(DateTime::<Utc>::from_timestamp_micros);
                    if with_tz {
                        SqlValue::TimestampTz(ts)
                    } else {
                        SqlValue::Timestamp(ts.map(|t| t.naive_utc()))
                    }
                })
                .collect()
        }
        DataType::Null => (0..array.len()).map(|_| SqlValue::Text(None)).collect(),
        _ => {
            let text = cast(array, &DataType::Utf8)?;
            text.as_string::<i32>()
                .iter()
                .map(|s| SqlValue::Text(s.map(str::to_string)))
                .collect()
        }
    };
    Ok(values)
}

fn date32_to_naive(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

fn time64_to_naive(micros: i64) -> Option<NaiveTime> {
    let secs = u32::try_from(micros.div_euclid(1_000_000)).ok()?;
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::{
        Date32Array, Decimal128Array, DictionaryArray, Int16Array, StringArray,
        TimestampMillisecondArray, UInt16Array, UInt64Array,
    };
    use datafusion::arrow::datatypes::{Field, Schema, UInt16Type};
    use std::sync::Arc;

    #[test]
    fn integers_widen_to_i64() {
        let array: ArrayRef = Arc::new(Int16Array::from(vec![Some(3), None]));
        assert_eq!(
            column_values(&array).unwrap(),
            vec![SqlValue::Int(Some(3)), SqlValue::Int(None)]
        );

        let unsigned: ArrayRef = Arc::new(UInt16Array::from(vec![65535]));
        assert_eq!(
            column_values(&unsigned).unwrap(),
            vec![SqlValue::Int(Some(65535))]
        );
    }

    #[test]
    fn unsigned_overflow_is_an_error() {
        let array: ArrayRef = Arc::new(UInt64Array::from(vec![u64::MAX, 5]));
        let err = column_values(&array).unwrap_err();
        assert!(matches!(err, IngestError::Arrow(_)), "{}", err);

        let fits: ArrayRef = Arc::new(UInt64Array::from(vec![i64::MAX as u64]));
        assert_eq!(
            column_values(&fits).unwrap(),
            vec![SqlValue::Int(Some(i64::MAX))]
        );
    }

    #[test]
    fn dictionary_strings_become_text() {
        let dict: DictionaryArray<UInt16Type> = vec!["1", "2", "1"].into_iter().collect();
        let array: ArrayRef = Arc::new(dict);
        assert_eq!(
            column_values(&array).unwrap(),
            vec![
                SqlValue::Text(Some("1".into())),
                SqlValue::Text(Some("2".into())),
                SqlValue::Text(Some("1".into())),
            ]
        );
    }

    #[test]
    fn decimals_render_as_text() {
        let array: ArrayRef = Arc::new(
            Decimal128Array::from(vec![12345i128])
                .with_precision_and_scale(10, 2)
                .unwrap(),
        );
        assert_eq!(
            column_values(&array).unwrap(),
            vec![SqlValue::Text(Some("123.45".into()))]
        );
    }

    #[test]
    fn dates_and_timestamps_convert() {
        let dates: ArrayRef = Arc::new(Date32Array::from(vec![0, 10_957]));
        assert_eq!(
            column_values(&dates).unwrap(),
            vec![
                SqlValue::Date(NaiveDate::from_ymd_opt(1970, 1, 1)),
                SqlValue::Date(NaiveDate::from_ymd_opt(2000, 1, 1)),
            ]
        );

        let naive: ArrayRef = Arc::new(TimestampMillisecondArray::from(vec![1_500]));
        let expected = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_milli_opt(0, 0, 1, 500);
        assert_eq!(
            column_values(&naive).unwrap(),
            vec![SqlValue::Timestamp(expected)]
        );

        let aware: ArrayRef =
            Arc::new(TimestampMillisecondArray::from(vec![0]).with_timezone("UTC"));
        assert_eq!(
            column_values(&aware).unwrap(),
            vec![SqlValue::TimestampTz(DateTime::from_timestamp(0, 0))]
        );
    }

    #[test]
    fn time_conversion_handles_fractions() {
        assert_eq!(
            time64_to_naive(3_723_000_250),
            NaiveTime::from_hms_micro_opt(1, 2, 3, 250)
        );
        assert_eq!(time64_to_naive(-1), None);
    }

    #[test]
    fn batch_transposes_to_rows() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("ints", DataType::Int64, false),
            Field::new("strs", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(datafusion::arrow::array::Int64Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec![Some("foo"), None])),
            ],
        )
        .unwrap();

        let rows = batch_to_rows(&batch).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[1],
            vec![SqlValue::Int(Some(2)), SqlValue::Text(None)]
        );
    }
}
