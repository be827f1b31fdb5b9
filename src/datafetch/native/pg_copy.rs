//! Bulk export through PostgreSQL's binary `COPY ... TO STDOUT`.
//!
//! The stream is the PGCOPY binary format: an 11-byte signature, a 32-bit
//! flags word and a header extension, then one tuple per row (16-bit field
//! count, each field a 32-bit length followed by that many bytes, -1 for
//! NULL) and a trailer of a single -1 field count. All integers are
//! big-endian; dates and timestamps count from 2000-01-01.

use datafusion::arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use sqlx::postgres::PgConnection;

use super::postgres::plan_select;
use crate::datafetch::arrow_convert::ColumnBuilder;
use crate::datafetch::{DataFetchError, FetchedTable, SelectPlan};

const SIGNATURE: &[u8; 11] = b"PGCOPY\n\xff\r\n\0";
const HEADER_LEN: usize = SIGNATURE.len() + 4 + 4;

/// Days between 1970-01-01 and 2000-01-01.
const PG_EPOCH_DAYS: i32 = 10_957;
/// Microseconds between 1970-01-01 and 2000-01-01.
const PG_EPOCH_MICROS: i64 = 946_684_800_000_000;

/// Export a whole table with one binary COPY.
pub async fn copy_table(
    conn: &mut PgConnection,
    table: &str,
    batch_size: usize,
) -> Result<FetchedTable, DataFetchError> {
    let plan = plan_select(conn, table).await?;
    let statement = format!("COPY ({}) TO STDOUT (FORMAT binary)", plan.sql(None));
    tracing::debug!("postgres copy: {}", statement);

    let mut decoder = CopyBinaryDecoder::new(&plan, batch_size)?;
    let mut stream = conn.copy_out_raw(&statement).await?;
    while let Some(chunk) = stream.try_next().await? {
        decoder.feed(&chunk)?;
    }
    drop(stream);

    let batches = decoder.finish()?;
    Ok(FetchedTable::new(plan.schema.clone(), batches))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    Tuples,
    Done,
}

/// Incremental decoder: bytes can arrive in arbitrarily sized chunks.
pub struct CopyBinaryDecoder<'a> {
    plan: &'a SelectPlan,
    builders: Vec<ColumnBuilder>,
    buffer: Vec<u8>,
    state: State,
    pending: usize,
    batch_size: usize,
    batches: Vec<RecordBatch>,
}

impl<'a> CopyBinaryDecoder<'a> {
    pub fn new(plan: &'a SelectPlan, batch_size: usize) -> Result<Self, DataFetchError> {
        Ok(Self {
            plan,
            builders: plan.builders(batch_size)?,
            buffer: Vec::new(),
            state: State::Header,
            pending: 0,
            batch_size,
            batches: Vec::new(),
        })
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), DataFetchError> {
        self.buffer.extend_from_slice(chunk);

        let mut offset = 0usize;
        loop {
            match self.state {
                State::Header => match self.read_header(&self.buffer[offset..])? {
                    Some(consumed) => {
                        offset += consumed;
                        self.state = State::Tuples;
                    }
                    None => break,
                },
                State::Tuples => match self.read_tuple(offset)? {
                    Some(consumed) => offset += consumed,
                    None => break,
                },
                State::Done => {
                    if offset < self.buffer.len() {
                        return Err(DataFetchError::Decode(
                            "unexpected data after COPY trailer".to_string(),
                        ));
                    }
                    break;
                }
            }
        }

        self.buffer.drain(..offset);
        Ok(())
    }

    /// Flush buffered rows. Fails if the trailer has not been seen.
    pub fn finish(mut self) -> Result<Vec<RecordBatch>, DataFetchError> {
        if self.state != State::Done || !self.buffer.is_empty() {
            return Err(DataFetchError::Decode(
                "COPY stream ended before the trailer".to_string(),
            ));
        }
        if self.pending > 0 {
            let batch = self.plan.finish_batch(&mut self.builders, self.pending)?;
            self.batches.push(batch);
        }
        Ok(self.batches)
    }

    fn read_header(&self, buf: &[u8]) -> Result<Option<usize>, DataFetchError> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }
        if &buf[..SIGNATURE.len()] != SIGNATURE {
            return Err(DataFetchError::Decode(
                "missing PGCOPY signature".to_string(),
            ));
        }
        let flags = read_i32(&buf[11..15]);
        if flags & (1 << 16) != 0 {
            return Err(DataFetchError::Decode(
                "COPY stream with OIDs is not supported".to_string(),
            ));
        }
        let extension_len = read_i32(&buf[15..19]);
        if extension_len < 0 {
            return Err(DataFetchError::Decode(
                "negative header extension length".to_string(),
            ));
        }
        let total = HEADER_LEN + extension_len as usize;
        if buf.len() < total {
            return Ok(None);
        }
        Ok(Some(total))
    }

    /// Decode one tuple starting at `offset`, or return `None` if it is not
    /// fully buffered yet.
    fn read_tuple(&mut self, offset: usize) -> Result<Option<usize>, DataFetchError> {
        let buf = &self.buffer[offset..];
        if buf.len() < 2 {
            return Ok(None);
        }
        let field_count = i16::from_be_bytes([buf[0], buf[1]]);
        if field_count == -1 {
            self.state = State::Done;
            return Ok(Some(2));
        }
        if field_count as usize != self.builders.len() {
            return Err(DataFetchError::Decode(format!(
                "tuple has {} fields, expected {}",
                field_count,
                self.builders.len()
            )));
        }

        // Locate every field before touching the builders so that a partial
        // tuple leaves no half-appended row behind.
        let mut fields: Vec<Option<(usize, usize)>> = Vec::with_capacity(self.builders.len());
        let mut pos = 2usize;
        for _ in 0..field_count {
            if buf.len() < pos + 4 {
                return Ok(None);
            }
            let len = read_i32(&buf[pos..pos + 4]);
            pos += 4;
            if len < 0 {
                fields.push(None);
                continue;
            }
            let len = len as usize;
            if buf.len() < pos + len {
                return Ok(None);
            }
            fields.push(Some((pos, len)));
            pos += len;
        }

        for (builder, field) in self.builders.iter_mut().zip(fields) {
            match field {
                Some((start, len)) => decode_field(builder, &buf[start..start + len])?,
                None => builder.append_null(),
            }
        }

        self.pending += 1;
        if self.pending == self.batch_size {
            let batch = self.plan.finish_batch(&mut self.builders, self.pending)?;
            self.batches.push(batch);
            self.pending = 0;
        }

        Ok(Some(pos))
    }
}

fn read_i32(bytes: &[u8]) -> i32 {
    i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn fixed<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N], DataFetchError> {
    bytes.try_into().map_err(|_| {
        DataFetchError::Decode(format!(
            "{} field has {} bytes, expected {}",
            what,
            bytes.len(),
            N
        ))
    })
}

/// Decode one non-null binary field into its column builder.
pub fn decode_field(builder: &mut ColumnBuilder, bytes: &[u8]) -> Result<(), DataFetchError> {
    match builder {
        ColumnBuilder::Boolean(b) => b.append_value(fixed::<1>(bytes, "bool")?[0] != 0),
        ColumnBuilder::Int16(b) => b.append_value(i16::from_be_bytes(fixed(bytes, "int2")?)),
        ColumnBuilder::Int32(b) => b.append_value(i32::from_be_bytes(fixed(bytes, "int4")?)),
        ColumnBuilder::Int64(b) => b.append_value(i64::from_be_bytes(fixed(bytes, "int8")?)),
        ColumnBuilder::Float32(b) => b.append_value(f32::from_be_bytes(fixed(bytes, "float4")?)),
        ColumnBuilder::Float64(b) => b.append_value(f64::from_be_bytes(fixed(bytes, "float8")?)),
        ColumnBuilder::Utf8(b) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| DataFetchError::Decode(format!("invalid utf-8 text: {}", e)))?;
            b.append_value(text)
        }
        ColumnBuilder::Binary(b) => b.append_value(bytes),
        ColumnBuilder::Date32(b) => {
            // +/-infinity are stored as i32::MAX / i32::MIN
            let days = i32::from_be_bytes(fixed(bytes, "date")?);
            b.append_option(days.checked_add(PG_EPOCH_DAYS).filter(|_| {
                days != i32::MAX && days != i32::MIN
            }))
        }
        ColumnBuilder::Time64(b) => b.append_value(i64::from_be_bytes(fixed(bytes, "time")?)),
        ColumnBuilder::Timestamp { builder, .. } => {
            let micros = i64::from_be_bytes(fixed(bytes, "timestamp")?);
            builder.append_option(
                micros
                    .checked_add(PG_EPOCH_MICROS)
                    .filter(|_| micros != i64::MAX && micros != i64::MIN),
            )
        }
    }
    Ok(())
}
