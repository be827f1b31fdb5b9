use datafusion::arrow::datatypes::{Schema, SchemaRef};
use datafusion::arrow::record_batch::{RecordBatch, RecordBatchOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::arrow_convert::ColumnBuilder;
use super::DataFetchError;

/// Row/column/schema summary reported for every transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub num_rows: usize,
    pub num_columns: usize,
    /// Field name to Arrow type name
    pub schema: BTreeMap<String, String>,
}

impl TableMetadata {
    pub fn from_schema(schema: &Schema, num_rows: usize) -> Self {
        Self {
            num_rows,
            num_columns: schema.fields().len(),
            schema: schema
                .fields()
                .iter()
                .map(|f| (f.name().clone(), f.data_type().to_string()))
                .collect(),
        }
    }
}

/// A table materialized as Arrow record batches.
#[derive(Debug, Clone)]
pub struct FetchedTable {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl FetchedTable {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    pub fn metadata(&self) -> TableMetadata {
        TableMetadata::from_schema(&self.schema, self.num_rows())
    }
}

/// A `SELECT` over one table with the projection needed to decode every
/// column into its Arrow type.
#[derive(Debug, Clone)]
pub struct SelectPlan {
    pub schema: SchemaRef,
    projection: String,
    from: String,
}

impl SelectPlan {
    pub fn new(schema: SchemaRef, projection: String, from: String) -> Self {
        Self {
            schema,
            projection,
            from,
        }
    }

    /// Quoted table reference the plan reads from.
    pub fn table_ref(&self) -> &str {
        &self.from
    }

    pub fn sql(&self, filter: Option<&str>) -> String {
        let projection = if self.projection.is_empty() {
            "*"
        } else {
            &self.projection
        };
        match filter {
            Some(filter) => format!(
                "SELECT {} FROM {} WHERE {}",
                projection, self.from, filter
            ),
            None => format!("SELECT {} FROM {}", projection, self.from),
        }
    }

    pub fn builders(&self, capacity: usize) -> Result<Vec<ColumnBuilder>, DataFetchError> {
        self.schema
            .fields()
            .iter()
            .map(|f| ColumnBuilder::new(f.data_type(), capacity))
            .collect()
    }

    /// Drain the builders into a batch holding `rows` rows.
    pub fn finish_batch(
        &self,
        builders: &mut [ColumnBuilder],
        rows: usize,
    ) -> Result<RecordBatch, DataFetchError> {
        let columns = builders.iter_mut().map(|b| b.finish()).collect();
        let options = RecordBatchOptions::new().with_row_count(Some(rows));
        Ok(RecordBatch::try_new_with_options(
            self.schema.clone(),
            columns,
            &options,
        )?)
    }
}
