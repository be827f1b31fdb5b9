use serde::{Deserialize, Serialize};

use crate::datafetch::TableMetadata;
use crate::engine::TransferOutcome;

pub use crate::engine::{CopyTableRequest, ExportDataRequest, LoadDataRequest};

/// Response envelope shared by every transfer endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResponse {
    pub status: String,
    /// Wall-clock seconds spent in the operation
    pub time_taken: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TableMetadata>,
}

impl TransferResponse {
    pub fn new(outcome: TransferOutcome, time_taken: f64) -> Self {
        Self {
            status: outcome.status,
            time_taken,
            metadata: outcome.metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
