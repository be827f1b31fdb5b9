use axum::{extract::State, Json};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::engine::{EngineError, TransferEngine, TransferOutcome};
use crate::http::error::ApiError;
use crate::http::models::{
    CopyTableRequest, ExportDataRequest, HealthResponse, LoadDataRequest, TransferResponse,
};

/// Run an engine operation, timing it and converting failures to 500s.
async fn timed<F>(operation: &str, work: F) -> Result<Json<TransferResponse>, ApiError>
where
    F: Future<Output = Result<TransferOutcome, EngineError>>,
{
    let start = Instant::now();
    match work.await {
        Ok(outcome) => {
            let elapsed = start.elapsed();
            tracing::info!("{} completed in {}ms", operation, elapsed.as_millis());
            Ok(Json(TransferResponse::new(outcome, elapsed.as_secs_f64())))
        }
        Err(e) => {
            tracing::warn!("{} failed: {}", operation, e);
            Err(e.into())
        }
    }
}

/// Handler for POST /load-data/
pub async fn load_data_handler(
    State(engine): State<Arc<TransferEngine>>,
    Json(request): Json<LoadDataRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    timed("load-data", engine.load_data(&request)).await
}

/// Handler for POST /export-data/
pub async fn export_data_handler(
    State(engine): State<Arc<TransferEngine>>,
    Json(request): Json<ExportDataRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    timed("export-data", engine.export_data(&request)).await
}

/// Handler for POST /export-parallel/
pub async fn export_parallel_handler(
    State(engine): State<Arc<TransferEngine>>,
    Json(request): Json<ExportDataRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    timed("export-parallel", engine.export_parallel(&request)).await
}

/// Handler for POST /export-copy/
pub async fn export_copy_handler(
    State(engine): State<Arc<TransferEngine>>,
    Json(request): Json<ExportDataRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    timed("export-copy", engine.export_copy(&request)).await
}

/// Handler for POST /direct-load/
pub async fn direct_load_handler(
    State(engine): State<Arc<TransferEngine>>,
    Json(request): Json<CopyTableRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    timed("direct-load", engine.copy_table(&request)).await
}

/// Handler for POST /copy-parallel/
pub async fn copy_parallel_handler(
    State(engine): State<Arc<TransferEngine>>,
    Json(request): Json<CopyTableRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    timed("copy-parallel", engine.copy_table_parallel(&request)).await
}

/// Handler for POST /generate-test-data/
pub async fn generate_test_data_handler(
    State(engine): State<Arc<TransferEngine>>,
) -> Result<Json<TransferResponse>, ApiError> {
    timed("generate-test-data", engine.generate_test_data()).await
}

/// Handler for GET /health
pub async fn health_handler(
    State(engine): State<Arc<TransferEngine>>,
) -> Result<Json<HealthResponse>, ApiError> {
    engine.check_health().await.map_err(|e| {
        tracing::warn!("health check failed: {}", e);
        ApiError::service_unavailable(e.to_string())
    })?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}
