use crate::http::handlers::{
    copy_parallel_handler, direct_load_handler, export_copy_handler, export_data_handler,
    export_parallel_handler, generate_test_data_handler, health_handler, load_data_handler,
};
use crate::TransferEngine;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub struct AppServer {
    pub router: Router,
    pub engine: Arc<TransferEngine>,
}

pub const PATH_LOAD_DATA: &str = "/load-data/";
pub const PATH_EXPORT_DATA: &str = "/export-data/";
pub const PATH_EXPORT_PARALLEL: &str = "/export-parallel/";
pub const PATH_EXPORT_COPY: &str = "/export-copy/";
pub const PATH_DIRECT_LOAD: &str = "/direct-load/";
pub const PATH_COPY_PARALLEL: &str = "/copy-parallel/";
pub const PATH_GENERATE_TEST_DATA: &str = "/generate-test-data/";
pub const PATH_HEALTH: &str = "/health";

impl AppServer {
    pub fn new(engine: TransferEngine) -> Self {
        let engine = Arc::new(engine);
        AppServer {
            router: Router::new()
                .route(PATH_LOAD_DATA, post(load_data_handler))
                .route(PATH_EXPORT_DATA, post(export_data_handler))
                .route(PATH_EXPORT_PARALLEL, post(export_parallel_handler))
                .route(PATH_EXPORT_COPY, post(export_copy_handler))
                .route(PATH_DIRECT_LOAD, post(direct_load_handler))
                .route(PATH_COPY_PARALLEL, post(copy_parallel_handler))
                .route(PATH_GENERATE_TEST_DATA, post(generate_test_data_handler))
                .route(PATH_HEALTH, get(health_handler))
                .with_state(engine.clone()),
            engine,
        }
    }
}
