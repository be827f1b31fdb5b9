pub mod config;
pub mod database;
pub mod datafetch;
pub mod engine;
pub mod http;
pub mod ingest;
pub mod source;
pub mod storage;
pub use engine::TransferEngine;
pub use source::Source;
