use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataFetchError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("unsupported driver: {0}")]
    UnsupportedDriver(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("arrow conversion failed: {0}")]
    Arrow(String),

    #[error("invalid partition column: {0}")]
    Partition(String),
}

impl From<sqlx::Error> for DataFetchError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Configuration(_) => DataFetchError::Connection(e.to_string()),
            _ => DataFetchError::Query(e.to_string()),
        }
    }
}

impl From<datafusion::arrow::error::ArrowError> for DataFetchError {
    fn from(e: datafusion::arrow::error::ArrowError) -> Self {
        DataFetchError::Arrow(e.to_string())
    }
}
