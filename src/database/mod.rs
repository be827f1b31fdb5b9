mod dialect;
mod manager;

pub use dialect::{Dialect, PostgresDialect, SqliteDialect};
pub use manager::{DatabaseManager, DatabaseRole, DatabaseSelector, DbPool};
