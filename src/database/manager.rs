use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{PgPool, SqlitePool};
use std::str::FromStr;

use crate::datafetch::DataFetchError;
use crate::source::Source;

/// Connection pool for one of the supported backends.
#[derive(Debug, Clone)]
pub enum DbPool {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl DbPool {
    /// Create a pool without opening any connection yet.
    pub fn connect_lazy(source: &Source, max_connections: u32) -> Result<Self, DataFetchError> {
        match source {
            Source::Postgres { .. } => {
                let pool = PgPoolOptions::new()
                    .max_connections(max_connections)
                    .connect_lazy(&source.connection_uri())?;
                Ok(DbPool::Postgres(pool))
            }
            Source::Sqlite { dbname } => {
                let options = SqliteConnectOptions::new()
                    .filename(dbname)
                    .create_if_missing(true);
                let pool = SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .connect_lazy_with(options);
                Ok(DbPool::Sqlite(pool))
            }
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            DbPool::Postgres(_) => "postgres",
            DbPool::Sqlite(_) => "sqlite",
        }
    }

    /// Run a trivial query to prove the database is reachable.
    pub async fn check_health(&self) -> Result<(), DataFetchError> {
        match self {
            DbPool::Postgres(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            DbPool::Sqlite(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
        }
        Ok(())
    }
}

/// The two configured databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseRole {
    Source,
    Target,
}

/// How a request names its database: by role, or by backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseSelector {
    Source,
    Target,
    Postgres,
    Sqlite,
}

impl FromStr for DatabaseSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "source" => Ok(DatabaseSelector::Source),
            "target" => Ok(DatabaseSelector::Target),
            "postgres" | "postgresql" => Ok(DatabaseSelector::Postgres),
            "sqlite" => Ok(DatabaseSelector::Sqlite),
            other => Err(format!(
                "Invalid database '{}'. Use 'source', 'target', 'postgres' or 'sqlite'.",
                other
            )),
        }
    }
}

/// Holds one pool per configured role.
#[derive(Debug, Clone)]
pub struct DatabaseManager {
    source: DbPool,
    target: DbPool,
}

impl DatabaseManager {
    pub fn new(source: DbPool, target: DbPool) -> Self {
        Self { source, target }
    }

    pub fn from_sources(
        source: &Source,
        target: &Source,
        max_connections: u32,
    ) -> Result<Self, DataFetchError> {
        Ok(Self::new(
            DbPool::connect_lazy(source, max_connections)?,
            DbPool::connect_lazy(target, max_connections)?,
        ))
    }

    pub fn get(&self, role: DatabaseRole) -> &DbPool {
        match role {
            DatabaseRole::Source => &self.source,
            DatabaseRole::Target => &self.target,
        }
    }

    /// Resolve a selector to a role. Backend selectors pick the first role
    /// (source, then target) configured with that backend.
    pub fn resolve(&self, selector: DatabaseSelector) -> Result<DatabaseRole, DataFetchError> {
        let backend = match selector {
            DatabaseSelector::Source => return Ok(DatabaseRole::Source),
            DatabaseSelector::Target => return Ok(DatabaseRole::Target),
            DatabaseSelector::Postgres => "postgres",
            DatabaseSelector::Sqlite => "sqlite",
        };

        [DatabaseRole::Source, DatabaseRole::Target]
            .into_iter()
            .find(|role| self.get(*role).backend() == backend)
            .ok_or_else(|| {
                DataFetchError::UnsupportedDriver(format!(
                    "no database configured for backend {}",
                    backend
                ))
            })
    }

    pub fn select(&self, selector: DatabaseSelector) -> Result<&DbPool, DataFetchError> {
        Ok(self.get(self.resolve(selector)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite(path: &str) -> Source {
        Source::Sqlite {
            dbname: path.to_string(),
        }
    }

    fn postgres() -> Source {
        Source::Postgres {
            host: "localhost".to_string(),
            port: 5432,
            user: "u".to_string(),
            password: "p".to_string(),
            dbname: "d".to_string(),
        }
    }

    #[test]
    fn selector_parses_roles_and_backends() {
        assert_eq!(
            "SOURCE".parse::<DatabaseSelector>().unwrap(),
            DatabaseSelector::Source
        );
        assert_eq!(
            "postgresql".parse::<DatabaseSelector>().unwrap(),
            DatabaseSelector::Postgres
        );
        assert!("mysql".parse::<DatabaseSelector>().is_err());
    }

    #[tokio::test]
    async fn resolve_backend_prefers_source() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.db");
        let b = dir.path().join("b.db");
        let manager = DatabaseManager::from_sources(
            &sqlite(a.to_str().unwrap()),
            &sqlite(b.to_str().unwrap()),
            2,
        )
        .unwrap();

        assert_eq!(
            manager.resolve(DatabaseSelector::Sqlite).unwrap(),
            DatabaseRole::Source
        );
        assert_eq!(
            manager.resolve(DatabaseSelector::Target).unwrap(),
            DatabaseRole::Target
        );
        let err = manager.resolve(DatabaseSelector::Postgres).unwrap_err();
        assert!(err.to_string().contains("no database configured for backend postgres"));
    }

    #[tokio::test]
    async fn resolve_backend_falls_back_to_target() {
        let dir = tempfile::tempdir().unwrap();
        let b = dir.path().join("b.db");
        let manager =
            DatabaseManager::from_sources(&postgres(), &sqlite(b.to_str().unwrap()), 2).unwrap();

        assert_eq!(
            manager.resolve(DatabaseSelector::Sqlite).unwrap(),
            DatabaseRole::Target
        );
        assert_eq!(
            manager.resolve(DatabaseSelector::Postgres).unwrap(),
            DatabaseRole::Source
        );
    }

    #[tokio::test]
    async fn sqlite_health_check_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("health.db");
        let pool = DbPool::connect_lazy(&sqlite(path.to_str().unwrap()), 1).unwrap();

        pool.check_health().await.unwrap();
        assert!(path.exists());
    }
}
