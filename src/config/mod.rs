//! Application configuration loaded from a YAML file.
//!
//! Values from the file can be overridden with `ARROWHAUL__`-prefixed
//! environment variables, e.g. `ARROWHAUL__SERVER__PORT=9090`.

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use crate::source::Source;

const ENV_PREFIX: &str = "ARROWHAUL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub local: LocalConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    /// Root directory every request path is resolved against.
    pub base_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub source: Source,
    pub target: Source,
}

/// Tuning for the extraction paths.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_partition_num")]
    pub partition_num: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            partition_num: default_partition_num(),
            batch_size: default_batch_size(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_partition_num() -> usize {
    10
}

fn default_batch_size() -> usize {
    8192
}

fn default_max_connections() -> u32 {
    10
}

impl AppConfig {
    /// Load configuration from a file path, layering environment overrides on top.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Parse configuration from an in-memory YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local.base_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("local.base_dir must not be empty".into()));
        }
        if self.extraction.partition_num == 0 {
            return Err(ConfigError::Invalid(
                "extraction.partition_num must be at least 1".into(),
            ));
        }
        if self.extraction.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "extraction.batch_size must be at least 1".into(),
            ));
        }
        if self.extraction.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "extraction.max_connections must be at least 1".into(),
            ));
        }

        validate_source("database.source", &self.database.source)?;
        validate_source("database.target", &self.database.target)?;

        Ok(())
    }
}

fn validate_source(key: &str, source: &Source) -> Result<(), ConfigError> {
    match source {
        Source::Postgres { host, dbname, .. } => {
            if host.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{}.host must not be empty", key)));
            }
            if dbname.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{}.dbname must not be empty",
                    key
                )));
            }
        }
        Source::Sqlite { dbname } => {
            if dbname.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{}.dbname must be a sqlite file path",
                    key
                )));
            }
        }
    }
    Ok(())
}
