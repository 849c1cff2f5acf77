//! # Configuration
//!
//! Layered settings for the ORM runtime, loaded with the `config` crate: built-in
//! defaults, then an optional settings file (any format `config` understands, chosen
//! by extension), then environment variables prefixed `RESOURCE_ORM__` with `__`
//! separating nested keys, e.g. `RESOURCE_ORM__DATABASE__MAX_CONNECTIONS=20`.
//! `DATABASE_URL`, when set, overrides the database URL last.

use crate::constants::{DEFAULT_BASELINE_ROWS, DEFAULT_REDUCTION_FACTOR, DEFAULT_SMALL_IN_THRESHOLD};
use crate::error::{OrmError, OrmResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

const ENV_PREFIX: &str = "RESOURCE_ORM";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrmConfig {
    pub database: DatabaseConfig,
    pub optimizer: OptimizerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/resource_orm_development".to_string(),
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_seconds: 30,
        }
    }
}

/// Tuning for the cost model and rewrite passes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Rows assumed for an unfiltered table scan
    pub baseline_rows: f64,
    /// Row reduction credited per equality/IN condition
    pub reduction_factor: f64,
    /// IN-lists up to this length count as highly selective
    pub small_in_threshold: usize,
    pub reorder_predicates: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            baseline_rows: DEFAULT_BASELINE_ROWS,
            reduction_factor: DEFAULT_REDUCTION_FACTOR,
            small_in_threshold: DEFAULT_SMALL_IN_THRESHOLD,
            reorder_predicates: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; falls back to `RUST_LOG`, then a per-environment level
    pub level: Option<String>,
    pub format: LogFormat,
}

impl OrmConfig {
    /// Defaults overlaid with `RESOURCE_ORM__*` variables and `DATABASE_URL`.
    pub fn from_env() -> OrmResult<Self> {
        Self::build(None)
    }

    /// Defaults, then the file at `path` if it exists, then the environment.
    pub fn load(path: impl AsRef<Path>) -> OrmResult<Self> {
        Self::build(Some(path.as_ref()))
    }

    fn build(path: Option<&Path>) -> OrmResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        let mut config: OrmConfig = settings.try_deserialize()?;
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OrmResult<()> {
        let invalid = |message: &str| Err(OrmError::Configuration(message.to_string()));

        if self.database.url.trim().is_empty() {
            return invalid("database.url must not be empty");
        }
        if self.database.max_connections == 0 {
            return invalid("database.max_connections must be at least 1");
        }
        if self.database.min_connections > self.database.max_connections {
            return invalid("database.min_connections must not exceed max_connections");
        }
        if !(self.optimizer.baseline_rows > 0.0) {
            return invalid("optimizer.baseline_rows must be positive");
        }
        if !(self.optimizer.reduction_factor >= 1.0) {
            return invalid("optimizer.reduction_factor must be at least 1");
        }
        Ok(())
    }
}
