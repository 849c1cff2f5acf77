//! # Structured Logging Module
//!
//! Environment-aware `tracing` setup plus small helpers for the events the query
//! and CRUD layers emit. Installing the subscriber is optional: libraries embedding
//! this crate usually bring their own, in which case the helpers simply feed it.

use crate::config::{LogFormat, LoggingConfig};
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install a global subscriber once; later calls are no-ops.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = match &config.level {
            Some(level) => EnvFilter::new(level),
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment))),
        };

        let registry = tracing_subscriber::registry().with(filter);
        let result = match config.format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_target(true).with_current_span(true))
                .try_init(),
            LogFormat::Pretty => registry
                .with(fmt::layer().with_target(true).with_level(true))
                .try_init(),
        };

        if result.is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            format = ?config.format,
            "Structured logging initialized"
        );
    });
}

/// Current environment from `RESOURCE_ORM_ENV` or `APP_ENV`
pub fn get_environment() -> String {
    std::env::var("RESOURCE_ORM_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Default log level for an environment
pub fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        "test" => "warn",
        _ => "debug",
    }
}

/// Rendered statement about to be sent to the database
pub fn log_query(resource: &str, sql: &str, arg_count: usize) {
    tracing::debug!(
        resource = %resource,
        sql = %sql,
        args = arg_count,
        "QUERY"
    );
}

/// Outcome of a CRUD pipeline
pub fn log_operation(operation: &str, resource: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        resource = %resource,
        status = %status,
        details = details,
        "OPERATION"
    );
}
