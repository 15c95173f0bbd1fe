//! Structured logging.
//!
//! Every gateway crate logs through `tracing` macros with key/value fields
//! (`session_id`, `subscription_id`, `topic`, `user_id`). This module installs
//! the global subscriber: an `EnvFilter` plus either a human-readable or a JSON
//! `fmt` layer.

use crate::{TelemetryConfig, TelemetryError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Returned by [`init_logging`]; logs a line when dropped.
#[derive(Debug)]
pub struct LoggingGuard {
    service_name: String,
}

impl LoggingGuard {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Logging shut down");
    }
}

/// Builds the filter from the configured directive.
pub fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::Config(e.to_string()))
}

/// Installs the global subscriber.
///
/// Fails with [`TelemetryError::LoggingInit`] when a global subscriber is
/// already set.
pub fn init_logging(config: &TelemetryConfig) -> Result<LoggingGuard, TelemetryError> {
    let env_filter = build_filter(config)?;

    let result = if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_names(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    };
    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        level = %config.log_level,
        json = config.json_logs,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        service_name: config.service_name.clone(),
    })
}
