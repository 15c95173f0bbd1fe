//! Telemetry configuration from environment variables.

use std::env;

/// Logging and metrics settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log filter directive (trace, debug, info, warn, error, or an `EnvFilter` expression)
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether gateway metrics are registered
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "sensor-gateway".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SG_SERVICE_NAME`: Service name (default: sensor-gateway)
    /// - `SG_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `SG_JSON_LOGS`: Enable JSON logs (default: false outside containers)
    /// - `SG_METRICS`: Register Prometheus metrics (default: true)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("SG_SERVICE_NAME")
                .unwrap_or_else(|_| "sensor-gateway".to_string()),

            log_level: env::var("SG_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("SG_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            metrics_enabled: env::var("SG_METRICS")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),
        }
    }

    /// Same settings with a different log filter.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}
