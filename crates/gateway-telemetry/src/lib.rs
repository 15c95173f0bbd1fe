//! # Gateway Telemetry
//!
//! Logging initialisation and Prometheus metrics for the sensor gateway.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(&TelemetryConfig::from_env()).expect("telemetry");
//!     // Sessions, deliveries and denials are now logged and counted.
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SG_SERVICE_NAME` | `sensor-gateway` | Service name in logs |
//! | `SG_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `SG_JSON_LOGS` | `false` | JSON log lines |
//! | `SG_METRICS` | `true` | Register Prometheus metrics |

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging, LoggingGuard};
pub use metrics::{
    gather_metrics, register_metrics, MetricsHandle, CALLBACKS_STOPPED, NOTIFICATIONS_DELIVERED,
    NOTIFICATIONS_DENIED, SESSIONS_ACTIVE, SESSIONS_CREATED, SESSIONS_EXPIRED,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Keeps telemetry active.
#[derive(Debug)]
pub struct TelemetryGuard {
    _logging: LoggingGuard,
    metrics: Option<MetricsHandle>,
}

impl TelemetryGuard {
    pub fn metrics(&self) -> Option<&MetricsHandle> {
        self.metrics.as_ref()
    }
}

impl std::fmt::Debug for MetricsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MetricsHandle")
    }
}

/// Initialize logging, then metrics when enabled.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let logging = init_logging(config)?;
    let metrics = if config.metrics_enabled {
        Some(register_metrics()?)
    } else {
        None
    };
    Ok(TelemetryGuard {
        _logging: logging,
        metrics,
    })
}
