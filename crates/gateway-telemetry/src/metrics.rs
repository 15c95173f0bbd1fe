//! Prometheus metrics for the sensor gateway.
//!
//! All metrics follow the naming convention: `sg_<area>_<metric>[_total]`
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `sg_sessions_active` | gauge | |
//! | `sg_sessions_created_total` | counter | |
//! | `sg_sessions_expired_total` | counter | |
//! | `sg_notifications_delivered_total` | counter | `kind` |
//! | `sg_notifications_denied_total` | counter | `kind` |
//! | `sg_callbacks_stopped_total` | counter | |

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

use crate::TelemetryError;

lazy_static! {
    /// Gateway metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // SESSION METRICS
    // =========================================================================

    /// Sessions currently held by the session store
    pub static ref SESSIONS_ACTIVE: IntGauge = IntGauge::new(
        "sg_sessions_active",
        "Number of sessions held by the session store"
    ).expect("metric creation failed");

    /// Sessions created
    pub static ref SESSIONS_CREATED: IntCounter = IntCounter::new(
        "sg_sessions_created_total",
        "Total number of sessions created"
    ).expect("metric creation failed");

    /// Sessions that transitioned to expired
    pub static ref SESSIONS_EXPIRED: IntCounter = IntCounter::new(
        "sg_sessions_expired_total",
        "Total number of sessions expired, explicitly or by lapse"
    ).expect("metric creation failed");

    // =========================================================================
    // NOTIFICATION METRICS
    // =========================================================================

    /// Notifications handed to a listener callback
    pub static ref NOTIFICATIONS_DELIVERED: IntCounterVec = IntCounterVec::new(
        Opts::new("sg_notifications_delivered_total", "Notifications handed to listener callbacks"),
        &["kind"]
    ).expect("metric creation failed");

    /// Notifications dropped by the authorization gate
    pub static ref NOTIFICATIONS_DENIED: IntCounterVec = IntCounterVec::new(
        Opts::new("sg_notifications_denied_total", "Notifications dropped by the authorization gate"),
        &["kind"]
    ).expect("metric creation failed");

    /// Callbacks stopped (explicitly, by timeout or by error policy)
    pub static ref CALLBACKS_STOPPED: IntCounter = IntCounter::new(
        "sg_callbacks_stopped_total",
        "Total number of listener callbacks stopped"
    ).expect("metric creation failed");
}

/// Handle on the registry holding the gateway metrics.
#[derive(Clone)]
pub struct MetricsHandle {
    registry: Registry,
}

impl MetricsHandle {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Registers all gateway metrics. Safe to call more than once.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();

    REGISTERED
        .get_or_init(|| {
            let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
                Box::new(SESSIONS_ACTIVE.clone()),
                Box::new(SESSIONS_CREATED.clone()),
                Box::new(SESSIONS_EXPIRED.clone()),
                Box::new(NOTIFICATIONS_DELIVERED.clone()),
                Box::new(NOTIFICATIONS_DENIED.clone()),
                Box::new(CALLBACKS_STOPPED.clone()),
            ];
            for metric in metrics {
                REGISTRY.register(metric).map_err(|e| e.to_string())?;
            }
            Ok(())
        })
        .clone()
        .map_err(TelemetryError::MetricsInit)?;

    Ok(MetricsHandle {
        registry: REGISTRY.clone(),
    })
}

/// Encode all gateway metrics in the Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let handle = register_metrics()?;
    let encoder = TextEncoder::new();
    let metric_families = handle.registry().gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
