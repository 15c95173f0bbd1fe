//! Session manager configuration with validation.

use serde::{Deserialize, Serialize};
use sg_01_authorization::DefaultAuthPolicy;
use shared_bus::{DeliveryMode, ErrorPolicy, DEFAULT_SHUTDOWN_GRACE_MS};
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Threshold used when the configured one is zero.
pub const DEFAULT_ACTIVITY_THRESHOLD_SECS: u64 = 10;

/// Session store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionManagerConfig {
    /// Session time to live in seconds. `0` means sessions never lapse.
    pub expiry_secs: u64,
    /// Period of the activity checker. `0` disables it.
    pub activity_check_interval_secs: u64,
    /// Sessions expiring within this window are probed.
    pub activity_check_threshold_secs: u64,
    /// Extension granted to active sessions. Defaults to `expiry_secs`.
    pub activity_check_extension_secs: Option<u64>,
    /// Policy used when no engine provides an authorizer
    pub auth_policy: DefaultAuthPolicy,
    /// Default delivery mode of listener callbacks
    pub delivery: DeliveryMode,
    /// Default error policy of listener callbacks
    pub callback_error_policy: ErrorPolicy,
    /// Grace period granted to buffered callbacks on shutdown
    pub shutdown_grace_ms: u64,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            expiry_secs: 600,
            activity_check_interval_secs: 60,
            activity_check_threshold_secs: DEFAULT_ACTIVITY_THRESHOLD_SECS,
            activity_check_extension_secs: None,
            auth_policy: DefaultAuthPolicy::DenyAll,
            delivery: DeliveryMode::Direct,
            callback_error_policy: ErrorPolicy::Continue,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

impl SessionManagerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `SG_SESSION_EXPIRY` | `expiry_secs` |
    /// | `SG_ACTIVITY_CHECK_INTERVAL` | `activity_check_interval_secs` |
    /// | `SG_ACTIVITY_CHECK_THRESHOLD` | `activity_check_threshold_secs` |
    /// | `SG_ACTIVITY_CHECK_EXTENSION` | `activity_check_extension_secs` |
    /// | `SG_AUTH_POLICY` | `auth_policy` |
    /// | `SG_DELIVERY_BUFFER` | `delivery` (buffered with this capacity) |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            expiry_secs: env_parse("SG_SESSION_EXPIRY")?.unwrap_or(defaults.expiry_secs),
            activity_check_interval_secs: env_parse("SG_ACTIVITY_CHECK_INTERVAL")?
                .unwrap_or(defaults.activity_check_interval_secs),
            activity_check_threshold_secs: env_parse("SG_ACTIVITY_CHECK_THRESHOLD")?
                .unwrap_or(defaults.activity_check_threshold_secs),
            activity_check_extension_secs: env_parse("SG_ACTIVITY_CHECK_EXTENSION")?,
            auth_policy: env_parse("SG_AUTH_POLICY")?.unwrap_or(defaults.auth_policy),
            delivery: env_parse::<usize>("SG_DELIVERY_BUFFER")?
                .map_or(defaults.delivery, |capacity| DeliveryMode::Buffered { capacity }),
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let DeliveryMode::Buffered { capacity: 0 } = self.delivery {
            return Err(ConfigError::InvalidDelivery(
                "buffered capacity cannot be 0".into(),
            ));
        }
        if self.activity_check_extension_secs == Some(0) {
            return Err(ConfigError::InvalidActivityCheck(
                "extension cannot be 0".into(),
            ));
        }
        Ok(())
    }

    /// Session time to live, `None` when sessions never lapse.
    pub fn session_ttl(&self) -> Option<chrono::Duration> {
        match self.expiry_secs {
            0 => None,
            secs => Some(seconds(secs)),
        }
    }

    /// Period of the activity checker, `None` when it is disabled.
    ///
    /// An interval that does not fit inside the session time to live could
    /// never save a session, so it disables the checker as well.
    pub fn activity_check_interval(&self) -> Option<std::time::Duration> {
        if self.expiry_secs == 0 || self.activity_check_interval_secs == 0 {
            return None;
        }
        if self.activity_check_interval_secs >= self.expiry_secs {
            return None;
        }
        Some(std::time::Duration::from_secs(
            self.activity_check_interval_secs,
        ))
    }

    /// True when an interval is configured but cannot be used.
    pub fn activity_check_misconfigured(&self) -> bool {
        self.expiry_secs > 0
            && self.activity_check_interval_secs > 0
            && self.activity_check_interval_secs >= self.expiry_secs
    }

    pub fn activity_check_threshold(&self) -> chrono::Duration {
        match self.activity_check_threshold_secs {
            0 => seconds(DEFAULT_ACTIVITY_THRESHOLD_SECS),
            secs => seconds(secs),
        }
    }

    pub fn activity_check_extension(&self) -> chrono::Duration {
        match self.activity_check_extension_secs {
            Some(secs) if secs > 0 => seconds(secs),
            _ => seconds(self.expiry_secs),
        }
    }

    pub fn shutdown_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Saturates at `TimeDelta::MAX`; expiry arithmetic clamps to `MAX_UTC` from there.
fn seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

fn env_parse<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidVariable {
                name,
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Invalid delivery configuration
    #[error("invalid delivery: {0}")]
    InvalidDelivery(String),
    /// Invalid activity checker configuration
    #[error("invalid activity check: {0}")]
    InvalidActivityCheck(String),
    /// An environment variable could not be parsed
    #[error("invalid value for {name}: {reason}")]
    InvalidVariable { name: &'static str, reason: String },
}
