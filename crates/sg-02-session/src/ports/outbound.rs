//! Outbound (Driven) ports for the Session subsystem.
//!
//! | Port | Purpose |
//! |------|---------|
//! | `DigitalTwin` | Resolve and mutate providers, services and resources |
//! | `Clock` | Current time, replaceable in tests |
//! | `SessionActivityChecker` | Ask the transport whether a client is still there |

use crate::domain::{
    ProviderDescription, ResourceDescription, ServiceDescription, TwinError,
};
use chrono::{DateTime, Utc};
use shared_types::{ModelIdentity, ResourcePath, UserInfo};
use std::collections::HashMap;

/// Query and command interface of the digital twin.
///
/// Lookups return `None` for targets that do not exist; sessions decide what
/// the caller may learn about that.
pub trait DigitalTwin: Send + Sync {
    /// Model of an existing provider.
    fn provider_model(&self, provider: &str) -> Option<ModelIdentity>;

    fn describe_provider(&self, provider: &str) -> Option<ProviderDescription>;

    fn describe_service(&self, provider: &str, service: &str) -> Option<ServiceDescription>;

    fn describe_resource(&self, path: &ResourcePath) -> Option<ResourceDescription>;

    fn list_providers(&self) -> Vec<ProviderDescription>;

    fn set_value(
        &self,
        path: &ResourcePath,
        value: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Result<(), TwinError>;

    /// Replaces the whole metadata map of a resource.
    fn set_metadata(
        &self,
        path: &ResourcePath,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<(), TwinError>;

    fn set_metadata_value(
        &self,
        path: &ResourcePath,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), TwinError>;

    /// Invokes an action resource.
    fn act(
        &self,
        path: &ResourcePath,
        parameters: HashMap<String, serde_json::Value>,
    ) -> Result<serde_json::Value, TwinError>;
}

/// Time source for expiry computations.
///
/// Abstracted to allow testing with deterministic time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Default system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Tells whether the client behind a session is still connected.
pub trait SessionActivityChecker: Send + Sync {
    fn is_client_active(&self, session_id: &str, user: &UserInfo) -> bool;
}

impl<F> SessionActivityChecker for F
where
    F: Fn(&str, &UserInfo) -> bool + Send + Sync,
{
    fn is_client_active(&self, session_id: &str, user: &UserInfo) -> bool {
        self(session_id, user)
    }
}
