//! Session domain entities: subscription ids and twin snapshots.

use serde::{Deserialize, Serialize};
use shared_types::{ModelIdentity, ResourcePath, ResourceType, TimedValue};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Opaque identifier returned by `add_listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Snapshot of a resource as seen by the twin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescription {
    pub path: ResourcePath,
    pub model: Option<ModelIdentity>,
    pub resource_type: ResourceType,
    pub value: TimedValue,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Snapshot of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescription {
    pub provider: String,
    pub service: String,
    pub model: Option<ModelIdentity>,
    pub resources: Vec<String>,
}

/// Snapshot of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescription {
    pub provider: String,
    pub model: Option<ModelIdentity>,
    pub services: Vec<String>,
}

/// Anything carrying the model identity the fine-grained check needs.
pub(crate) trait Modelled {
    fn model(&self) -> Option<&ModelIdentity>;
}

impl Modelled for ResourceDescription {
    fn model(&self) -> Option<&ModelIdentity> {
        self.model.as_ref()
    }
}

impl Modelled for ServiceDescription {
    fn model(&self) -> Option<&ModelIdentity> {
        self.model.as_ref()
    }
}

impl Modelled for ProviderDescription {
    fn model(&self) -> Option<&ModelIdentity> {
        self.model.as_ref()
    }
}

/// Outcome of one liveness sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivenessReport {
    /// Sessions close to expiry whose checker was asked.
    pub probed: usize,
    /// Sessions found active and extended.
    pub extended: usize,
}
