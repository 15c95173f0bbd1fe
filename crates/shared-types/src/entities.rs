//! # Core Domain Entities
//!
//! Identity and addressing types shared by every gateway subsystem.
//!
//! ## Clusters
//!
//! - **Identity**: `UserInfo`
//! - **Addressing**: `ResourcePath`, `ModelIdentity`
//! - **Access**: `PermissionLevel`
//! - **Values**: `TimedValue`, `ResourceType`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// User identifier used for sessions created without authentication.
pub const ANONYMOUS_USER_ID: &str = "<ANONYMOUS>";

/// The identity handed to session creation by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserInfo {
    /// Stable user identifier.
    pub user_id: String,
    /// Whether the identity was produced by a successful authentication.
    pub authenticated: bool,
    /// Groups the user belongs to, as reported by the authentication layer.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl UserInfo {
    /// An authenticated user.
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            authenticated: true,
            groups: Vec::new(),
        }
    }

    /// An identity that did not go through authentication.
    pub fn unauthenticated(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            authenticated: false,
            groups: Vec::new(),
        }
    }

    /// The shared anonymous identity.
    pub fn anonymous() -> Self {
        Self::unauthenticated(ANONYMOUS_USER_ID)
    }

    /// Adds a group membership.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id == ANONYMOUS_USER_ID
    }

    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

// =============================================================================
// CLUSTER B: ADDRESSING
// =============================================================================

/// Identity of the model a provider was instantiated from.
///
/// Fine-grained authorizers receive it so that rules can target whole models.
/// Checks on targets that do not exist receive `None` instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelIdentity {
    /// URI of the package declaring the model.
    pub package_uri: String,
    /// Model name.
    pub model: String,
}

impl ModelIdentity {
    pub fn new(package_uri: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            package_uri: package_uri.into(),
            model: model.into(),
        }
    }
}

/// Three-level address of a resource: `provider/service/resource`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourcePath {
    pub provider: String,
    pub service: String,
    pub resource: String,
}

impl ResourcePath {
    pub fn new(
        provider: impl Into<String>,
        service: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            service: service.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.provider, self.service, self.resource)
    }
}

// =============================================================================
// CLUSTER C: ACCESS
// =============================================================================

/// Permission levels checked by authorizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    /// See that the target exists and read its description.
    Describe,
    /// Read values and metadata.
    Read,
    /// Write values and metadata.
    Update,
    /// Invoke actions.
    Act,
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Describe => "DESCRIBE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Act => "ACT",
        };
        f.write_str(name)
    }
}

// =============================================================================
// CLUSTER D: VALUES
// =============================================================================

/// Kind of resource exposed by a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Sensor,
    Property,
    State,
    Action,
}

/// A value paired with the instant it was observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedValue {
    pub value: Option<serde_json::Value>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl TimedValue {
    pub fn new(value: serde_json::Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            value: Some(value),
            timestamp: Some(timestamp),
        }
    }

    /// A resource that never received a value.
    pub fn empty() -> Self {
        Self {
            value: None,
            timestamp: None,
        }
    }
}
