//! Authorization domain entities.

use serde::{Deserialize, Serialize};
use shared_types::{LifecycleStatus, NotificationEvent, PermissionLevel};
use std::fmt;

/// Coarse decision taken without resolving the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreAuth {
    Allow,
    Deny,
    /// Defer to the fine-grained check, which needs the target's model.
    Unknown,
}

/// Policy applied when no authorization engine provides an authorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefaultAuthPolicy {
    AllowAll,
    #[default]
    DenyAll,
    /// Authenticated users get everything, the others nothing.
    AuthenticatedOnly,
}

impl std::str::FromStr for DefaultAuthPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALLOW_ALL" => Ok(Self::AllowAll),
            "DENY_ALL" => Ok(Self::DenyAll),
            "AUTHENTICATED_ONLY" => Ok(Self::AuthenticatedOnly),
            other => Err(format!("unknown authorization policy: {other}")),
        }
    }
}

/// Level of the twin hierarchy a check applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessTarget<'a> {
    Provider(&'a str),
    Service(&'a str, &'a str),
    Resource(&'a str, &'a str, &'a str),
}

impl<'a> AccessTarget<'a> {
    pub fn provider(&self) -> &'a str {
        match *self {
            Self::Provider(p) | Self::Service(p, _) | Self::Resource(p, _, _) => p,
        }
    }
}

impl fmt::Display for AccessTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider(p) => write!(f, "{p}"),
            Self::Service(p, s) => write!(f, "{p}/{s}"),
            Self::Resource(p, s, r) => write!(f, "{p}/{s}/{r}"),
        }
    }
}

/// Result of filtering one notification for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    Allow,
    Deny,
    /// Lifecycle status without a permission mapping; never delivered.
    Unrecognized,
}

impl GateVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// The permission a notification requires before it may be revealed.
///
/// | Notification                    | Level      | Target   |
/// |---------------------------------|------------|----------|
/// | Lifecycle `PROVIDER_*`          | `DESCRIBE` | provider |
/// | Lifecycle `SERVICE_*`           | `DESCRIBE` | service  |
/// | Lifecycle `RESOURCE_*`          | `DESCRIBE` | resource |
/// | Data, Metadata                  | `READ`     | resource |
/// | Action                          | `ACT`      | resource |
///
/// Returns `None` for lifecycle statuses outside the table.
pub fn required_permission(event: &NotificationEvent) -> Option<(PermissionLevel, AccessTarget<'_>)> {
    let header = event.header();
    let provider = header.provider.as_str();
    let service = header.service_name();
    let resource = header.resource_name();

    match event {
        NotificationEvent::Lifecycle(lifecycle) => match lifecycle.status {
            LifecycleStatus::ProviderCreated | LifecycleStatus::ProviderDeleted => {
                Some((PermissionLevel::Describe, AccessTarget::Provider(provider)))
            }
            LifecycleStatus::ServiceCreated | LifecycleStatus::ServiceDeleted => Some((
                PermissionLevel::Describe,
                AccessTarget::Service(provider, service),
            )),
            LifecycleStatus::ResourceCreated | LifecycleStatus::ResourceDeleted => Some((
                PermissionLevel::Describe,
                AccessTarget::Resource(provider, service, resource),
            )),
            LifecycleStatus::Unrecognized => None,
        },
        NotificationEvent::Data(_) | NotificationEvent::Metadata(_) => Some((
            PermissionLevel::Read,
            AccessTarget::Resource(provider, service, resource),
        )),
        NotificationEvent::Action(_) => Some((
            PermissionLevel::Act,
            AccessTarget::Resource(provider, service, resource),
        )),
    }
}
