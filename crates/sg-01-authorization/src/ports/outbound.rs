//! Outbound (Driven) ports for the Authorization Gate.
//!
//! An external authorization engine hands out one pre-authorizer and one
//! authorizer per user. Both are consulted for the lifetime of a session and
//! never replaced while it lives.

use crate::domain::PreAuth;
use shared_types::{ModelIdentity, PermissionLevel, UserInfo};
use std::sync::Arc;

/// Coarse checks answered without looking at the twin.
pub trait PreAuthorizer: Send + Sync {
    fn pre_auth_provider(&self, level: PermissionLevel, provider: &str) -> PreAuth;

    fn pre_auth_service(&self, level: PermissionLevel, provider: &str, service: &str) -> PreAuth;

    fn pre_auth_resource(
        &self,
        level: PermissionLevel,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> PreAuth;
}

/// Fine-grained checks.
///
/// `model` is the identity of the provider's model, or `None` when the
/// target does not exist. Implementations must not be able to tell a missing
/// target from an existing one of unknown model through anything but `model`.
pub trait Authorizer: Send + Sync {
    fn has_provider_permission(
        &self,
        level: PermissionLevel,
        model: Option<&ModelIdentity>,
        provider: &str,
    ) -> bool;

    fn has_service_permission(
        &self,
        level: PermissionLevel,
        model: Option<&ModelIdentity>,
        provider: &str,
        service: &str,
    ) -> bool;

    fn has_resource_permission(
        &self,
        level: PermissionLevel,
        model: Option<&ModelIdentity>,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> bool;
}

/// Source of per-user authorizers.
///
/// Returning `None` means "no opinion": the session falls back to the
/// configured default policy for that half.
pub trait AuthorizationEngine: Send + Sync {
    fn create_pre_authorizer(&self, user: &UserInfo) -> Option<Arc<dyn PreAuthorizer>>;

    fn create_authorizer(&self, user: &UserInfo) -> Option<Arc<dyn Authorizer>>;
}
