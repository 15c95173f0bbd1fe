//! # Session Authorizer
//!
//! The capability a session carries for its whole life. It is chosen once,
//! at session creation, from the authorization engine and the default
//! policy, and is never swapped afterwards.
//!
//! ```text
//! engine? ──no──► policy ─► AllowAll | DenyAll
//!    │
//!   yes ─► (pre, fine) from engine, missing halves filled by policy ─► Delegated
//! ```

use super::entities::{
    required_permission, AccessTarget, DefaultAuthPolicy, GateVerdict, PreAuth,
};
use super::errors::AuthorizationError;
use crate::ports::{AuthorizationEngine, Authorizer, PreAuthorizer};
use shared_types::{ModelIdentity, NotificationEvent, PermissionLevel, UserInfo};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-session authorization capability.
#[derive(Clone)]
pub enum SessionAuthorizer {
    AllowAll,
    DenyAll,
    Delegated {
        pre: Arc<dyn PreAuthorizer>,
        fine: Arc<dyn Authorizer>,
    },
}

impl SessionAuthorizer {
    /// Authorizer dictated by the default policy alone.
    pub fn for_policy(policy: DefaultAuthPolicy, user: &UserInfo) -> Self {
        match policy {
            DefaultAuthPolicy::AllowAll => Self::AllowAll,
            DefaultAuthPolicy::DenyAll => Self::DenyAll,
            DefaultAuthPolicy::AuthenticatedOnly if user.authenticated => Self::AllowAll,
            DefaultAuthPolicy::AuthenticatedOnly => Self::DenyAll,
        }
    }

    /// Picks the authorizer for a new session.
    ///
    /// Any half the engine declines to provide is answered by the policy.
    pub fn resolve(
        engine: Option<&dyn AuthorizationEngine>,
        policy: DefaultAuthPolicy,
        user: &UserInfo,
    ) -> Self {
        let fallback = Self::for_policy(policy, user);
        let Some(engine) = engine else {
            debug!(user_id = %user.user_id, ?policy, "No authorization engine, using default policy");
            return fallback;
        };

        let pre = engine.create_pre_authorizer(user);
        let fine = engine.create_authorizer(user);
        if pre.is_none() && fine.is_none() {
            debug!(user_id = %user.user_id, ?policy, "Engine declined user, using default policy");
            return fallback;
        }

        let fixed = Arc::new(FixedAuthorizer {
            allow: matches!(fallback, Self::AllowAll),
        });
        let pre = pre.unwrap_or_else(|| {
            debug!(user_id = %user.user_id, ?policy, "No pre-authorizer provided, using default policy");
            Arc::clone(&fixed) as Arc<dyn PreAuthorizer>
        });
        let fine = fine.unwrap_or_else(|| {
            debug!(user_id = %user.user_id, ?policy, "No authorizer provided, using default policy");
            fixed as Arc<dyn Authorizer>
        });
        Self::Delegated { pre, fine }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AllowAll => "allow_all",
            Self::DenyAll => "deny_all",
            Self::Delegated { .. } => "delegated",
        }
    }

    pub fn pre_auth(&self, level: PermissionLevel, target: AccessTarget<'_>) -> PreAuth {
        match self {
            Self::AllowAll => PreAuth::Allow,
            Self::DenyAll => PreAuth::Deny,
            Self::Delegated { pre, .. } => match target {
                AccessTarget::Provider(p) => pre.pre_auth_provider(level, p),
                AccessTarget::Service(p, s) => pre.pre_auth_service(level, p, s),
                AccessTarget::Resource(p, s, r) => pre.pre_auth_resource(level, p, s, r),
            },
        }
    }

    pub fn has_permission(
        &self,
        level: PermissionLevel,
        model: Option<&ModelIdentity>,
        target: AccessTarget<'_>,
    ) -> bool {
        match self {
            Self::AllowAll => true,
            Self::DenyAll => false,
            Self::Delegated { fine, .. } => match target {
                AccessTarget::Provider(p) => fine.has_provider_permission(level, model, p),
                AccessTarget::Service(p, s) => fine.has_service_permission(level, model, p, s),
                AccessTarget::Resource(p, s, r) => {
                    fine.has_resource_permission(level, model, p, s, r)
                }
            },
        }
    }

    /// Decides whether a notification may reach a listener of this session.
    pub fn admit(&self, event: &NotificationEvent) -> GateVerdict {
        let Some((level, target)) = required_permission(event) else {
            warn!(topic = %event.topic(), "Unrecognized lifecycle status, notification dropped");
            return GateVerdict::Unrecognized;
        };
        if self.has_permission(level, event.header().model.as_ref(), target) {
            GateVerdict::Allow
        } else {
            GateVerdict::Deny
        }
    }

    /// First half of a command-path check.
    ///
    /// A `Deny` pre-authorization fails here, before the twin is touched.
    /// Otherwise the returned check must be finished with the model of the
    /// target's provider, or `None` if the provider does not exist.
    pub fn begin_command<'a>(
        &'a self,
        level: PermissionLevel,
        target: AccessTarget<'a>,
    ) -> Result<CommandCheck<'a>, AuthorizationError> {
        match self.pre_auth(level, target) {
            PreAuth::Deny => Err(AuthorizationError::denied(level, &target)),
            pre => Ok(CommandCheck {
                authorizer: self,
                level,
                target,
                pre,
            }),
        }
    }
}

impl fmt::Debug for SessionAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Pending fine-grained half of a command-path check.
#[derive(Debug)]
#[must_use = "a command check does nothing until finished"]
pub struct CommandCheck<'a> {
    authorizer: &'a SessionAuthorizer,
    level: PermissionLevel,
    target: AccessTarget<'a>,
    pre: PreAuth,
}

impl CommandCheck<'_> {
    /// Whether `finish` will consult the fine-grained authorizer.
    pub fn needs_model(&self) -> bool {
        self.pre == PreAuth::Unknown
    }

    /// Completes the check. The same check runs whether the target exists
    /// or not; only `model` differs.
    pub fn finish(self, model: Option<&ModelIdentity>) -> Result<(), AuthorizationError> {
        if self.pre == PreAuth::Allow
            || self.authorizer.has_permission(self.level, model, self.target)
        {
            Ok(())
        } else {
            Err(AuthorizationError::denied(self.level, &self.target))
        }
    }
}

/// Policy-backed half used when an engine only provides the other one.
struct FixedAuthorizer {
    allow: bool,
}

impl FixedAuthorizer {
    fn verdict(&self) -> PreAuth {
        if self.allow {
            PreAuth::Allow
        } else {
            PreAuth::Deny
        }
    }
}

impl PreAuthorizer for FixedAuthorizer {
    fn pre_auth_provider(&self, _: PermissionLevel, _: &str) -> PreAuth {
        self.verdict()
    }

    fn pre_auth_service(&self, _: PermissionLevel, _: &str, _: &str) -> PreAuth {
        self.verdict()
    }

    fn pre_auth_resource(&self, _: PermissionLevel, _: &str, _: &str, _: &str) -> PreAuth {
        self.verdict()
    }
}

impl Authorizer for FixedAuthorizer {
    fn has_provider_permission(&self, _: PermissionLevel, _: Option<&ModelIdentity>, _: &str) -> bool {
        self.allow
    }

    fn has_service_permission(
        &self,
        _: PermissionLevel,
        _: Option<&ModelIdentity>,
        _: &str,
        _: &str,
    ) -> bool {
        self.allow
    }

    fn has_resource_permission(
        &self,
        _: PermissionLevel,
        _: Option<&ModelIdentity>,
        _: &str,
        _: &str,
        _: &str,
    ) -> bool {
        self.allow
    }
}
