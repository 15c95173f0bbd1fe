//! Rule-table authorization engine.
//!
//! An in-process [`AuthorizationEngine`] driven by an ordered list of
//! rules; the first matching rule decides, no match denies. Useful for
//! deployments with a handful of static grants and for tests.

use crate::domain::{AccessTarget, PreAuth};
use crate::ports::{AuthorizationEngine, Authorizer, PreAuthorizer};
use serde::{Deserialize, Serialize};
use shared_types::{ModelIdentity, PermissionLevel, UserInfo};
use std::sync::Arc;

/// One grant or refusal. `None` fields match anything.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessRule {
    pub user_id: Option<String>,
    pub group: Option<String>,
    pub level: Option<PermissionLevel>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub allow: bool,
}

impl AccessRule {
    pub fn allow() -> Self {
        Self {
            allow: true,
            ..Self::default()
        }
    }

    pub fn deny() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn for_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn at_level(mut self, level: PermissionLevel) -> Self {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub fn on_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn on_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    fn applies_to(&self, user: &UserInfo) -> bool {
        self.user_id.as_deref().map_or(true, |u| u == user.user_id)
            && self.group.as_deref().map_or(true, |g| user.is_member_of(g))
    }

    fn matches(&self, level: PermissionLevel, model: Option<&ModelIdentity>, provider: &str) -> bool {
        self.level.map_or(true, |l| l == level)
            && self.provider.as_deref().map_or(true, |p| p == provider)
            && self
                .model
                .as_deref()
                .map_or(true, |m| model.is_some_and(|id| id.model == m))
    }

    /// Whether the decision can be taken without the model.
    fn model_free(&self) -> bool {
        self.model.is_none()
    }
}

/// Engine evaluating a fixed rule table.
#[derive(Debug, Clone, Default)]
pub struct RuleTableEngine {
    rules: Arc<Vec<AccessRule>>,
}

impl RuleTableEngine {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }
}

impl AuthorizationEngine for RuleTableEngine {
    fn create_pre_authorizer(&self, user: &UserInfo) -> Option<Arc<dyn PreAuthorizer>> {
        Some(Arc::new(self.authorizer_for(user)))
    }

    fn create_authorizer(&self, user: &UserInfo) -> Option<Arc<dyn Authorizer>> {
        Some(Arc::new(self.authorizer_for(user)))
    }
}

impl RuleTableEngine {
    fn authorizer_for(&self, user: &UserInfo) -> UserRules {
        UserRules {
            rules: self
                .rules
                .iter()
                .filter(|r| r.applies_to(user))
                .cloned()
                .collect(),
        }
    }
}

/// Rules of one user, in table order.
struct UserRules {
    rules: Vec<AccessRule>,
}

impl UserRules {
    fn decide(&self, level: PermissionLevel, model: Option<&ModelIdentity>, target: AccessTarget<'_>) -> bool {
        self.rules
            .iter()
            .find(|r| r.matches(level, model, target.provider()))
            .is_some_and(|r| r.allow)
    }

    /// Decides without the model when the first candidate rule does not
    /// depend on it.
    fn pre(&self, level: PermissionLevel, target: AccessTarget<'_>) -> PreAuth {
        let candidate = self.rules.iter().find(|r| {
            r.level.map_or(true, |l| l == level)
                && r.provider.as_deref().map_or(true, |p| p == target.provider())
        });
        match candidate {
            None => PreAuth::Deny,
            Some(rule) if rule.model_free() && rule.allow => PreAuth::Allow,
            Some(rule) if rule.model_free() => PreAuth::Deny,
            Some(_) => PreAuth::Unknown,
        }
    }
}

impl PreAuthorizer for UserRules {
    fn pre_auth_provider(&self, level: PermissionLevel, provider: &str) -> PreAuth {
        self.pre(level, AccessTarget::Provider(provider))
    }

    fn pre_auth_service(&self, level: PermissionLevel, provider: &str, service: &str) -> PreAuth {
        self.pre(level, AccessTarget::Service(provider, service))
    }

    fn pre_auth_resource(
        &self,
        level: PermissionLevel,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> PreAuth {
        self.pre(level, AccessTarget::Resource(provider, service, resource))
    }
}

impl Authorizer for UserRules {
    fn has_provider_permission(
        &self,
        level: PermissionLevel,
        model: Option<&ModelIdentity>,
        provider: &str,
    ) -> bool {
        self.decide(level, model, AccessTarget::Provider(provider))
    }

    fn has_service_permission(
        &self,
        level: PermissionLevel,
        model: Option<&ModelIdentity>,
        provider: &str,
        service: &str,
    ) -> bool {
        self.decide(level, model, AccessTarget::Service(provider, service))
    }

    fn has_resource_permission(
        &self,
        level: PermissionLevel,
        model: Option<&ModelIdentity>,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> bool {
        self.decide(level, model, AccessTarget::Resource(provider, service, resource))
    }
}
