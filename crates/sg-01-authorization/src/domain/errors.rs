//! Authorization error types.

use super::entities::AccessTarget;
use shared_types::PermissionLevel;
use thiserror::Error;

/// Raised on the command path only. Notification-path denials are silent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    /// The pre-authorizer or the fine-grained check refused the access.
    #[error("Permission {level} denied on {target}")]
    Denied {
        level: PermissionLevel,
        target: String,
    },
}

impl AuthorizationError {
    pub fn denied(level: PermissionLevel, target: &AccessTarget<'_>) -> Self {
        Self::Denied {
            level,
            target: target.to_string(),
        }
    }
}
