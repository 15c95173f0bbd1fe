//! Session error types.

use sg_01_authorization::AuthorizationError;
use shared_bus::CallbackError;
use shared_types::{ResourcePath, TopicError};
use thiserror::Error;

/// Failures reported by a digital twin.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TwinError {
    #[error("Resource {0} is an action and holds no value")]
    ActionResource(ResourcePath),

    #[error("Resource {0} is not an action")]
    NotAnAction(ResourcePath),

    #[error("Resource {0} does not exist")]
    UnknownResource(ResourcePath),

    #[error("Twin operation failed: {0}")]
    Failed(String),
}

/// Errors returned by sessions and by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Command refused by pre-authorization or by the fine-grained check.
    #[error("Access denied for user {user_id}: {source}")]
    AuthorizationDenied {
        user_id: String,
        #[source]
        source: AuthorizationError,
    },

    /// Command target does not exist (reported only to authorized callers).
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Session {0} is expired")]
    SessionExpired(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Session manager is closed")]
    ManagerClosed,

    #[error(transparent)]
    Twin(#[from] TwinError),

    #[error("Listener delivery setup failed: {0}")]
    Delivery(#[from] CallbackError),
}

impl From<TopicError> for SessionError {
    fn from(error: TopicError) -> Self {
        Self::InvalidArgument(error.to_string())
    }
}

/// Result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
