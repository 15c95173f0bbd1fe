//! # Inbound Ports
//!
//! | Trait | Caller |
//! |-------|--------|
//! | `NotificationReceiver` | Producers (the twin, southbound adapters) |
//! | `SessionStore` | Protocol adapters opening client sessions |

use crate::domain::{Session, SessionResult};
use shared_types::{NotificationEvent, UserInfo};
use std::sync::Arc;

/// Entry point for notification producers.
pub trait NotificationReceiver: Send + Sync {
    /// Broadcasts a notification published on `topic`. Never fails; delivery
    /// problems are contained per session.
    fn notify(&self, topic: &str, event: NotificationEvent);
}

/// Session lookup and creation for protocol adapters.
pub trait SessionStore: NotificationReceiver {
    fn create_session(&self, user: &UserInfo) -> SessionResult<Arc<Session>>;

    /// Returns the session only if it belongs to `user` and is still live.
    fn get_session(&self, user: &UserInfo, session_id: &str) -> SessionResult<Option<Arc<Session>>>;

    /// The per-user default session, created on first use.
    fn get_default_session(&self, user: &UserInfo) -> SessionResult<Arc<Session>>;

    fn session_ids(&self, user: &UserInfo) -> SessionResult<Vec<String>>;
}
