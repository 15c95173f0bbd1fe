//! # Domain Layer - Session
//!
//! - `entities`: `SubscriptionId`, twin snapshots, `LivenessReport`
//! - `router`: `TopicRouter` (exact and prefix indices)
//! - `registration`: `ListenerSinks`, `ListenerRegistration`
//! - `session`: `Session`, `SessionBuilder`
//! - `config`: `SessionManagerConfig`
//! - `errors`: `SessionError`, `TwinError`

pub mod config;
pub mod entities;
pub mod errors;
pub mod registration;
pub mod router;
pub mod session;

pub use config::{ConfigError, SessionManagerConfig};
pub use entities::{
    LivenessReport, ProviderDescription, ResourceDescription, ServiceDescription, SubscriptionId,
};
pub use errors::{SessionError, SessionResult, TwinError};
pub use registration::{ListenerDefaults, ListenerRegistration, ListenerSinks};
pub use router::TopicRouter;
pub use session::{Session, SessionBuilder};
