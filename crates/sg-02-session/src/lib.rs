//! # Session Subsystem
//!
//! **Subsystem ID:** 2
//!
//! ## Purpose
//!
//! Holds the server-side state of every connected client: its identity, its
//! authorizer, its expiry and its listeners. Routes each notification to the
//! listeners whose topic matches, reveals it only when the session's
//! authorizer allows, and guards every get/set/describe/act command.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | One delivery per registration per notification | `domain/session.rs` - `deliver()` dedupe |
//! | Expired sessions deliver nothing and refuse commands | `domain/session.rs` - `ensure_live()` |
//! | Missing targets are hidden from unauthorized users | `domain/session.rs` - `resolve_guarded()` |
//! | Prefix subscriptions see every topic they start | `domain/router.rs` - `matches()` |
//! | Engine changes invalidate all sessions | `service.rs` - `replace_engine()` |
//!
//! ## Notification Flow
//!
//! ```text
//! InMemoryTwin ──notify──► SessionManager ──┬──► Session.deliver ──► ListenerRegistration
//!                                           │        (router, kind, authorizer)
//!                                           └──► AgentRegistry.dispatch ──► Agent
//! ```
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  service.rs       - SessionManager (session store)              │
//! │  adapters/        - InMemoryTwin, ManualClock                   │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/inbound.rs  - NotificationReceiver, SessionStore         │
//! │  ports/outbound.rs - DigitalTwin, Clock, SessionActivityChecker │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/session.rs      - Session, SessionBuilder               │
//! │  domain/router.rs       - TopicRouter                           │
//! │  domain/registration.rs - ListenerSinks, ListenerRegistration   │
//! │  domain/config.rs       - SessionManagerConfig                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//!
//! No sink, expiration listener or stop hook ever runs while a session or
//! store lock is held. Session methods are never called under the store
//! lock.

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{InMemoryTwin, ManualClock};
pub use domain::{
    ConfigError, ListenerDefaults, ListenerRegistration, ListenerSinks, LivenessReport,
    ProviderDescription, ResourceDescription, ServiceDescription, Session, SessionBuilder,
    SessionError, SessionManagerConfig, SessionResult, SubscriptionId, TopicRouter, TwinError,
};
pub use ports::{
    Clock, DigitalTwin, NotificationReceiver, SessionActivityChecker, SessionStore, SystemClock,
};
pub use service::SessionManager;
