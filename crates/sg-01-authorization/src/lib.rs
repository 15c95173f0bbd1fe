//! # Authorization Gate Subsystem
//!
//! **Subsystem ID:** 1
//!
//! ## Purpose
//!
//! Decides, per session, whether a notification may be revealed to a
//! listener and whether a command (get/set/describe/act) may run.
//!
//! ## Two Paths
//!
//! | Path         | Checks                               | On refusal                 |
//! |--------------|--------------------------------------|----------------------------|
//! | Notification | fine-grained only                    | silent drop                |
//! | Command      | pre-auth, then fine-grained on UNKNOWN | `AuthorizationError::Denied` |
//!
//! On the command path an UNKNOWN pre-authorization runs the exact same
//! fine-grained check whether or not the target exists, with the model of
//! the target's provider or no model at all. The caller learns nothing about
//! existence before it is allowed to.
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/rules.rs  - RuleTableEngine (in-process engine)       │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/outbound.rs - PreAuthorizer, Authorizer,                 │
//! │                      AuthorizationEngine                        │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/authorizer.rs - SessionAuthorizer, CommandCheck         │
//! │  domain/entities.rs   - PreAuth, DefaultAuthPolicy, mapping     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::{AccessRule, RuleTableEngine};
pub use domain::{
    required_permission, AccessTarget, AuthorizationError, CommandCheck, DefaultAuthPolicy,
    GateVerdict, PreAuth, SessionAuthorizer,
};
pub use ports::{AuthorizationEngine, Authorizer, PreAuthorizer};
