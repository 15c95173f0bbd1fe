//! # Ports Layer - Authorization Gate
//!
//! Only driven ports: the gate is consumed as a concrete value
//! ([`crate::SessionAuthorizer`]) by the session subsystem.

pub mod outbound;

pub use outbound::*;
