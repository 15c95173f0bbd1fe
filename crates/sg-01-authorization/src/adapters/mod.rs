//! # Adapters Layer - Authorization Gate
//!
//! Engines implementing the outbound ports in-process.

pub mod rules;

pub use rules::{AccessRule, RuleTableEngine};
