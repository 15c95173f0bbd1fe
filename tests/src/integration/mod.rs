//! Integration scenarios.

#[cfg(test)]
mod support;

pub mod authorization;
pub mod delivery;
pub mod flows;
pub mod lifecycle;
pub mod telemetry;
