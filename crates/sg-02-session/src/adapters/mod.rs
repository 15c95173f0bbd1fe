//! Adapters for the Session subsystem's outbound ports.
//!
//! - `clock`: `ManualClock`, a `Clock` moved explicitly by tests and simulations
//! - `twin`: `InMemoryTwin`, a `DigitalTwin` kept in memory

pub mod clock;
pub mod twin;

pub use clock::ManualClock;
pub use twin::InMemoryTwin;
