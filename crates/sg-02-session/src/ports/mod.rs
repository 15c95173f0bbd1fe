//! Ports (hexagonal boundaries) of the Session subsystem.

pub mod inbound;
pub mod outbound;

pub use inbound::{NotificationReceiver, SessionStore};
pub use outbound::{Clock, DigitalTwin, SessionActivityChecker, SystemClock};
