//! # Shared Types Crate
//!
//! Domain entities, notification events and topic conventions shared by the
//! gateway subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a subsystem boundary
//!   (notifications, identities, permission levels) is defined here.
//! - **Typed Notifications**: producers emit `NotificationEvent` values; the
//!   topic of a notification is always derived from its header, never passed
//!   around separately from it.

pub mod entities;
pub mod errors;
pub mod notifications;
pub mod topics;

pub use entities::*;
pub use errors::*;
pub use notifications::*;
pub use topics::{topic_for, SubscriptionTopic, SEPARATOR, WILDCARD};
