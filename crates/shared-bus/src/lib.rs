//! # Shared Bus - Message Callback Engine
//!
//! Delivery substrate used by sessions (one callback per listener
//! registration) and by agents (one callback per observer of the whole
//! notification stream).
//!
//! ```text
//!                    ┌────────────────────────────┐
//!  push(message) ──► │ MessageCallback            │
//!                    │  active? deadline passed?  │
//!                    │  Direct │ Buffered (FIFO)  │──► MessageSink::deliver
//!                    └────────────┬───────────────┘
//!                                 │ sink error
//!                                 ▼
//!                       ErrorHandler ─► CONTINUE | IGNORE | ROLLBACK | STOP
//! ```
//!
//! ## Guarantees
//!
//! - Messages pushed from one thread reach the sink in push order.
//! - `active` never goes back to true.
//! - A `Stop` decision stops the failing callback only; its owner learns
//!   about it through the stop hooks.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod agent;
pub mod callback;
pub mod events;
pub mod sink;

// Re-export main types
pub use agent::{Agent, AgentId, AgentRegistry};
pub use callback::{
    CallbackError, CallbackStats, CallbackTimeout, DeliveryMode, MessageCallback, ShutdownOutcome,
    StopReason, DEFAULT_BUFFER_CAPACITY,
};
pub use events::{AgentFilter, TopicMessage};
pub use sink::{ErrorHandler, ErrorPolicy, MessageSink, SinkError};

/// Grace period granted to buffered callbacks on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 500;
