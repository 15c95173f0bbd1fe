//! # Sinks and Error Policies
//!
//! A sink is the final consumer of a message (a protocol adapter, a test
//! recorder, an agent). When it fails, the callback asks its error handler
//! what to do next.
//!
//! | Policy     | Effect on the callback          |
//! |------------|---------------------------------|
//! | `Continue` | keep delivering                 |
//! | `Ignore`   | keep delivering, nothing logged |
//! | `Rollback` | keep delivering                 |
//! | `Stop`     | stop this callback and its owner |

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a sink or by the queue in front of it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The sink could not process the message.
    #[error("Sink failed: {0}")]
    Failed(String),

    /// The delivery queue was full, the message was dropped.
    #[error("Delivery queue full (capacity {capacity})")]
    Overflow { capacity: usize },

    /// The consumer behind the sink is gone.
    #[error("Sink closed")]
    Closed,
}

impl SinkError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Final consumer of messages.
pub trait MessageSink<M>: Send + Sync {
    fn deliver(&self, message: &M) -> Result<(), SinkError>;
}

impl<M, F> MessageSink<M> for F
where
    F: Fn(&M) -> Result<(), SinkError> + Send + Sync,
{
    fn deliver(&self, message: &M) -> Result<(), SinkError> {
        self(message)
    }
}

/// Decision taken after a sink failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorPolicy {
    #[default]
    Continue,
    Ignore,
    Rollback,
    Stop,
}

impl ErrorPolicy {
    /// Whether delivery goes on after this decision.
    pub fn keeps_going(&self) -> bool {
        !matches!(self, Self::Stop)
    }
}

/// Decides what happens after a sink failure.
pub trait ErrorHandler<M>: Send + Sync {
    fn on_error(&self, message: &M, error: &SinkError) -> ErrorPolicy;
}

impl<M> ErrorHandler<M> for ErrorPolicy {
    fn on_error(&self, _message: &M, _error: &SinkError) -> ErrorPolicy {
        *self
    }
}

impl<M, F> ErrorHandler<M> for F
where
    F: Fn(&M, &SinkError) -> ErrorPolicy + Send + Sync,
{
    fn on_error(&self, message: &M, error: &SinkError) -> ErrorPolicy {
        self(message, error)
    }
}
