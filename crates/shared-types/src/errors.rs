//! # Error Types
//!
//! Error types shared across subsystems.

use thiserror::Error;

/// A subscription topic could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    /// Empty topic.
    #[error("Topic is empty")]
    Empty,

    /// The wildcard is only allowed as the last character.
    #[error("Wildcard at position {position} of topic {topic} is not in last position")]
    MisplacedWildcard { topic: String, position: usize },

    /// Two consecutive separators, or a leading separator.
    #[error("Topic {0} contains an empty path segment")]
    EmptySegment(String),
}
