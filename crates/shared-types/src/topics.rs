//! # Topics
//!
//! Topic naming convention: `KIND/provider[/service[/resource]]`.
//!
//! Subscriptions are expressed relative to a kind (`provider/service/resource`)
//! and may end with `*`, in which case they match every topic that starts with
//! the literal text before the `*`.

use crate::errors::TopicError;
use crate::notifications::NotificationKind;
use std::fmt;

/// Wildcard marker accepted as the last character of a subscription topic.
pub const WILDCARD: char = '*';

/// Topic path separator.
pub const SEPARATOR: char = '/';

/// Builds the canonical notification topic for a target.
pub fn topic_for(
    kind: NotificationKind,
    provider: &str,
    service: Option<&str>,
    resource: Option<&str>,
) -> String {
    let mut topic = String::with_capacity(64);
    topic.push_str(kind.topic_prefix());
    topic.push_str(provider);
    if let Some(service) = service {
        topic.push(SEPARATOR);
        topic.push_str(service);
        if let Some(resource) = resource {
            topic.push(SEPARATOR);
            topic.push_str(resource);
        }
    }
    topic
}

/// A validated subscription topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionTopic {
    /// Matches one topic exactly.
    Exact(String),
    /// Matches every topic starting with the given literal prefix.
    Prefix(String),
}

impl SubscriptionTopic {
    /// Validates a raw subscription topic.
    ///
    /// Rejects empty topics, `*` anywhere but the last position and empty
    /// path segments. A lone `*` is a prefix subscription on everything.
    pub fn parse(raw: &str) -> Result<Self, TopicError> {
        if raw.is_empty() {
            return Err(TopicError::Empty);
        }

        let (body, wildcard) = match raw.strip_suffix(WILDCARD) {
            Some(body) => (body, true),
            None => (raw, false),
        };

        if let Some(position) = body.find(WILDCARD) {
            return Err(TopicError::MisplacedWildcard {
                topic: raw.to_string(),
                position,
            });
        }

        // A trailing separator is legal before a wildcard ("p1/*").
        let checked = if wildcard {
            body.strip_suffix(SEPARATOR).unwrap_or(body)
        } else {
            body
        };
        if !checked.is_empty() && checked.split(SEPARATOR).any(str::is_empty) {
            return Err(TopicError::EmptySegment(raw.to_string()));
        }
        if !wildcard && body.is_empty() {
            return Err(TopicError::Empty);
        }

        Ok(if wildcard {
            Self::Prefix(body.to_string())
        } else {
            Self::Exact(body.to_string())
        })
    }

    /// Full routing key for a kind: `KIND/` prepended to the literal text.
    pub fn routing_key(&self, kind: NotificationKind) -> (String, bool) {
        match self {
            Self::Exact(t) => (format!("{}{}", kind.topic_prefix(), t), false),
            Self::Prefix(p) => (format!("{}{}", kind.topic_prefix(), p), true),
        }
    }

    pub fn is_prefix(&self) -> bool {
        matches!(self, Self::Prefix(_))
    }
}

impl fmt::Display for SubscriptionTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(t) => f.write_str(t),
            Self::Prefix(p) => write!(f, "{p}{WILDCARD}"),
        }
    }
}
