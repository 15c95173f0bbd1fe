//! # Bus Messages
//!
//! The unit carried by the delivery engine is a notification paired with the
//! topic it was published on. Both halves are reference counted so that a
//! single notification fanned out to many callbacks is never deep-cloned.

use shared_types::{NotificationEvent, NotificationKind};
use std::collections::HashSet;
use std::sync::Arc;

/// A notification routed on a topic.
#[derive(Debug, Clone)]
pub struct TopicMessage {
    /// Topic the notification was published on.
    pub topic: Arc<str>,
    /// The notification itself.
    pub event: Arc<NotificationEvent>,
}

impl TopicMessage {
    pub fn new(topic: impl Into<Arc<str>>, event: NotificationEvent) -> Self {
        Self {
            topic: topic.into(),
            event: Arc::new(event),
        }
    }

    /// Wraps an already shared notification.
    pub fn shared(topic: Arc<str>, event: Arc<NotificationEvent>) -> Self {
        Self { topic, event }
    }

    /// Publishes the notification on its canonical topic.
    pub fn from_event(event: NotificationEvent) -> Self {
        let topic = event.topic();
        Self::new(topic, event)
    }

    pub fn kind(&self) -> NotificationKind {
        self.event.kind()
    }
}

/// Filter applied by agents before queueing a message.
#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    /// Kinds to include. Empty means all kinds.
    pub kinds: HashSet<NotificationKind>,
    /// Literal topic prefix to include. `None` means all topics.
    pub topic_prefix: Option<String>,
    /// Inverts the topic prefix condition.
    pub complement: bool,
}

impl AgentFilter {
    /// Create a filter that accepts all messages.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific kinds.
    #[must_use]
    pub fn kinds(kinds: impl IntoIterator<Item = NotificationKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Restrict to topics starting with `prefix`.
    #[must_use]
    pub fn with_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = Some(prefix.into());
        self
    }

    /// Accept topics that do NOT start with the configured prefix instead.
    #[must_use]
    pub fn complemented(mut self) -> Self {
        self.complement = true;
        self
    }

    /// Check if a message matches this filter.
    #[must_use]
    pub fn matches(&self, message: &TopicMessage) -> bool {
        let kind_match = self.kinds.is_empty() || self.kinds.contains(&message.kind());

        let topic_match = match &self.topic_prefix {
            None => true,
            Some(prefix) => message.topic.starts_with(prefix.as_str()) != self.complement,
        };

        kind_match && topic_match
    }
}
