//! # Notification Events
//!
//! Typed notifications emitted by the digital twin (or any other producer)
//! and routed to sessions and agents.
//!
//! Every notification carries the model identity and the
//! `provider[/service[/resource]]` path of its target, which is all the
//! authorization gate needs to decide whether it may be revealed.

use crate::entities::ModelIdentity;
use crate::topics::topic_for;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The four notification families. Each one owns a topic root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Data,
    Metadata,
    Lifecycle,
    Action,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 4] = [
        NotificationKind::Data,
        NotificationKind::Metadata,
        NotificationKind::Lifecycle,
        NotificationKind::Action,
    ];

    /// Topic root, e.g. `DATA`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "DATA",
            Self::Metadata => "METADATA",
            Self::Lifecycle => "LIFECYCLE",
            Self::Action => "ACTION",
        }
    }

    /// Topic root followed by the separator, e.g. `DATA/`.
    pub fn topic_prefix(&self) -> &'static str {
        match self {
            Self::Data => "DATA/",
            Self::Metadata => "METADATA/",
            Self::Lifecycle => "LIFECYCLE/",
            Self::Action => "ACTION/",
        }
    }

    /// Parses the root segment of a topic.
    pub fn from_topic(topic: &str) -> Option<Self> {
        let root = topic.split('/').next()?;
        Self::ALL.into_iter().find(|k| k.as_str() == root)
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-status of a lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    ProviderCreated,
    ProviderDeleted,
    ServiceCreated,
    ServiceDeleted,
    ResourceCreated,
    ResourceDeleted,
    /// Any status this gateway version does not know about.
    #[serde(other)]
    Unrecognized,
}

/// Common addressing carried by every notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationHeader {
    /// Model of the provider, when known.
    pub model: Option<ModelIdentity>,
    pub provider: String,
    pub service: Option<String>,
    pub resource: Option<String>,
}

impl NotificationHeader {
    pub fn provider(model: Option<ModelIdentity>, provider: impl Into<String>) -> Self {
        Self {
            model,
            provider: provider.into(),
            service: None,
            resource: None,
        }
    }

    pub fn service(
        model: Option<ModelIdentity>,
        provider: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            model,
            provider: provider.into(),
            service: Some(service.into()),
            resource: None,
        }
    }

    pub fn resource(
        model: Option<ModelIdentity>,
        provider: impl Into<String>,
        service: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            model,
            provider: provider.into(),
            service: Some(service.into()),
            resource: Some(resource.into()),
        }
    }

    pub fn model_package_uri(&self) -> Option<&str> {
        self.model.as_ref().map(|m| m.package_uri.as_str())
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_ref().map(|m| m.model.as_str())
    }

    pub fn service_name(&self) -> &str {
        self.service.as_deref().unwrap_or_default()
    }

    pub fn resource_name(&self) -> &str {
        self.resource.as_deref().unwrap_or_default()
    }
}

/// A provider, service or resource was created or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleNotification {
    #[serde(flatten)]
    pub header: NotificationHeader,
    pub status: LifecycleStatus,
    /// Initial value of a created resource.
    pub initial_value: Option<serde_json::Value>,
}

/// A resource value changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataNotification {
    #[serde(flatten)]
    pub header: NotificationHeader,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// A resource metadata entry changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataNotification {
    #[serde(flatten)]
    pub header: NotificationHeader,
    pub key: String,
    pub value: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// An action resource was invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionNotification {
    #[serde(flatten)]
    pub header: NotificationHeader,
    pub parameters: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// All notifications that flow from producers to sessions and agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationEvent {
    Lifecycle(LifecycleNotification),
    Data(DataNotification),
    Metadata(MetadataNotification),
    Action(ActionNotification),
}

impl NotificationEvent {
    /// Value change on a resource.
    pub fn data(
        header: NotificationHeader,
        old_value: Option<serde_json::Value>,
        new_value: Option<serde_json::Value>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::Data(DataNotification {
            header,
            old_value,
            new_value,
            timestamp,
        })
    }

    pub fn metadata(
        header: NotificationHeader,
        key: impl Into<String>,
        value: Option<serde_json::Value>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::Metadata(MetadataNotification {
            header,
            key: key.into(),
            value,
            timestamp,
        })
    }

    pub fn lifecycle(header: NotificationHeader, status: LifecycleStatus) -> Self {
        Self::Lifecycle(LifecycleNotification {
            header,
            status,
            initial_value: None,
        })
    }

    pub fn action(
        header: NotificationHeader,
        parameters: HashMap<String, serde_json::Value>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::Action(ActionNotification {
            header,
            parameters,
            timestamp,
        })
    }

    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Lifecycle(_) => NotificationKind::Lifecycle,
            Self::Data(_) => NotificationKind::Data,
            Self::Metadata(_) => NotificationKind::Metadata,
            Self::Action(_) => NotificationKind::Action,
        }
    }

    pub fn header(&self) -> &NotificationHeader {
        match self {
            Self::Lifecycle(n) => &n.header,
            Self::Data(n) => &n.header,
            Self::Metadata(n) => &n.header,
            Self::Action(n) => &n.header,
        }
    }

    /// The canonical topic of this notification: `KIND/provider[/service[/resource]]`.
    pub fn topic(&self) -> String {
        let header = self.header();
        topic_for(
            self.kind(),
            &header.provider,
            header.service.as_deref(),
            header.resource.as_deref(),
        )
    }
}
