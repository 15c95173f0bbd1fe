//! Listener registrations.
//!
//! `add_listener` turns a [`ListenerSinks`] into one [`ListenerRegistration`]
//! per supplied kind. Each registration owns a [`MessageCallback`], so every
//! kind of a subscription is delivered, timed out and stopped on its own.

use super::entities::SubscriptionId;
use shared_bus::{
    CallbackError, CallbackStats, CallbackTimeout, DeliveryMode, ErrorHandler, ErrorPolicy,
    MessageCallback, MessageSink, ShutdownOutcome, StopReason, TopicMessage,
};
use shared_types::NotificationKind;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Delivery settings applied when a subscription does not override them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerDefaults {
    pub delivery: DeliveryMode,
    pub error_policy: ErrorPolicy,
}

/// The sinks of one subscription, keyed by notification kind.
///
/// ```rust,ignore
/// let sinks = ListenerSinks::new()
///     .on_data(|m: &TopicMessage| adapter.forward(m))
///     .with_delivery(DeliveryMode::buffered());
/// session.add_listener(&["p1/*"], sinks)?;
/// ```
#[derive(Default)]
pub struct ListenerSinks {
    sinks: BTreeMap<NotificationKind, Arc<dyn MessageSink<TopicMessage>>>,
    error_handler: Option<Arc<dyn ErrorHandler<TopicMessage>>>,
    timeout: CallbackTimeout,
    delivery: Option<DeliveryMode>,
}

impl ListenerSinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sink of `kind`, replacing any previous one.
    #[must_use]
    pub fn on(mut self, kind: NotificationKind, sink: impl MessageSink<TopicMessage> + 'static) -> Self {
        self.sinks.insert(kind, Arc::new(sink));
        self
    }

    #[must_use]
    pub fn on_data(self, sink: impl MessageSink<TopicMessage> + 'static) -> Self {
        self.on(NotificationKind::Data, sink)
    }

    #[must_use]
    pub fn on_metadata(self, sink: impl MessageSink<TopicMessage> + 'static) -> Self {
        self.on(NotificationKind::Metadata, sink)
    }

    #[must_use]
    pub fn on_lifecycle(self, sink: impl MessageSink<TopicMessage> + 'static) -> Self {
        self.on(NotificationKind::Lifecycle, sink)
    }

    #[must_use]
    pub fn on_action(self, sink: impl MessageSink<TopicMessage> + 'static) -> Self {
        self.on(NotificationKind::Action, sink)
    }

    #[must_use]
    pub fn with_error_handler(mut self, handler: impl ErrorHandler<TopicMessage> + 'static) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: CallbackTimeout) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = Some(delivery);
        self
    }

    /// Kinds with a sink, in topic-root order.
    pub fn kinds(&self) -> impl Iterator<Item = NotificationKind> + '_ {
        self.sinks.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub(crate) fn into_registrations(
        self,
        subscription_id: SubscriptionId,
        defaults: ListenerDefaults,
    ) -> Result<Vec<Arc<ListenerRegistration>>, CallbackError> {
        let handler: Arc<dyn ErrorHandler<TopicMessage>> = self
            .error_handler
            .unwrap_or_else(|| Arc::new(defaults.error_policy));
        let delivery = self.delivery.unwrap_or(defaults.delivery);

        let mut registrations = Vec::with_capacity(self.sinks.len());
        for (kind, sink) in self.sinks {
            let callback =
                MessageCallback::new(sink, Arc::clone(&handler), self.timeout, delivery)?;
            registrations.push(Arc::new(ListenerRegistration {
                subscription_id,
                kind,
                callback,
            }));
        }
        Ok(registrations)
    }
}

impl fmt::Debug for ListenerSinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSinks")
            .field("kinds", &self.sinks.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .field("delivery", &self.delivery)
            .finish()
    }
}

/// One kind of one subscription.
#[derive(Debug)]
pub struct ListenerRegistration {
    subscription_id: SubscriptionId,
    kind: NotificationKind,
    callback: MessageCallback<TopicMessage>,
}

impl ListenerRegistration {
    pub fn subscription_id(&self) -> SubscriptionId {
        self.subscription_id
    }

    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    pub fn callback_id(&self) -> Uuid {
        self.callback.id()
    }

    pub fn is_active(&self) -> bool {
        self.callback.is_active()
    }

    pub fn stats(&self) -> CallbackStats {
        self.callback.stats()
    }

    pub(crate) fn push(&self, message: TopicMessage) -> Result<(), CallbackError> {
        self.callback.push(message)
    }

    pub(crate) fn on_stop(&self, hook: impl FnOnce(StopReason) + Send + 'static) {
        self.callback.on_stop(hook);
    }

    pub(crate) fn stop(&self) {
        self.callback.stop();
    }

    pub(crate) async fn shutdown(&self, grace: Duration) -> ShutdownOutcome {
        self.callback.shutdown(grace).await
    }
}
