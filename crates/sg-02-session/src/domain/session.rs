//! # Session
//!
//! Server-side state of one connected client.
//!
//! ```text
//!              add_listener / remove_listener (write lock)
//!                              │
//!  notify ──► expired? ──► ListenerIndex.matches (read lock, snapshot)
//!                              │
//!                      dedupe + kind filter
//!                              │
//!                      SessionAuthorizer.admit ──deny──► dropped silently
//!                              │
//!                      MessageCallback.push (no lock held)
//! ```
//!
//! ## Expiry
//!
//! A session is live until `now >= expiry`, which is checked lazily on every
//! access, or until `expire()` is called. The transition is one-way: the
//! listener index is emptied, every callback is stopped and the expiration
//! listeners run exactly once.

use super::entities::{
    Modelled, ProviderDescription, ResourceDescription, ServiceDescription, SubscriptionId,
};
use super::errors::{SessionError, SessionResult, TwinError};
use super::registration::{ListenerDefaults, ListenerRegistration, ListenerSinks};
use super::router::TopicRouter;
use crate::ports::{Clock, DigitalTwin, SessionActivityChecker};
use chrono::{DateTime, Utc};
use gateway_telemetry::{
    CALLBACKS_STOPPED, NOTIFICATIONS_DELIVERED, NOTIFICATIONS_DENIED, SESSIONS_EXPIRED,
};
use parking_lot::{Mutex, RwLock};
use sg_01_authorization::{
    AccessTarget, AuthorizationError, GateVerdict, PreAuth, SessionAuthorizer,
};
use shared_bus::{ShutdownOutcome, TopicMessage};
use shared_types::{
    NotificationEvent, PermissionLevel, ResourcePath, ResourceType, SubscriptionTopic,
    TimedValue, UserInfo,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

type ExpirationListener = Box<dyn FnOnce(&Session) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expiry {
    Live(DateTime<Utc>),
    Expired,
}

// =============================================================================
// Listener index
// =============================================================================

struct Subscription {
    topics: Vec<SubscriptionTopic>,
    registrations: Vec<Arc<ListenerRegistration>>,
}

#[derive(Default)]
struct ListenerIndex {
    router: TopicRouter<Arc<ListenerRegistration>>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
}

impl ListenerIndex {
    fn insert(&mut self, id: SubscriptionId, subscription: Subscription) {
        for registration in &subscription.registrations {
            for topic in &subscription.topics {
                let (key, prefix) = topic.routing_key(registration.kind());
                self.router.insert(key, prefix, Arc::clone(registration));
            }
        }
        self.subscriptions.insert(id, subscription);
    }

    fn remove(&mut self, id: &SubscriptionId) -> Option<Subscription> {
        let subscription = self.subscriptions.remove(id)?;
        for registration in &subscription.registrations {
            for topic in &subscription.topics {
                let (key, prefix) = topic.routing_key(registration.kind());
                self.router
                    .remove_where(&key, prefix, |r| r.subscription_id() == *id);
            }
        }
        Some(subscription)
    }

    fn drain(&mut self) -> Vec<Arc<ListenerRegistration>> {
        self.router.drain();
        self.subscriptions
            .drain()
            .flat_map(|(_, subscription)| subscription.registrations)
            .collect()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Assembles a [`Session`].
pub struct SessionBuilder {
    user: UserInfo,
    authorizer: SessionAuthorizer,
    clock: Arc<dyn Clock>,
    twin: Arc<dyn DigitalTwin>,
    ttl: Option<chrono::Duration>,
    defaults: ListenerDefaults,
    activity_checker: Option<Arc<dyn SessionActivityChecker>>,
}

impl SessionBuilder {
    /// A session that never lapses, with direct delivery.
    pub fn new(
        user: UserInfo,
        authorizer: SessionAuthorizer,
        clock: Arc<dyn Clock>,
        twin: Arc<dyn DigitalTwin>,
    ) -> Self {
        Self {
            user,
            authorizer,
            clock,
            twin,
            ttl: None,
            defaults: ListenerDefaults::default(),
            activity_checker: None,
        }
    }

    /// Time to live from creation. `None` means the session never lapses.
    #[must_use]
    pub fn ttl(mut self, ttl: Option<chrono::Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn listener_defaults(mut self, defaults: ListenerDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    #[must_use]
    pub fn activity_checker(mut self, checker: Option<Arc<dyn SessionActivityChecker>>) -> Self {
        self.activity_checker = checker;
        self
    }

    pub fn build(self) -> Arc<Session> {
        let now = self.clock.now();
        let expiry = self
            .ttl
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Arc::new_cyclic(|this| Session {
            id: Uuid::new_v4().to_string(),
            user: self.user,
            authorizer: self.authorizer,
            clock: self.clock,
            twin: self.twin,
            defaults: self.defaults,
            activity_checker: self.activity_checker,
            expiry: Mutex::new(Expiry::Live(expiry)),
            expiration_listeners: Mutex::new(Vec::new()),
            listeners: RwLock::new(ListenerIndex::default()),
            this: this.clone(),
        })
    }
}

// =============================================================================
// Session
// =============================================================================

/// One client session.
pub struct Session {
    id: String,
    user: UserInfo,
    authorizer: SessionAuthorizer,
    clock: Arc<dyn Clock>,
    twin: Arc<dyn DigitalTwin>,
    defaults: ListenerDefaults,
    activity_checker: Option<Arc<dyn SessionActivityChecker>>,
    expiry: Mutex<Expiry>,
    expiration_listeners: Mutex<Vec<ExpirationListener>>,
    listeners: RwLock<ListenerIndex>,
    this: Weak<Session>,
}

impl Session {
    pub fn session_id(&self) -> &str {
        &self.id
    }

    pub fn user(&self) -> &UserInfo {
        &self.user
    }

    pub fn authorizer(&self) -> &SessionAuthorizer {
        &self.authorizer
    }

    // -------------------------------------------------------------------------
    // Expiry
    // -------------------------------------------------------------------------

    /// Expiry instant, `None` once expired. Observes a lapsed deadline.
    fn current_expiry(&self) -> Option<DateTime<Utc>> {
        let mut state = self.expiry.lock();
        let Expiry::Live(at) = *state else {
            return None;
        };
        if self.clock.now() < at {
            return Some(at);
        }
        *state = Expiry::Expired;
        drop(state);
        self.on_expired("lapsed");
        None
    }

    pub fn is_expired(&self) -> bool {
        self.current_expiry().is_none()
    }

    /// The expiry instant, or `None` if the session is expired.
    /// A session created without time to live reports `DateTime::<Utc>::MAX_UTC`.
    pub fn get_expiry(&self) -> Option<DateTime<Utc>> {
        self.current_expiry()
    }

    /// Resets the expiry to `now + duration`.
    pub fn extend(&self, duration: chrono::Duration) -> SessionResult<()> {
        if duration <= chrono::Duration::zero() {
            return Err(SessionError::InvalidArgument(format!(
                "extension must be positive, got {duration}"
            )));
        }

        let mut state = self.expiry.lock();
        let now = self.clock.now();
        match *state {
            Expiry::Live(at) if now < at => {
                let next = now
                    .checked_add_signed(duration)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                *state = Expiry::Live(next);
                debug!(session_id = %self.id, expiry = %next, "Session extended");
                Ok(())
            }
            Expiry::Live(_) => {
                *state = Expiry::Expired;
                drop(state);
                self.on_expired("lapsed");
                Err(SessionError::SessionExpired(self.id.clone()))
            }
            Expiry::Expired => Err(SessionError::SessionExpired(self.id.clone())),
        }
    }

    /// Marks the session expired. Idempotent.
    pub fn expire(&self) {
        {
            let mut state = self.expiry.lock();
            if *state == Expiry::Expired {
                return;
            }
            *state = Expiry::Expired;
        }
        self.on_expired("explicit");
    }

    /// Registers a listener fired once when the session becomes expired.
    /// Fires immediately if it already is.
    pub fn add_expiration_listener(&self, listener: impl FnOnce(&Session) + Send + 'static) {
        self.is_expired();
        let mut listeners = self.expiration_listeners.lock();
        if *self.expiry.lock() != Expiry::Expired {
            listeners.push(Box::new(listener));
            return;
        }
        drop(listeners);
        listener(self);
    }

    fn on_expired(&self, cause: &'static str) {
        let drained = self.listeners.write().drain();
        for registration in &drained {
            registration.stop();
        }

        let listeners = std::mem::take(&mut *self.expiration_listeners.lock());
        SESSIONS_EXPIRED.inc();
        info!(
            session_id = %self.id,
            user_id = %self.user.user_id,
            cause,
            registrations = drained.len(),
            "Session expired"
        );
        for listener in listeners {
            listener(self);
        }
    }

    fn ensure_live(&self) -> SessionResult<()> {
        if self.is_expired() {
            Err(SessionError::SessionExpired(self.id.clone()))
        } else {
            Ok(())
        }
    }

    // -------------------------------------------------------------------------
    // Listeners
    // -------------------------------------------------------------------------

    /// Subscribes `sinks` to `topics`.
    ///
    /// Topics are relative to the notification kind (`p1/s1/r1`, `p1/*`); each
    /// supplied kind is routed under `KIND/<topic>`.
    pub fn add_listener<S: AsRef<str>>(
        &self,
        topics: &[S],
        sinks: ListenerSinks,
    ) -> SessionResult<SubscriptionId> {
        self.ensure_live()?;
        if topics.is_empty() {
            return Err(SessionError::InvalidArgument(
                "a subscription needs at least one topic".into(),
            ));
        }
        let topics = topics
            .iter()
            .map(|t| SubscriptionTopic::parse(t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let subscription_id = SubscriptionId::new();
        let registrations = sinks.into_registrations(subscription_id, self.defaults)?;
        for registration in &registrations {
            let session = self.this.clone();
            registration.on_stop(move |reason| {
                CALLBACKS_STOPPED.inc();
                if let Some(session) = session.upgrade() {
                    if session.remove_listener(&subscription_id) {
                        debug!(
                            session_id = %session.id,
                            %subscription_id,
                            ?reason,
                            "Subscription dropped after its callback stopped"
                        );
                    }
                }
            });
        }

        let kinds = registrations.len();
        self.listeners.write().insert(
            subscription_id,
            Subscription {
                topics,
                registrations,
            },
        );

        // An expiry racing with the insert would leave orphans behind.
        if self.is_expired() {
            self.remove_listener(&subscription_id);
            return Err(SessionError::SessionExpired(self.id.clone()));
        }

        debug!(session_id = %self.id, %subscription_id, kinds, "Listener added");
        Ok(subscription_id)
    }

    /// Removes a subscription from every topic and kind it was registered
    /// under and stops its callbacks. Returns `false` for unknown ids.
    pub fn remove_listener(&self, subscription_id: &SubscriptionId) -> bool {
        let removed = self.listeners.write().remove(subscription_id);
        let Some(subscription) = removed else {
            return false;
        };
        for registration in &subscription.registrations {
            registration.stop();
        }
        debug!(session_id = %self.id, %subscription_id, "Listener removed");
        true
    }

    /// Subscription id to subscribed topics.
    pub fn active_listeners(&self) -> HashMap<SubscriptionId, Vec<String>> {
        self.listeners
            .read()
            .subscriptions
            .iter()
            .map(|(id, s)| (*id, s.topics.iter().map(ToString::to_string).collect()))
            .collect()
    }

    /// Publishes `event` on `topic` to the listeners of this session.
    pub fn notify(&self, topic: &str, event: NotificationEvent) -> usize {
        self.deliver(&TopicMessage::new(topic, event))
    }

    /// Delivers a shared message. Returns how many registrations accepted it.
    pub fn deliver(&self, message: &TopicMessage) -> usize {
        if self.is_expired() {
            return 0;
        }

        let matched = self.listeners.read().router.matches(&message.topic);
        if matched.is_empty() {
            return 0;
        }

        let kind = message.kind();
        let mut seen = HashSet::new();
        let targets: Vec<Arc<ListenerRegistration>> = matched
            .into_iter()
            .filter(|r| r.kind() == kind && seen.insert(r.callback_id()))
            .collect();
        if targets.is_empty() {
            return 0;
        }

        let verdict = self.authorizer.admit(&message.event);
        if verdict != GateVerdict::Allow {
            NOTIFICATIONS_DENIED.with_label_values(&[kind.as_str()]).inc();
            debug!(session_id = %self.id, topic = %message.topic, ?verdict, "Notification withheld");
            return 0;
        }

        let mut delivered = 0;
        for registration in targets {
            match registration.push(message.clone()) {
                Ok(()) => {
                    delivered += 1;
                    NOTIFICATIONS_DELIVERED
                        .with_label_values(&[kind.as_str()])
                        .inc();
                }
                Err(error) => {
                    debug!(
                        session_id = %self.id,
                        subscription_id = %registration.subscription_id(),
                        %error,
                        "Listener refused notification"
                    );
                    self.remove_listener(&registration.subscription_id());
                }
            }
        }
        delivered
    }

    /// Drains buffered listeners for up to `grace` each, then expires the
    /// session. Returns the number of discarded messages.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        let drained = self.listeners.write().drain();
        let mut discarded = 0;
        for registration in &drained {
            if let ShutdownOutcome::ForceStopped { discarded: lost } =
                registration.shutdown(grace).await
            {
                discarded += lost;
            }
        }
        self.expire();
        discarded
    }

    // -------------------------------------------------------------------------
    // Activity
    // -------------------------------------------------------------------------

    pub fn has_activity_checker(&self) -> bool {
        self.activity_checker.is_some()
    }

    /// Asks the activity checker, `None` when the session has none.
    pub fn check_activity(&self) -> Option<bool> {
        self.activity_checker
            .as_ref()
            .map(|checker| checker.is_client_active(&self.id, &self.user))
    }

    // -------------------------------------------------------------------------
    // Command path
    // -------------------------------------------------------------------------

    fn denied(&self, source: AuthorizationError) -> SessionError {
        debug!(session_id = %self.id, user_id = %self.user.user_id, %source, "Command refused");
        SessionError::AuthorizationDenied {
            user_id: self.user.user_id.clone(),
            source,
        }
    }

    /// Authorizes `level` on `target` and resolves it.
    ///
    /// A missing target goes through the same fine-grained check as an
    /// existing one, with the provider's model or no model, before
    /// `NotFound` is reported.
    fn resolve_guarded<T: Modelled>(
        &self,
        level: PermissionLevel,
        target: AccessTarget<'_>,
        lookup: impl FnOnce(&dyn DigitalTwin) -> Option<T>,
    ) -> SessionResult<T> {
        self.ensure_live()?;
        let check = self
            .authorizer
            .begin_command(level, target)
            .map_err(|e| self.denied(e))?;

        match lookup(self.twin.as_ref()) {
            Some(found) => {
                check.finish(found.model()).map_err(|e| self.denied(e))?;
                Ok(found)
            }
            None => {
                let model = if check.needs_model() {
                    self.twin.provider_model(target.provider())
                } else {
                    None
                };
                check.finish(model.as_ref()).map_err(|e| self.denied(e))?;
                Err(SessionError::NotFound(target.to_string()))
            }
        }
    }

    fn resource(
        &self,
        level: PermissionLevel,
        path: &ResourcePath,
    ) -> SessionResult<ResourceDescription> {
        self.resolve_guarded(
            level,
            AccessTarget::Resource(&path.provider, &path.service, &path.resource),
            |twin| twin.describe_resource(path),
        )
    }

    fn value_resource(
        &self,
        level: PermissionLevel,
        path: &ResourcePath,
    ) -> SessionResult<ResourceDescription> {
        let resource = self.resource(level, path)?;
        if resource.resource_type == ResourceType::Action {
            return Err(TwinError::ActionResource(path.clone()).into());
        }
        Ok(resource)
    }

    pub fn get_resource_value(&self, path: &ResourcePath) -> SessionResult<TimedValue> {
        Ok(self.value_resource(PermissionLevel::Read, path)?.value)
    }

    pub fn set_resource_value(
        &self,
        path: &ResourcePath,
        value: serde_json::Value,
    ) -> SessionResult<()> {
        self.value_resource(PermissionLevel::Update, path)?;
        self.twin.set_value(path, value, self.clock.now())?;
        Ok(())
    }

    pub fn get_resource_metadata(
        &self,
        path: &ResourcePath,
    ) -> SessionResult<HashMap<String, serde_json::Value>> {
        Ok(self.resource(PermissionLevel::Read, path)?.metadata)
    }

    pub fn get_resource_metadata_value(
        &self,
        path: &ResourcePath,
        key: &str,
    ) -> SessionResult<Option<serde_json::Value>> {
        let mut metadata = self.get_resource_metadata(path)?;
        Ok(metadata.remove(key))
    }

    pub fn set_resource_metadata(
        &self,
        path: &ResourcePath,
        metadata: HashMap<String, serde_json::Value>,
    ) -> SessionResult<()> {
        self.resource(PermissionLevel::Update, path)?;
        self.twin.set_metadata(path, metadata)?;
        Ok(())
    }

    pub fn set_resource_metadata_value(
        &self,
        path: &ResourcePath,
        key: &str,
        value: serde_json::Value,
    ) -> SessionResult<()> {
        self.resource(PermissionLevel::Update, path)?;
        self.twin.set_metadata_value(path, key, value)?;
        Ok(())
    }

    pub fn act_on_resource(
        &self,
        path: &ResourcePath,
        parameters: HashMap<String, serde_json::Value>,
    ) -> SessionResult<serde_json::Value> {
        let resource = self.resource(PermissionLevel::Act, path)?;
        if resource.resource_type != ResourceType::Action {
            return Err(TwinError::NotAnAction(path.clone()).into());
        }
        Ok(self.twin.act(path, parameters)?)
    }

    pub fn describe_resource(&self, path: &ResourcePath) -> SessionResult<ResourceDescription> {
        self.resource(PermissionLevel::Describe, path)
    }

    pub fn describe_service(
        &self,
        provider: &str,
        service: &str,
    ) -> SessionResult<ServiceDescription> {
        self.resolve_guarded(
            PermissionLevel::Describe,
            AccessTarget::Service(provider, service),
            |twin| twin.describe_service(provider, service),
        )
    }

    pub fn describe_provider(&self, provider: &str) -> SessionResult<ProviderDescription> {
        self.resolve_guarded(
            PermissionLevel::Describe,
            AccessTarget::Provider(provider),
            |twin| twin.describe_provider(provider),
        )
    }

    /// Providers this session may describe. Others are silently left out.
    pub fn list_providers(&self) -> SessionResult<Vec<ProviderDescription>> {
        self.ensure_live()?;
        let level = PermissionLevel::Describe;
        Ok(self
            .twin
            .list_providers()
            .into_iter()
            .filter(|p| {
                let target = AccessTarget::Provider(&p.provider);
                match self.authorizer.pre_auth(level, target) {
                    PreAuth::Allow => true,
                    PreAuth::Deny => false,
                    PreAuth::Unknown => {
                        self.authorizer
                            .has_permission(level, p.model.as_ref(), target)
                    }
                }
            })
            .collect())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user_id", &self.user.user_id)
            .field("authorizer", &self.authorizer)
            .field("expiry", &*self.expiry.lock())
            .finish()
    }
}
