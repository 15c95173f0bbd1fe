//! Shared fixtures for the integration scenarios.

use chrono::Utc;
use parking_lot::Mutex;
use sg_02_session::{
    InMemoryTwin, ManualClock, NotificationReceiver, SessionManager, SessionManagerConfig,
};
use shared_bus::{SinkError, TopicMessage};
use shared_types::{ModelIdentity, NotificationEvent, NotificationHeader, ResourcePath, ResourceType};
use sg_01_authorization::DefaultAuthPolicy;
use std::sync::Arc;

/// Twin, clock and store wired together the way a gateway process does.
pub struct Gateway {
    pub clock: Arc<ManualClock>,
    pub twin: Arc<InMemoryTwin>,
    pub manager: Arc<SessionManager>,
}

impl Gateway {
    pub fn new(config: SessionManagerConfig) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let twin = Arc::new(InMemoryTwin::new(clock.clone()));
        let manager = SessionManager::new(config, twin.clone(), clock.clone()).unwrap();
        let receiver: Arc<dyn NotificationReceiver> = manager.clone();
        twin.attach(Arc::downgrade(&receiver));
        Self {
            clock,
            twin,
            manager,
        }
    }

    /// Store with 600s sessions, no checker and allow-all default policy.
    pub fn open() -> Self {
        Self::new(SessionManagerConfig {
            expiry_secs: 600,
            activity_check_interval_secs: 0,
            auth_policy: DefaultAuthPolicy::AllowAll,
            ..SessionManagerConfig::default()
        })
    }

    pub fn sensor(&self, model: &ModelIdentity, path: &ResourcePath, value: i64) {
        self.twin
            .create_resource(model, path, ResourceType::Sensor, Some(value.into()));
    }
}

pub fn thermometer() -> ModelIdentity {
    ModelIdentity::new("https://example.org/models", "thermometer")
}

pub fn lamp() -> ModelIdentity {
    ModelIdentity::new("https://example.org/models", "lamp")
}

/// Data notification carrying `old` and `new`.
pub fn value_change(path: &ResourcePath, old: i64, new: i64) -> NotificationEvent {
    NotificationEvent::data(
        NotificationHeader::resource(
            Some(thermometer()),
            &path.provider,
            &path.service,
            &path.resource,
        ),
        Some(old.into()),
        Some(new.into()),
        Utc::now(),
    )
}

/// Sink keeping every message it receives.
#[derive(Clone, Default)]
pub struct Recorder {
    messages: Arc<Mutex<Vec<TopicMessage>>>,
}

impl Recorder {
    pub fn sink(&self) -> impl Fn(&TopicMessage) -> Result<(), SinkError> + Send + Sync + 'static {
        let messages = Arc::clone(&self.messages);
        move |m: &TopicMessage| -> Result<(), SinkError> {
            messages.lock().push(m.clone());
            Ok(())
        }
    }

    pub fn topics(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .map(|m| m.topic.to_string())
            .collect()
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.messages
            .lock()
            .iter()
            .map(|m| m.event.as_ref().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}
