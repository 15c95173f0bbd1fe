//! In-memory digital twin.
//!
//! Holds providers, services and resources in ordered maps and publishes the
//! matching notification for every change to an attached
//! [`NotificationReceiver`]. Notifications are published after the twin's
//! lock is released, so receivers may call back into the twin.

use crate::domain::{ProviderDescription, ResourceDescription, ServiceDescription, TwinError};
use crate::ports::{Clock, DigitalTwin, NotificationReceiver};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use shared_types::{
    LifecycleStatus, ModelIdentity, NotificationEvent, NotificationHeader, ResourcePath,
    ResourceType, TimedValue,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use tracing::debug;

#[derive(Debug, Clone)]
struct ResourceEntry {
    resource_type: ResourceType,
    value: TimedValue,
    metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug)]
struct ProviderEntry {
    model: ModelIdentity,
    services: BTreeMap<String, BTreeMap<String, ResourceEntry>>,
}

impl ProviderEntry {
    fn resource_mut(&mut self, path: &ResourcePath) -> Result<&mut ResourceEntry, TwinError> {
        self.services
            .get_mut(&path.service)
            .and_then(|service| service.get_mut(&path.resource))
            .ok_or_else(|| TwinError::UnknownResource(path.clone()))
    }
}

/// A digital twin kept in memory.
pub struct InMemoryTwin {
    clock: Arc<dyn Clock>,
    providers: RwLock<BTreeMap<String, ProviderEntry>>,
    receiver: RwLock<Option<Weak<dyn NotificationReceiver>>>,
}

impl InMemoryTwin {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            providers: RwLock::new(BTreeMap::new()),
            receiver: RwLock::new(None),
        }
    }

    /// Sends every future change to `receiver`.
    pub fn attach(&self, receiver: Weak<dyn NotificationReceiver>) {
        *self.receiver.write() = Some(receiver);
    }

    pub fn detach(&self) {
        self.receiver.write().take();
    }

    fn publish(&self, events: Vec<NotificationEvent>) {
        let receiver = self.receiver.read().as_ref().and_then(Weak::upgrade);
        let Some(receiver) = receiver else {
            return;
        };
        for event in events {
            let topic = event.topic();
            receiver.notify(&topic, event);
        }
    }

    /// Creates a resource, and its provider and service when missing.
    ///
    /// The model only applies to a new provider. Re-creating an existing
    /// resource replaces it without lifecycle notification.
    pub fn create_resource(
        &self,
        model: &ModelIdentity,
        path: &ResourcePath,
        resource_type: ResourceType,
        initial: Option<serde_json::Value>,
    ) {
        let now = self.clock.now();
        let mut events = Vec::new();
        {
            let mut providers = self.providers.write();
            if !providers.contains_key(&path.provider) {
                events.push(NotificationEvent::lifecycle(
                    NotificationHeader::provider(Some(model.clone()), &path.provider),
                    LifecycleStatus::ProviderCreated,
                ));
            }
            let provider = providers
                .entry(path.provider.clone())
                .or_insert_with(|| ProviderEntry {
                    model: model.clone(),
                    services: BTreeMap::new(),
                });
            let provider_model = Some(provider.model.clone());

            if !provider.services.contains_key(&path.service) {
                events.push(NotificationEvent::lifecycle(
                    NotificationHeader::service(provider_model.clone(), &path.provider, &path.service),
                    LifecycleStatus::ServiceCreated,
                ));
            }
            let service = provider.services.entry(path.service.clone()).or_default();

            let value = initial
                .clone()
                .map_or_else(TimedValue::empty, |v| TimedValue::new(v, now));
            let previous = service.insert(
                path.resource.clone(),
                ResourceEntry {
                    resource_type,
                    value,
                    metadata: HashMap::new(),
                },
            );
            if previous.is_none() {
                let mut created = NotificationEvent::lifecycle(
                    NotificationHeader::resource(
                        provider_model,
                        &path.provider,
                        &path.service,
                        &path.resource,
                    ),
                    LifecycleStatus::ResourceCreated,
                );
                if let NotificationEvent::Lifecycle(lifecycle) = &mut created {
                    lifecycle.initial_value = initial;
                }
                events.push(created);
            }
        }
        debug!(resource = %path, events = events.len(), "Twin resource created");
        self.publish(events);
    }

    /// Deletes a provider with everything below it.
    pub fn remove_provider(&self, provider: &str) -> bool {
        let removed = self.providers.write().remove(provider);
        let Some(entry) = removed else {
            return false;
        };
        self.publish(vec![NotificationEvent::lifecycle(
            NotificationHeader::provider(Some(entry.model), provider),
            LifecycleStatus::ProviderDeleted,
        )]);
        true
    }

    /// Producer-side value update, timestamped with the twin's clock.
    pub fn update_value(
        &self,
        path: &ResourcePath,
        value: serde_json::Value,
    ) -> Result<(), TwinError> {
        self.set_value(path, value, self.clock.now())
    }

    fn header(model: &ModelIdentity, path: &ResourcePath) -> NotificationHeader {
        NotificationHeader::resource(
            Some(model.clone()),
            &path.provider,
            &path.service,
            &path.resource,
        )
    }

    fn with_resource<T>(
        &self,
        path: &ResourcePath,
        f: impl FnOnce(&ModelIdentity, &mut ResourceEntry) -> Result<T, TwinError>,
    ) -> Result<T, TwinError> {
        let mut providers = self.providers.write();
        let provider = providers
            .get_mut(&path.provider)
            .ok_or_else(|| TwinError::UnknownResource(path.clone()))?;
        let model = provider.model.clone();
        let resource = provider.resource_mut(path)?;
        f(&model, resource)
    }
}

impl DigitalTwin for InMemoryTwin {
    fn provider_model(&self, provider: &str) -> Option<ModelIdentity> {
        self.providers.read().get(provider).map(|p| p.model.clone())
    }

    fn describe_provider(&self, provider: &str) -> Option<ProviderDescription> {
        let providers = self.providers.read();
        let entry = providers.get(provider)?;
        Some(ProviderDescription {
            provider: provider.to_string(),
            model: Some(entry.model.clone()),
            services: entry.services.keys().cloned().collect(),
        })
    }

    fn describe_service(&self, provider: &str, service: &str) -> Option<ServiceDescription> {
        let providers = self.providers.read();
        let entry = providers.get(provider)?;
        let resources = entry.services.get(service)?;
        Some(ServiceDescription {
            provider: provider.to_string(),
            service: service.to_string(),
            model: Some(entry.model.clone()),
            resources: resources.keys().cloned().collect(),
        })
    }

    fn describe_resource(&self, path: &ResourcePath) -> Option<ResourceDescription> {
        let providers = self.providers.read();
        let entry = providers.get(&path.provider)?;
        let resource = entry.services.get(&path.service)?.get(&path.resource)?;
        Some(ResourceDescription {
            path: path.clone(),
            model: Some(entry.model.clone()),
            resource_type: resource.resource_type,
            value: resource.value.clone(),
            metadata: resource.metadata.clone(),
        })
    }

    fn list_providers(&self) -> Vec<ProviderDescription> {
        self.providers
            .read()
            .iter()
            .map(|(name, entry)| ProviderDescription {
                provider: name.clone(),
                model: Some(entry.model.clone()),
                services: entry.services.keys().cloned().collect(),
            })
            .collect()
    }

    fn set_value(
        &self,
        path: &ResourcePath,
        value: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Result<(), TwinError> {
        let event = self.with_resource(path, |model, resource| {
            if resource.resource_type == ResourceType::Action {
                return Err(TwinError::ActionResource(path.clone()));
            }
            let old = std::mem::replace(
                &mut resource.value,
                TimedValue::new(value.clone(), timestamp),
            );
            Ok(NotificationEvent::data(
                Self::header(model, path),
                old.value,
                Some(value),
                timestamp,
            ))
        })?;
        self.publish(vec![event]);
        Ok(())
    }

    fn set_metadata(
        &self,
        path: &ResourcePath,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<(), TwinError> {
        let now = self.clock.now();
        let events = self.with_resource(path, |model, resource| {
            let previous = std::mem::replace(&mut resource.metadata, metadata.clone());
            let mut changed: BTreeMap<&String, Option<serde_json::Value>> = BTreeMap::new();
            for (key, value) in &metadata {
                if previous.get(key) != Some(value) {
                    changed.insert(key, Some(value.clone()));
                }
            }
            for key in previous.keys() {
                if !metadata.contains_key(key) {
                    changed.insert(key, None);
                }
            }
            Ok(changed
                .into_iter()
                .map(|(key, value)| {
                    NotificationEvent::metadata(Self::header(model, path), key.as_str(), value, now)
                })
                .collect::<Vec<_>>())
        })?;
        self.publish(events);
        Ok(())
    }

    fn set_metadata_value(
        &self,
        path: &ResourcePath,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), TwinError> {
        let now = self.clock.now();
        let event = self.with_resource(path, |model, resource| {
            resource.metadata.insert(key.to_string(), value.clone());
            Ok(NotificationEvent::metadata(
                Self::header(model, path),
                key,
                Some(value),
                now,
            ))
        })?;
        self.publish(vec![event]);
        Ok(())
    }

    fn act(
        &self,
        path: &ResourcePath,
        parameters: HashMap<String, serde_json::Value>,
    ) -> Result<serde_json::Value, TwinError> {
        let now = self.clock.now();
        let event = self.with_resource(path, |model, resource| {
            if resource.resource_type != ResourceType::Action {
                return Err(TwinError::NotAnAction(path.clone()));
            }
            Ok(NotificationEvent::action(
                Self::header(model, path),
                parameters,
                now,
            ))
        })?;
        self.publish(vec![event]);
        Ok(serde_json::Value::Null)
    }
}

impl std::fmt::Debug for InMemoryTwin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTwin")
            .field("providers", &self.providers.read().len())
            .finish()
    }
}
