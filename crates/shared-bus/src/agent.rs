//! # Agents
//!
//! An agent observes the whole notification stream outside of any session.
//! It is a [`MessageCallback`] fed through an [`AgentFilter`]; no
//! authorization is applied, agents are trusted in-process consumers.

use crate::callback::{CallbackError, CallbackStats, MessageCallback, ShutdownOutcome};
use crate::events::{AgentFilter, TopicMessage};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Agent identifier.
pub type AgentId = Uuid;

/// A standalone consumer of notifications.
#[derive(Debug)]
pub struct Agent {
    id: AgentId,
    name: String,
    filter: AgentFilter,
    callback: MessageCallback<TopicMessage>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        filter: AgentFilter,
        callback: MessageCallback<TopicMessage>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            filter,
            callback,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter(&self) -> &AgentFilter {
        &self.filter
    }

    pub fn is_active(&self) -> bool {
        self.callback.is_active()
    }

    pub fn stats(&self) -> CallbackStats {
        self.callback.stats()
    }

    /// Offers a message to the agent.
    ///
    /// Returns `false` once the agent is no longer active; the caller should
    /// drop it.
    pub fn offer(&self, message: &TopicMessage) -> bool {
        if !self.callback.is_active() {
            return false;
        }
        if !self.filter.matches(message) {
            return true;
        }
        match self.callback.push(message.clone()) {
            Ok(()) => true,
            Err(CallbackError::Inactive(_))
            | Err(CallbackError::TimedOut(_))
            | Err(CallbackError::StoppedByPolicy(_)) => {
                debug!(agent_id = %self.id, agent = %self.name, "Agent stopped while receiving");
                false
            }
            Err(error) => {
                debug!(agent_id = %self.id, %error, "Agent refused message");
                self.callback.is_active()
            }
        }
    }

    pub fn stop(&self) {
        self.callback.stop();
    }

    pub async fn shutdown(&self, grace: Duration) -> ShutdownOutcome {
        self.callback.shutdown(grace).await
    }
}

/// Registered agents, keyed by id.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: DashMap<AgentId, Arc<Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an agent. Inactive agents are refused.
    pub fn register(&self, agent: Agent) -> Option<AgentId> {
        if !agent.is_active() {
            return None;
        }
        let id = agent.id();
        debug!(agent_id = %id, agent = %agent.name(), "Registered agent");
        self.agents.insert(id, Arc::new(agent));
        Some(id)
    }

    /// Removes an agent and stops it.
    pub fn unregister(&self, id: &AgentId) -> bool {
        match self.agents.remove(id) {
            Some((_, agent)) => {
                agent.stop();
                debug!(agent_id = %id, "Unregistered agent");
                true
            }
            None => false,
        }
    }

    /// Offers a message to every agent and drops the ones found inactive.
    /// Returns the number of agents still registered.
    pub fn dispatch(&self, message: &TopicMessage) -> usize {
        // Snapshot so that no shard lock is held while sinks run.
        let agents: Vec<Arc<Agent>> = self.agents.iter().map(|e| Arc::clone(e.value())).collect();

        let mut live = 0;
        for agent in agents {
            if agent.offer(message) {
                live += 1;
            } else {
                self.agents.remove(&agent.id());
                debug!(agent_id = %agent.id(), "Dropped inactive agent");
            }
        }
        live
    }

    pub fn get(&self, id: &AgentId) -> Option<Arc<Agent>> {
        self.agents.get(id).map(|e| Arc::clone(e.value()))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Removes every agent and shuts each one down.
    pub async fn shutdown_all(&self, grace: Duration) {
        let ids: Vec<AgentId> = self.agents.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, agent)) = self.agents.remove(&id) {
                let outcome = agent.shutdown(grace).await;
                debug!(agent_id = %id, ?outcome, "Agent shut down");
            }
        }
    }

    /// Removes and stops every agent without waiting.
    pub fn stop_all(&self) {
        let ids: Vec<AgentId> = self.agents.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.unregister(&id);
        }
    }
}
