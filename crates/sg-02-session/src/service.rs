//! # Session Store
//!
//! `SessionManager` creates and looks up sessions per user, fans every
//! notification out to all live sessions and registered agents, and owns the
//! authorization engine new sessions draw their authorizer from.
//!
//! ## Invariants
//!
//! | Rule | Where |
//! |------|-------|
//! | A user only sees their own sessions | `StoreState::owned` |
//! | Expired sessions leave the store | expiration listener set in `create_session_with_checker` |
//! | Swapping the engine invalidates every session | `replace_engine` |
//! | A session is never created against a stale engine | generation check in `create_session_with_checker` |
//! | No session method runs under the store lock | every public method |

use crate::domain::{
    ConfigError, ListenerDefaults, LivenessReport, Session, SessionBuilder, SessionError,
    SessionManagerConfig, SessionResult,
};
use crate::ports::{
    Clock, DigitalTwin, NotificationReceiver, SessionActivityChecker, SessionStore, SystemClock,
};
use gateway_telemetry::{SESSIONS_ACTIVE, SESSIONS_CREATED};
use parking_lot::{Mutex, RwLock};
use sg_01_authorization::{AuthorizationEngine, SessionAuthorizer};
use shared_bus::{Agent, AgentId, AgentRegistry, TopicMessage};
use shared_types::{NotificationEvent, UserInfo};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Default)]
struct StoreState {
    engine: Option<Arc<dyn AuthorizationEngine>>,
    /// Bumped on every engine change.
    generation: u64,
    sessions: HashMap<String, Arc<Session>>,
    user_sessions: HashMap<String, HashSet<String>>,
    default_sessions: HashMap<String, String>,
}

impl StoreState {
    fn insert(&mut self, session: Arc<Session>) {
        let id = session.session_id().to_string();
        self.user_sessions
            .entry(session.user().user_id.clone())
            .or_default()
            .insert(id.clone());
        self.sessions.insert(id, session);
        SESSIONS_ACTIVE.inc();
    }

    fn remove(&mut self, user_id: &str, session_id: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.remove(session_id);
        if let Some(ids) = self.user_sessions.get_mut(user_id) {
            ids.remove(session_id);
            if ids.is_empty() {
                self.user_sessions.remove(user_id);
            }
        }
        if self
            .default_sessions
            .get(user_id)
            .is_some_and(|id| id == session_id)
        {
            self.default_sessions.remove(user_id);
        }
        if removed.is_some() {
            SESSIONS_ACTIVE.dec();
        }
        removed
    }

    fn owned(&self, user_id: &str, session_id: &str) -> Option<Arc<Session>> {
        self.user_sessions
            .get(user_id)
            .filter(|ids| ids.contains(session_id))
            .and_then(|_| self.sessions.get(session_id).cloned())
    }

    fn user_sessions(&self, user_id: &str) -> Vec<Arc<Session>> {
        self.user_sessions
            .get(user_id)
            .map(|ids| ids.iter().filter_map(|id| self.sessions.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    fn drain(&mut self) -> Vec<Arc<Session>> {
        self.user_sessions.clear();
        self.default_sessions.clear();
        let drained: Vec<Arc<Session>> = self.sessions.drain().map(|(_, s)| s).collect();
        SESSIONS_ACTIVE.sub(drained.len() as i64);
        drained
    }
}

/// The session store.
pub struct SessionManager {
    config: SessionManagerConfig,
    clock: Arc<dyn Clock>,
    twin: Arc<dyn DigitalTwin>,
    state: RwLock<StoreState>,
    agents: AgentRegistry,
    open: AtomicBool,
    checker_task: Mutex<Option<JoinHandle<()>>>,
    this: Weak<SessionManager>,
}

impl SessionManager {
    pub fn new(
        config: SessionManagerConfig,
        twin: Arc<dyn DigitalTwin>,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        if config.activity_check_misconfigured() {
            warn!(
                interval_secs = config.activity_check_interval_secs,
                expiry_secs = config.expiry_secs,
                "Activity check interval does not fit in the session expiry, checker disabled"
            );
        }

        info!(
            expiry_secs = config.expiry_secs,
            policy = ?config.auth_policy,
            delivery = ?config.delivery,
            "Session manager started"
        );

        Ok(Arc::new_cyclic(|this| Self {
            config,
            clock,
            twin,
            state: RwLock::new(StoreState::default()),
            agents: AgentRegistry::new(),
            open: AtomicBool::new(true),
            checker_task: Mutex::new(None),
            this: this.clone(),
        }))
    }

    pub fn with_system_clock(
        config: SessionManagerConfig,
        twin: Arc<dyn DigitalTwin>,
    ) -> Result<Arc<Self>, ConfigError> {
        Self::new(config, twin, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &SessionManagerConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(SessionError::ManagerClosed)
        }
    }

    fn listener_defaults(&self) -> ListenerDefaults {
        ListenerDefaults {
            delivery: self.config.delivery,
            error_policy: self.config.callback_error_policy,
        }
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    pub fn create_session(&self, user: &UserInfo) -> SessionResult<Arc<Session>> {
        self.create_session_with_checker(user, None)
    }

    /// Creates a session whose liveness is probed by `checker`.
    pub fn create_session_with_checker(
        &self,
        user: &UserInfo,
        checker: Option<Arc<dyn SessionActivityChecker>>,
    ) -> SessionResult<Arc<Session>> {
        self.ensure_open()?;

        let session = loop {
            let (engine, generation) = {
                let state = self.state.read();
                (state.engine.clone(), state.generation)
            };
            let authorizer =
                SessionAuthorizer::resolve(engine.as_deref(), self.config.auth_policy, user);
            let session = SessionBuilder::new(
                user.clone(),
                authorizer,
                Arc::clone(&self.clock),
                Arc::clone(&self.twin),
            )
            .ttl(self.config.session_ttl())
            .listener_defaults(self.listener_defaults())
            .activity_checker(checker.clone())
            .build();

            let mut state = self.state.write();
            if !self.is_open() {
                return Err(SessionError::ManagerClosed);
            }
            if state.generation != generation {
                debug!(user_id = %user.user_id, "Authorization engine changed during session creation, retrying");
                continue;
            }
            state.insert(Arc::clone(&session));
            break session;
        };

        let store = self.this.clone();
        session.add_expiration_listener(move |expired| {
            if let Some(store) = store.upgrade() {
                store.forget(expired);
            }
        });

        SESSIONS_CREATED.inc();
        info!(
            session_id = %session.session_id(),
            user_id = %user.user_id,
            authorizer = session.authorizer().kind(),
            "Session created"
        );
        Ok(session)
    }

    fn forget(&self, session: &Session) {
        let removed = self
            .state
            .write()
            .remove(&session.user().user_id, session.session_id());
        if removed.is_some() {
            debug!(session_id = %session.session_id(), "Session removed from store");
        }
    }

    /// The session `session_id` if it belongs to `user` and is live.
    pub fn get_session(
        &self,
        user: &UserInfo,
        session_id: &str,
    ) -> SessionResult<Option<Arc<Session>>> {
        self.ensure_open()?;
        let session = self.state.read().owned(&user.user_id, session_id);
        Ok(session.filter(|s| !s.is_expired()))
    }

    /// The default session of `user`, created when missing or expired.
    ///
    /// Concurrent callers all receive the first session registered as
    /// default; losing candidates are expired.
    pub fn get_default_session(&self, user: &UserInfo) -> SessionResult<Arc<Session>> {
        loop {
            self.ensure_open()?;
            let existing = {
                let state = self.state.read();
                state
                    .default_sessions
                    .get(&user.user_id)
                    .and_then(|id| state.sessions.get(id).cloned())
            };
            if let Some(session) = existing {
                if !session.is_expired() {
                    return Ok(session);
                }
            }

            let candidate = self.create_session(user)?;
            let claimed = {
                let mut state = self.state.write();
                let taken = state
                    .default_sessions
                    .get(&user.user_id)
                    .is_some_and(|id| state.sessions.contains_key(id));
                let present = state.sessions.contains_key(candidate.session_id());
                if !taken && present {
                    state
                        .default_sessions
                        .insert(user.user_id.clone(), candidate.session_id().to_string());
                    true
                } else {
                    false
                }
            };
            if claimed {
                return Ok(candidate);
            }
            debug!(user_id = %user.user_id, "Default session claimed concurrently, retrying");
            candidate.expire();
        }
    }

    /// Ids of the live sessions of `user`, sorted.
    pub fn session_ids(&self, user: &UserInfo) -> SessionResult<Vec<String>> {
        self.ensure_open()?;
        let sessions = self.state.read().user_sessions(&user.user_id);
        let mut ids: Vec<String> = sessions
            .into_iter()
            .filter(|s| !s.is_expired())
            .map(|s| s.session_id().to_string())
            .collect();
        ids.sort();
        Ok(ids)
    }

    pub fn create_anonymous_session(&self) -> SessionResult<Arc<Session>> {
        self.create_session(&UserInfo::anonymous())
    }

    pub fn get_anonymous_session(&self, session_id: &str) -> SessionResult<Option<Arc<Session>>> {
        self.get_session(&UserInfo::anonymous(), session_id)
    }

    pub fn get_default_anonymous_session(&self) -> SessionResult<Arc<Session>> {
        self.get_default_session(&UserInfo::anonymous())
    }

    pub fn anonymous_session_ids(&self) -> SessionResult<Vec<String>> {
        self.session_ids(&UserInfo::anonymous())
    }

    /// Sessions held, including lapsed ones not yet observed.
    pub fn session_count(&self) -> usize {
        self.state.read().sessions.len()
    }

    // =========================================================================
    // Notifications and agents
    // =========================================================================

    /// Broadcasts a notification to every session and agent.
    pub fn notify(&self, topic: &str, event: NotificationEvent) {
        if !self.is_open() {
            debug!(topic, "Session manager closed, notification dropped");
            return;
        }
        self.dispatch(&TopicMessage::new(topic, event));
    }

    /// Fans a shared message out. Returns how many session listeners took it.
    pub fn dispatch(&self, message: &TopicMessage) -> usize {
        let sessions: Vec<Arc<Session>> = self.state.read().sessions.values().cloned().collect();
        let delivered = sessions.iter().map(|s| s.deliver(message)).sum();
        let agents = self.agents.dispatch(message);
        debug!(topic = %message.topic, sessions = sessions.len(), delivered, agents, "Notification dispatched");
        delivered
    }

    pub fn register_agent(&self, agent: Agent) -> SessionResult<AgentId> {
        self.ensure_open()?;
        let name = agent.name().to_string();
        let id = self
            .agents
            .register(agent)
            .ok_or_else(|| SessionError::InvalidArgument(format!("agent {name} is not active")))?;
        info!(agent_id = %id, agent = %name, "Agent registered");
        Ok(id)
    }

    pub fn unregister_agent(&self, id: &AgentId) -> bool {
        self.agents.unregister(id)
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    // =========================================================================
    // Authorization engine
    // =========================================================================

    /// Installs an authorization engine. Every existing session is expired.
    pub fn set_authorization_engine(&self, engine: Arc<dyn AuthorizationEngine>) -> SessionResult<()> {
        self.replace_engine(Some(engine))
    }

    /// Removes the authorization engine. Every existing session is expired.
    pub fn clear_authorization_engine(&self) -> SessionResult<()> {
        self.replace_engine(None)
    }

    pub fn has_authorization_engine(&self) -> bool {
        self.state.read().engine.is_some()
    }

    fn replace_engine(&self, engine: Option<Arc<dyn AuthorizationEngine>>) -> SessionResult<()> {
        self.ensure_open()?;
        let installed = engine.is_some();
        let invalidated = {
            let mut state = self.state.write();
            state.engine = engine;
            state.generation += 1;
            state.drain()
        };
        info!(
            installed,
            invalidated = invalidated.len(),
            "Authorization engine changed, sessions invalidated"
        );
        for session in invalidated {
            session.expire();
        }
        Ok(())
    }

    // =========================================================================
    // Activity checks
    // =========================================================================

    /// Extends sessions close to expiry whose client is still active.
    ///
    /// Only sessions with an activity checker and an expiry within the
    /// configured threshold are probed. Inactive ones are left to lapse.
    pub fn check_sessions_liveness(&self) -> LivenessReport {
        let now = self.clock.now();
        let threshold = self.config.activity_check_threshold();
        let extension = self.config.activity_check_extension();
        let sessions: Vec<Arc<Session>> = self.state.read().sessions.values().cloned().collect();

        let mut report = LivenessReport::default();
        for session in sessions {
            if !session.has_activity_checker() {
                continue;
            }
            let Some(expiry) = session.get_expiry() else {
                continue;
            };
            let due = expiry
                .checked_sub_signed(threshold)
                .map_or(true, |start| start <= now);
            if !due {
                continue;
            }

            report.probed += 1;
            if session.check_activity() != Some(true) {
                debug!(session_id = %session.session_id(), "Client inactive, session left to lapse");
                continue;
            }
            match session.extend(extension) {
                Ok(()) => report.extended += 1,
                Err(error) => {
                    debug!(session_id = %session.session_id(), %error, "Could not extend session")
                }
            }
        }

        if report.probed > 0 {
            debug!(probed = report.probed, extended = report.extended, "Liveness check done");
        }
        report
    }

    /// Runs [`Self::check_sessions_liveness`] periodically on the current
    /// Tokio runtime. Returns `false` when the checker is disabled or no
    /// runtime is available.
    pub fn spawn_activity_checker(&self) -> bool {
        let Some(period) = self.config.activity_check_interval() else {
            debug!("Activity checker disabled");
            return false;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No Tokio runtime, activity checker not started");
            return false;
        };

        let store = self.this.clone();
        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(manager) = store.upgrade() else {
                    break;
                };
                if !manager.is_open() {
                    break;
                }
                manager.check_sessions_liveness();
            }
        });

        if let Some(previous) = self.checker_task.lock().replace(task) {
            previous.abort();
        }
        info!(period_secs = period.as_secs(), "Activity checker started");
        true
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Expires every session and stops every agent at once. Later store
    /// calls fail with `ManagerClosed`.
    pub fn close(&self) {
        let Some(sessions) = self.begin_close() else {
            return;
        };
        for session in &sessions {
            session.expire();
        }
        self.agents.stop_all();
        info!(sessions = sessions.len(), "Session manager closed");
    }

    /// Like [`Self::close`], but buffered listeners and agents get the
    /// configured grace period to drain. Returns the discarded message count.
    pub async fn shutdown(&self) -> usize {
        let Some(sessions) = self.begin_close() else {
            return 0;
        };
        let grace = self.config.shutdown_grace();
        let mut discarded = 0;
        for session in &sessions {
            discarded += session.shutdown(grace).await;
        }
        self.agents.shutdown_all(grace).await;
        info!(sessions = sessions.len(), discarded, "Session manager shut down");
        discarded
    }

    fn begin_close(&self) -> Option<Vec<Arc<Session>>> {
        if !self.open.swap(false, Ordering::AcqRel) {
            return None;
        }
        if let Some(task) = self.checker_task.lock().take() {
            task.abort();
        }
        Some(self.state.write().drain())
    }
}

impl NotificationReceiver for SessionManager {
    fn notify(&self, topic: &str, event: NotificationEvent) {
        SessionManager::notify(self, topic, event);
    }
}

impl SessionStore for SessionManager {
    fn create_session(&self, user: &UserInfo) -> SessionResult<Arc<Session>> {
        SessionManager::create_session(self, user)
    }

    fn get_session(&self, user: &UserInfo, session_id: &str) -> SessionResult<Option<Arc<Session>>> {
        SessionManager::get_session(self, user, session_id)
    }

    fn get_default_session(&self, user: &UserInfo) -> SessionResult<Arc<Session>> {
        SessionManager::get_default_session(self, user)
    }

    fn session_ids(&self, user: &UserInfo) -> SessionResult<Vec<String>> {
        SessionManager::session_ids(self, user)
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("open", &self.is_open())
            .field("sessions", &self.session_count())
            .field("agents", &self.agents.len())
            .finish()
    }
}
