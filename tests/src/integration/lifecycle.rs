//! # Session Lifecycle Scenarios
//!
//! ```text
//! create ──► live ──┬── ttl lapses (observed lazily) ──┐
//!                   ├── expire()                       ├──► expired (sticky)
//!                   ├── engine swapped                 │
//!                   └── store closed ──────────────────┘
//! ```

#[cfg(test)]
mod tests {
    use crate::integration::support::{thermometer, Gateway, Recorder};
    use sg_01_authorization::{AccessRule, DefaultAuthPolicy, RuleTableEngine};
    use sg_02_session::{
        Clock, ListenerSinks, SessionActivityChecker, SessionError, SessionManagerConfig,
    };
    use shared_bus::{Agent, AgentFilter, MessageCallback};
    use shared_types::{PermissionLevel, ResourcePath, UserInfo};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    fn short_lived() -> Gateway {
        Gateway::new(SessionManagerConfig {
            expiry_secs: 30,
            activity_check_interval_secs: 5,
            activity_check_threshold_secs: 10,
            activity_check_extension_secs: Some(20),
            auth_policy: DefaultAuthPolicy::AllowAll,
            ..SessionManagerConfig::default()
        })
    }

    #[test]
    fn test_lapsed_session_stops_receiving_and_is_forgotten() {
        let gw = short_lived();
        let path = ResourcePath::new("p1", "s1", "r1");
        gw.sensor(&thermometer(), &path, 0);
        let alice = UserInfo::authenticated("alice");
        let session = gw.manager.create_session(&alice).unwrap();
        let recorder = Recorder::default();
        session
            .add_listener(&["p1/*"], ListenerSinks::new().on_data(recorder.sink()))
            .unwrap();
        let expirations = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&expirations);
        session.add_expiration_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        gw.twin.update_value(&path, 1.into()).unwrap();
        gw.clock.advance(chrono::Duration::seconds(30));
        gw.twin.update_value(&path, 2.into()).unwrap();

        assert_eq!(recorder.len(), 1);
        assert_eq!(expirations.load(Ordering::SeqCst), 1);
        assert!(gw
            .manager
            .get_session(&alice, session.session_id())
            .unwrap()
            .is_none());
        assert_eq!(gw.manager.session_count(), 0);

        session.expire();
        assert_eq!(expirations.load(Ordering::SeqCst), 1);
        assert!(matches!(
            session.set_resource_value(&path, 3.into()),
            Err(SessionError::SessionExpired(_))
        ));
    }

    #[test]
    fn test_extend_resets_rather_than_maximizes() {
        let gw = short_lived();
        let session = gw
            .manager
            .create_session(&UserInfo::authenticated("alice"))
            .unwrap();
        let original = session.get_expiry().unwrap();

        session.extend(chrono::Duration::seconds(5)).unwrap();
        let shortened = session.get_expiry().unwrap();
        assert!(shortened < original);
        assert_eq!(shortened, gw.clock.now() + chrono::Duration::seconds(5));

        assert!(matches!(
            session.extend(chrono::Duration::seconds(-5)),
            Err(SessionError::InvalidArgument(_))
        ));
        assert_eq!(session.get_expiry(), Some(shortened));
    }

    #[test]
    fn test_default_session_survives_until_it_lapses() {
        let gw = short_lived();
        let alice = UserInfo::authenticated("alice");

        let first = gw.manager.get_default_session(&alice).unwrap();
        gw.clock.advance(chrono::Duration::seconds(10));
        assert_eq!(
            gw.manager.get_default_session(&alice).unwrap().session_id(),
            first.session_id()
        );

        gw.clock.advance(chrono::Duration::seconds(20));
        let second = gw.manager.get_default_session(&alice).unwrap();
        assert_ne!(second.session_id(), first.session_id());
        assert_eq!(
            gw.manager.session_ids(&alice).unwrap(),
            vec![second.session_id().to_string()]
        );
    }

    #[test]
    fn test_liveness_sweep_keeps_connected_clients() {
        let gw = short_lived();
        let connected = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&connected);
        let checker: Arc<dyn SessionActivityChecker> =
            Arc::new(move |_: &str, _: &UserInfo| flag.load(Ordering::SeqCst));
        let session = gw
            .manager
            .create_session_with_checker(&UserInfo::authenticated("alice"), Some(checker))
            .unwrap();

        for step in [25, 15, 15, 15, 15] {
            gw.clock.advance(chrono::Duration::seconds(step));
            let report = gw.manager.check_sessions_liveness();
            assert_eq!((report.probed, report.extended), (1, 1));
            assert!(!session.is_expired());
        }

        connected.store(false, Ordering::SeqCst);
        gw.clock.advance(chrono::Duration::seconds(15));
        let report = gw.manager.check_sessions_liveness();
        assert_eq!((report.probed, report.extended), (1, 0));
        gw.clock.advance(chrono::Duration::seconds(5));
        assert!(session.is_expired());
    }

    #[test]
    fn test_engine_swap_stops_existing_subscriptions() {
        let gw = short_lived();
        let path = ResourcePath::new("p1", "s1", "r1");
        gw.sensor(&thermometer(), &path, 0);
        let alice = UserInfo::authenticated("alice");
        let old = Recorder::default();
        let old_session = gw.manager.create_session(&alice).unwrap();
        old_session
            .add_listener(&["p1/*"], ListenerSinks::new().on_data(old.sink()))
            .unwrap();

        gw.manager
            .set_authorization_engine(Arc::new(RuleTableEngine::new(vec![AccessRule::allow()
                .for_user("alice")
                .at_level(PermissionLevel::Read)])))
            .unwrap();
        gw.twin.update_value(&path, 1.into()).unwrap();

        assert!(old_session.is_expired());
        assert_eq!(old.len(), 0);

        let new = Recorder::default();
        gw.manager
            .create_session(&alice)
            .unwrap()
            .add_listener(&["p1/*"], ListenerSinks::new().on_data(new.sink()))
            .unwrap();
        gw.twin.update_value(&path, 2.into()).unwrap();
        assert_eq!(new.len(), 1);
    }

    #[test]
    fn test_close_ends_sessions_and_agents() {
        let gw = short_lived();
        let alice = UserInfo::authenticated("alice");
        let session = gw.manager.create_session(&alice).unwrap();
        let audit = Recorder::default();
        let agent = Agent::new("audit", AgentFilter::all(), MessageCallback::direct(audit.sink()));
        gw.manager.register_agent(agent).unwrap();

        gw.manager.close();
        let path = ResourcePath::new("p1", "s1", "r1");
        gw.sensor(&thermometer(), &path, 0);

        assert!(session.is_expired());
        assert_eq!(audit.len(), 0);
        assert_eq!(gw.manager.agent_count(), 0);
        assert!(matches!(
            gw.manager.get_default_session(&alice),
            Err(SessionError::ManagerClosed)
        ));
    }

    #[tokio::test]
    async fn test_activity_checker_runs_on_the_runtime() {
        let gw = short_lived();
        assert!(gw.manager.spawn_activity_checker());
        assert_eq!(gw.manager.shutdown().await, 0);
        assert!(!gw.manager.is_open());
    }
}
