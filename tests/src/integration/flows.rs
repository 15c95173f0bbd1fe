//! # Notification Flows
//!
//! Producer to sink, through the session store:
//!
//! ```text
//! InMemoryTwin ──notify──► SessionManager ──► Session ──► ListenerSinks
//! ```
//!
//! Every scenario runs with an allow-all policy so that only routing is
//! under test.

#[cfg(test)]
mod tests {
    use crate::integration::support::{thermometer, value_change, Gateway, Recorder};
    use sg_02_session::{Clock, ListenerSinks, SessionError};
    use shared_types::{LifecycleStatus, NotificationEvent, ResourcePath, UserInfo};

    // =============================================================================
    // END TO END
    // =============================================================================

    #[test]
    fn test_value_change_round_trip() {
        let gw = Gateway::open();
        let path = ResourcePath::new("p1", "s1", "r1");
        gw.sensor(&thermometer(), &path, 10);

        let session = gw
            .manager
            .create_session(&UserInfo::authenticated("alice"))
            .unwrap();
        let recorder = Recorder::default();
        let id = session
            .add_listener(&["p1/s1/r1"], ListenerSinks::new().on_data(recorder.sink()))
            .unwrap();

        gw.clock.advance(chrono::Duration::seconds(1));
        gw.twin.update_value(&path, 20.into()).unwrap();

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            NotificationEvent::Data(data) => {
                assert_eq!(data.old_value, Some(10.into()));
                assert_eq!(data.new_value, Some(20.into()));
                assert_eq!(data.timestamp, gw.clock.now());
            }
            other => panic!("unexpected event {other:?}"),
        }

        assert!(session.remove_listener(&id));
        gw.twin.update_value(&path, 20.into()).unwrap();
        assert_eq!(recorder.len(), 1);

        session.expire();
        assert!(session.is_expired());
        assert!(matches!(
            session.extend(chrono::Duration::seconds(5)),
            Err(SessionError::SessionExpired(_))
        ));
    }

    #[test]
    fn test_prefix_and_exact_registrations() {
        let gw = Gateway::open();
        let session = gw
            .manager
            .create_session(&UserInfo::authenticated("alice"))
            .unwrap();
        let prefix = Recorder::default();
        let exact = Recorder::default();
        session
            .add_listener(&["A/B*"], ListenerSinks::new().on_data(prefix.sink()))
            .unwrap();
        session
            .add_listener(&["A/B/C"], ListenerSinks::new().on_data(exact.sink()))
            .unwrap();

        let event = value_change(&ResourcePath::new("A", "B", "C"), 1, 2);
        gw.manager.notify("DATA/A/B/C/D", event.clone());
        assert_eq!(prefix.topics(), vec!["DATA/A/B/C/D"]);
        assert!(exact.topics().is_empty());

        gw.manager.notify("DATA/A/B/C", event);
        assert_eq!(prefix.len(), 2);
        assert_eq!(exact.topics(), vec!["DATA/A/B/C"]);
    }

    #[test]
    fn test_removing_one_subscription_keeps_siblings() {
        let gw = Gateway::open();
        let session = gw
            .manager
            .create_session(&UserInfo::authenticated("alice"))
            .unwrap();
        let removed = Recorder::default();
        let sibling = Recorder::default();
        let id = session
            .add_listener(&["A/B"], ListenerSinks::new().on_data(removed.sink()))
            .unwrap();
        session
            .add_listener(&["A/B"], ListenerSinks::new().on_data(sibling.sink()))
            .unwrap();

        session.remove_listener(&id);
        gw.manager
            .notify("DATA/A/B", value_change(&ResourcePath::new("A", "B", "x"), 0, 1));

        assert_eq!(removed.len(), 0);
        assert_eq!(sibling.len(), 1);
    }

    #[test]
    fn test_lifecycle_and_metadata_kinds() {
        let gw = Gateway::open();
        let session = gw
            .manager
            .create_session(&UserInfo::authenticated("alice"))
            .unwrap();
        let lifecycle = Recorder::default();
        let metadata = Recorder::default();
        session
            .add_listener(
                &["p1/*"],
                ListenerSinks::new()
                    .on_lifecycle(lifecycle.sink())
                    .on_metadata(metadata.sink()),
            )
            .unwrap();

        let path = ResourcePath::new("p1", "s1", "r1");
        gw.sensor(&thermometer(), &path, 0);
        gw.twin.update_value(&path, 1.into()).unwrap();
        session
            .set_resource_metadata_value(&path, "unit", "C".into())
            .unwrap();

        assert_eq!(lifecycle.topics(), vec!["LIFECYCLE/p1/s1", "LIFECYCLE/p1/s1/r1"]);
        let statuses: Vec<LifecycleStatus> = lifecycle
            .events()
            .into_iter()
            .filter_map(|e| match e {
                NotificationEvent::Lifecycle(l) => Some(l.status),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![LifecycleStatus::ServiceCreated, LifecycleStatus::ResourceCreated]
        );
        assert_eq!(metadata.topics(), vec!["METADATA/p1/s1/r1"]);
    }

    #[test]
    fn test_broadcast_reaches_every_matching_session() {
        let gw = Gateway::open();
        let recorders: Vec<Recorder> = (0..5).map(|_| Recorder::default()).collect();
        for (i, recorder) in recorders.iter().enumerate() {
            let topic = if i % 2 == 0 { "p1/*" } else { "p2/*" };
            gw.manager
                .create_session(&UserInfo::authenticated(format!("user-{i}")))
                .unwrap()
                .add_listener(&[topic], ListenerSinks::new().on_data(recorder.sink()))
                .unwrap();
        }

        let path = ResourcePath::new("p1", "s1", "r1");
        gw.sensor(&thermometer(), &path, 0);
        gw.twin.update_value(&path, 1.into()).unwrap();

        let counts: Vec<usize> = recorders.iter().map(Recorder::len).collect();
        assert_eq!(counts, vec![1, 0, 1, 0, 1]);
    }
}
