//! # Delivery Scenarios
//!
//! Buffered ordering, error policies, callback timeouts and agents, seen
//! through the session store.

#[cfg(test)]
mod tests {
    use crate::integration::support::{thermometer, value_change, Gateway, Recorder};
    use parking_lot::Mutex;
    use sg_02_session::{ListenerSinks, SessionManagerConfig};
    use sg_01_authorization::DefaultAuthPolicy;
    use shared_bus::{
        Agent, AgentFilter, CallbackTimeout, DeliveryMode, ErrorPolicy, MessageCallback,
        SinkError, TopicMessage,
    };
    use shared_types::{NotificationEvent, NotificationKind, ResourcePath, UserInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn buffered_gateway(capacity: usize) -> Gateway {
        Gateway::new(SessionManagerConfig {
            activity_check_interval_secs: 0,
            auth_policy: DefaultAuthPolicy::AllowAll,
            delivery: DeliveryMode::Buffered { capacity },
            shutdown_grace_ms: 2_000,
            ..SessionManagerConfig::default()
        })
    }

    fn new_values(recorder: &Recorder) -> Vec<i64> {
        recorder
            .events()
            .into_iter()
            .filter_map(|e| match e {
                NotificationEvent::Data(d) => d.new_value.and_then(|v| v.as_i64()),
                _ => None,
            })
            .collect()
    }

    // =============================================================================
    // BUFFERED DELIVERY
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_buffered_delivery_preserves_submission_order() {
        let gw = buffered_gateway(256);
        let path = ResourcePath::new("p1", "s1", "r1");
        gw.sensor(&thermometer(), &path, 0);
        let recorder = Recorder::default();
        gw.manager
            .create_session(&UserInfo::authenticated("alice"))
            .unwrap()
            .add_listener(&["p1/s1/r1"], ListenerSinks::new().on_data(recorder.sink()))
            .unwrap();

        for value in 1..=100 {
            gw.twin.update_value(&path, value.into()).unwrap();
        }
        assert_eq!(gw.manager.shutdown().await, 0);

        assert_eq!(new_values(&recorder), (1..=100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_slow_buffered_sink_does_not_block_direct_one() {
        let gw = buffered_gateway(16);
        let path = ResourcePath::new("p1", "s1", "r1");
        gw.sensor(&thermometer(), &path, 0);

        let slow_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&slow_calls);
        let slow = move |_: &TopicMessage| -> Result<(), SinkError> {
            std::thread::sleep(Duration::from_millis(5));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        let direct = Recorder::default();
        let session = gw
            .manager
            .create_session(&UserInfo::authenticated("alice"))
            .unwrap();
        session
            .add_listener(&["p1/*"], ListenerSinks::new().on_data(slow))
            .unwrap();
        session
            .add_listener(
                &["p1/*"],
                ListenerSinks::new()
                    .on_data(direct.sink())
                    .with_delivery(DeliveryMode::Direct),
            )
            .unwrap();

        for value in 1..=3 {
            gw.twin.update_value(&path, value.into()).unwrap();
        }
        assert_eq!(new_values(&direct), vec![1, 2, 3]);

        assert_eq!(gw.manager.shutdown().await, 0);
        assert_eq!(slow_calls.load(Ordering::SeqCst), 3);
    }

    // =============================================================================
    // ERROR POLICIES AND TIMEOUTS
    // =============================================================================

    #[test]
    fn test_stop_policy_is_contained_to_its_subscription() {
        let gw = Gateway::open();
        let path = ResourcePath::new("p1", "s1", "r1");
        gw.sensor(&thermometer(), &path, 0);

        let broken = gw
            .manager
            .create_session(&UserInfo::authenticated("alice"))
            .unwrap();
        broken
            .add_listener(
                &["p1/*"],
                ListenerSinks::new()
                    .on_data(|_: &TopicMessage| -> Result<(), SinkError> {
                        Err(SinkError::Closed)
                    })
                    .with_error_handler(ErrorPolicy::Stop),
            )
            .unwrap();
        let healthy_same_session = Recorder::default();
        broken
            .add_listener(
                &["p1/*"],
                ListenerSinks::new().on_data(healthy_same_session.sink()),
            )
            .unwrap();
        let other_session = Recorder::default();
        gw.manager
            .create_session(&UserInfo::authenticated("bob"))
            .unwrap()
            .add_listener(&["p1/*"], ListenerSinks::new().on_data(other_session.sink()))
            .unwrap();

        gw.twin.update_value(&path, 1.into()).unwrap();
        gw.twin.update_value(&path, 2.into()).unwrap();

        assert_eq!(broken.active_listeners().len(), 1);
        assert!(!broken.is_expired());
        assert_eq!(new_values(&healthy_same_session), vec![1, 2]);
        assert_eq!(new_values(&other_session), vec![1, 2]);
    }

    #[test]
    fn test_error_handler_sees_the_failure() {
        let gw = Gateway::open();
        let path = ResourcePath::new("p1", "s1", "r1");
        gw.sensor(&thermometer(), &path, 0);
        let failures = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&failures);

        let session = gw
            .manager
            .create_session(&UserInfo::authenticated("alice"))
            .unwrap();
        session
            .add_listener(
                &["p1/*"],
                ListenerSinks::new()
                    .on_data(|m: &TopicMessage| -> Result<(), SinkError> {
                        Err(SinkError::failed(format!("cannot forward {}", m.topic)))
                    })
                    .with_error_handler(move |_: &TopicMessage, e: &SinkError| {
                        seen.lock().push(e.to_string());
                        if seen.lock().len() >= 2 {
                            ErrorPolicy::Stop
                        } else {
                            ErrorPolicy::Rollback
                        }
                    }),
            )
            .unwrap();

        for value in 1..=3 {
            gw.twin.update_value(&path, value.into()).unwrap();
        }

        assert_eq!(failures.lock().len(), 2);
        assert!(session.active_listeners().is_empty());
    }

    #[test]
    fn test_elapsed_timeout_stops_instead_of_delivering() {
        let gw = Gateway::open();
        let path = ResourcePath::new("p1", "s1", "r1");
        gw.sensor(&thermometer(), &path, 0);
        let recorder = Recorder::default();
        let session = gw
            .manager
            .create_session(&UserInfo::authenticated("alice"))
            .unwrap();
        session
            .add_listener(
                &["p1/*"],
                ListenerSinks::new()
                    .on_data(recorder.sink())
                    .with_timeout(CallbackTimeout::after(Duration::ZERO)),
            )
            .unwrap();

        gw.twin.update_value(&path, 1.into()).unwrap();

        assert_eq!(recorder.len(), 0);
        assert!(session.active_listeners().is_empty());
    }

    // =============================================================================
    // AGENTS
    // =============================================================================

    #[test]
    fn test_agents_observe_the_stream_with_filters() {
        let gw = Gateway::open();
        let data_agent = Recorder::default();
        let not_p1_agent = Recorder::default();
        gw.manager
            .register_agent(Agent::new(
                "data",
                AgentFilter::kinds([NotificationKind::Data]),
                MessageCallback::direct(data_agent.sink()),
            ))
            .unwrap();
        gw.manager
            .register_agent(Agent::new(
                "not-p1",
                AgentFilter::all().with_topic_prefix("DATA/p1").complemented(),
                MessageCallback::direct(not_p1_agent.sink()),
            ))
            .unwrap();

        let p1 = ResourcePath::new("p1", "s1", "r1");
        let p2 = ResourcePath::new("p2", "s1", "r1");
        gw.sensor(&thermometer(), &p1, 0);
        gw.sensor(&thermometer(), &p2, 0);
        gw.twin.update_value(&p1, 1.into()).unwrap();
        gw.twin.update_value(&p2, 1.into()).unwrap();

        assert_eq!(data_agent.topics(), vec!["DATA/p1/s1/r1", "DATA/p2/s1/r1"]);
        let not_p1 = not_p1_agent.topics();
        assert!(not_p1.contains(&"DATA/p2/s1/r1".to_string()));
        assert!(not_p1.contains(&"LIFECYCLE/p1".to_string()));
        assert!(!not_p1.contains(&"DATA/p1/s1/r1".to_string()));
    }

    #[test]
    fn test_failing_agent_is_dropped() {
        let gw = Gateway::open();
        let sink: Arc<dyn shared_bus::MessageSink<TopicMessage>> =
            Arc::new(|_: &TopicMessage| -> Result<(), SinkError> { Err(SinkError::Closed) });
        let callback = MessageCallback::new(
            sink,
            Arc::new(ErrorPolicy::Stop),
            CallbackTimeout::Endless,
            DeliveryMode::Direct,
        )
        .unwrap();
        gw.manager
            .register_agent(Agent::new("broken", AgentFilter::all(), callback))
            .unwrap();
        assert_eq!(gw.manager.agent_count(), 1);

        gw.manager
            .notify("DATA/p1/s1/r1", value_change(&ResourcePath::new("p1", "s1", "r1"), 0, 1));

        assert_eq!(gw.manager.agent_count(), 0);
    }
}
