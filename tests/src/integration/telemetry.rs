//! # Telemetry Scenarios
//!
//! Counters move when sessions and notifications flow through the store.
//! Counters are process-wide, so assertions compare deltas.

#[cfg(test)]
mod tests {
    use crate::integration::support::{thermometer, Gateway, Recorder};
    use gateway_telemetry::{
        gather_metrics, init_telemetry, register_metrics, TelemetryConfig,
        NOTIFICATIONS_DELIVERED, NOTIFICATIONS_DENIED, SESSIONS_CREATED, SESSIONS_EXPIRED,
    };
    use sg_02_session::{ListenerSinks, SessionManagerConfig};
    use sg_01_authorization::DefaultAuthPolicy;
    use shared_types::{ResourcePath, UserInfo};

    #[test]
    fn test_session_and_delivery_counters() {
        register_metrics().unwrap();
        let gw = Gateway::new(SessionManagerConfig {
            activity_check_interval_secs: 0,
            auth_policy: DefaultAuthPolicy::AuthenticatedOnly,
            ..SessionManagerConfig::default()
        });
        let created = SESSIONS_CREATED.get();
        let expired = SESSIONS_EXPIRED.get();
        let delivered = NOTIFICATIONS_DELIVERED.with_label_values(&["DATA"]).get();
        let denied = NOTIFICATIONS_DENIED.with_label_values(&["DATA"]).get();

        let member = gw
            .manager
            .create_session(&UserInfo::authenticated("alice"))
            .unwrap();
        let guest = gw.manager.create_anonymous_session().unwrap();
        for session in [&member, &guest] {
            session
                .add_listener(&["*"], ListenerSinks::new().on_data(Recorder::default().sink()))
                .unwrap();
        }

        let path = ResourcePath::new("p1", "s1", "r1");
        gw.sensor(&thermometer(), &path, 0);
        gw.twin.update_value(&path, 1.into()).unwrap();
        guest.expire();

        assert!(SESSIONS_CREATED.get() >= created + 2);
        assert!(SESSIONS_EXPIRED.get() > expired);
        assert!(NOTIFICATIONS_DELIVERED.with_label_values(&["DATA"]).get() > delivered);
        assert!(NOTIFICATIONS_DENIED.with_label_values(&["DATA"]).get() > denied);

        let exposition = gather_metrics().unwrap();
        assert!(exposition.contains("sg_sessions_created_total"));
        assert!(exposition.contains("sg_notifications_delivered_total"));
    }

    #[test]
    fn test_json_telemetry_with_metrics() {
        let config = TelemetryConfig {
            json_logs: true,
            ..TelemetryConfig::default().with_log_level("sg_02_session=debug")
        };
        let guard = init_telemetry(&config).unwrap();
        assert!(guard.metrics().is_some());

        let gw = Gateway::new(SessionManagerConfig {
            activity_check_interval_secs: 0,
            ..SessionManagerConfig::default()
        });
        let session = gw.manager.create_anonymous_session().unwrap();
        session.expire();
        assert_eq!(gw.manager.session_count(), 0);
    }
}
