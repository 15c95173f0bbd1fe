//! # Authorization Scenarios
//!
//! | Path         | Refusal                         |
//! |--------------|---------------------------------|
//! | Notification | silent drop, sink never invoked |
//! | Command      | `SessionError::AuthorizationDenied` |

#[cfg(test)]
mod tests {
    use crate::integration::support::{lamp, thermometer, Gateway, Recorder};
    use sg_01_authorization::{
        AccessRule, AuthorizationEngine, Authorizer, DefaultAuthPolicy, PreAuthorizer,
        RuleTableEngine,
    };
    use sg_02_session::{ListenerSinks, SessionError, SessionManagerConfig};
    use shared_types::{
        LifecycleStatus, ModelIdentity, NotificationEvent, NotificationHeader, PermissionLevel,
        ResourcePath, UserInfo,
    };
    use std::sync::Arc;

    fn provider_created(model: ModelIdentity, provider: &str) -> NotificationEvent {
        NotificationEvent::lifecycle(
            NotificationHeader::provider(Some(model), provider),
            LifecycleStatus::ProviderCreated,
        )
    }

    /// Lets everyone describe lamps, nothing else.
    fn lamp_engine() -> RuleTableEngine {
        RuleTableEngine::new(vec![AccessRule::allow()
            .at_level(PermissionLevel::Describe)
            .on_model("lamp")])
    }

    // =============================================================================
    // NOTIFICATION GATE
    // =============================================================================

    #[test]
    fn test_lifecycle_needs_describe() {
        let gw = Gateway::open();
        gw.manager
            .set_authorization_engine(Arc::new(lamp_engine()))
            .unwrap();
        let session = gw
            .manager
            .create_session(&UserInfo::authenticated("alice"))
            .unwrap();
        let recorder = Recorder::default();
        session
            .add_listener(&["*"], ListenerSinks::new().on_lifecycle(recorder.sink()))
            .unwrap();

        gw.manager
            .notify("LIFECYCLE/thermo", provider_created(thermometer(), "thermo"));
        assert_eq!(recorder.len(), 0);

        let allowed = provider_created(lamp(), "lamp-1");
        gw.manager.notify("LIFECYCLE/lamp-1", allowed.clone());
        assert_eq!(recorder.events(), vec![allowed]);
    }

    #[test]
    fn test_each_session_sees_what_its_user_may_read() {
        let gw = Gateway::open();
        gw.manager
            .set_authorization_engine(Arc::new(RuleTableEngine::new(vec![AccessRule::allow()
                .for_group("operators")
                .at_level(PermissionLevel::Read)])))
            .unwrap();

        let operator = Recorder::default();
        let visitor = Recorder::default();
        gw.manager
            .create_session(&UserInfo::authenticated("olga").with_group("operators"))
            .unwrap()
            .add_listener(&["*"], ListenerSinks::new().on_data(operator.sink()))
            .unwrap();
        gw.manager
            .create_session(&UserInfo::authenticated("victor"))
            .unwrap()
            .add_listener(&["*"], ListenerSinks::new().on_data(visitor.sink()))
            .unwrap();

        let path = ResourcePath::new("p1", "s1", "r1");
        gw.sensor(&thermometer(), &path, 1);
        gw.twin.update_value(&path, 2.into()).unwrap();

        assert_eq!(operator.topics(), vec!["DATA/p1/s1/r1"]);
        assert!(visitor.topics().is_empty());
    }

    // =============================================================================
    // COMMAND PATH
    // =============================================================================

    #[test]
    fn test_existence_is_hidden_until_authorized() {
        let gw = Gateway::open();
        gw.sensor(&lamp(), &ResourcePath::new("lamp-1", "light", "level"), 3);
        gw.sensor(&thermometer(), &ResourcePath::new("thermo", "env", "temp"), 21);
        gw.manager
            .set_authorization_engine(Arc::new(lamp_engine()))
            .unwrap();
        let session = gw
            .manager
            .create_session(&UserInfo::authenticated("alice"))
            .unwrap();

        assert!(session.describe_provider("lamp-1").is_ok());
        assert!(matches!(
            session.describe_service("lamp-1", "heater"),
            Err(SessionError::NotFound(_))
        ));

        for provider in ["thermo", "ghost"] {
            assert!(matches!(
                session.describe_provider(provider),
                Err(SessionError::AuthorizationDenied { .. })
            ));
        }
        assert!(matches!(
            session.get_resource_value(&ResourcePath::new("lamp-1", "light", "level")),
            Err(SessionError::AuthorizationDenied { .. })
        ));

        let listed: Vec<String> = session
            .list_providers()
            .unwrap()
            .into_iter()
            .map(|p| p.provider)
            .collect();
        assert_eq!(listed, vec!["lamp-1"]);
    }

    #[test]
    fn test_authenticated_only_policy() {
        let gw = Gateway::new(SessionManagerConfig {
            auth_policy: DefaultAuthPolicy::AuthenticatedOnly,
            activity_check_interval_secs: 0,
            ..SessionManagerConfig::default()
        });
        let path = ResourcePath::new("p1", "s1", "r1");
        gw.sensor(&thermometer(), &path, 7);

        let member = gw
            .manager
            .create_session(&UserInfo::authenticated("alice"))
            .unwrap();
        let guest = gw.manager.create_anonymous_session().unwrap();

        assert_eq!(
            member.get_resource_value(&path).unwrap().value,
            Some(7.into())
        );
        assert!(matches!(
            guest.get_resource_value(&path),
            Err(SessionError::AuthorizationDenied { .. })
        ));
        assert!(matches!(
            guest.get_resource_value(&ResourcePath::new("nowhere", "s", "r")),
            Err(SessionError::AuthorizationDenied { .. })
        ));
        assert!(guest.list_providers().unwrap().is_empty());
    }

    /// Provides a fine-grained authorizer for admins only and never a
    /// pre-authorizer.
    struct AdminsOnlyEngine;

    struct AllowEverything;

    impl Authorizer for AllowEverything {
        fn has_provider_permission(
            &self,
            _: PermissionLevel,
            _: Option<&ModelIdentity>,
            _: &str,
        ) -> bool {
            true
        }

        fn has_service_permission(
            &self,
            _: PermissionLevel,
            _: Option<&ModelIdentity>,
            _: &str,
            _: &str,
        ) -> bool {
            true
        }

        fn has_resource_permission(
            &self,
            _: PermissionLevel,
            _: Option<&ModelIdentity>,
            _: &str,
            _: &str,
            _: &str,
        ) -> bool {
            true
        }
    }

    impl AuthorizationEngine for AdminsOnlyEngine {
        fn create_pre_authorizer(&self, _: &UserInfo) -> Option<Arc<dyn PreAuthorizer>> {
            None
        }

        fn create_authorizer(&self, user: &UserInfo) -> Option<Arc<dyn Authorizer>> {
            user.is_member_of("admins")
                .then(|| Arc::new(AllowEverything) as Arc<dyn Authorizer>)
        }
    }

    #[test]
    fn test_policy_fills_what_the_engine_declines() {
        let gw = Gateway::new(SessionManagerConfig {
            auth_policy: DefaultAuthPolicy::DenyAll,
            activity_check_interval_secs: 0,
            ..SessionManagerConfig::default()
        });
        gw.manager
            .set_authorization_engine(Arc::new(AdminsOnlyEngine))
            .unwrap();
        let path = ResourcePath::new("p1", "s1", "r1");
        gw.sensor(&thermometer(), &path, 1);

        let admin = gw
            .manager
            .create_session(&UserInfo::authenticated("root").with_group("admins"))
            .unwrap();
        let user = gw
            .manager
            .create_session(&UserInfo::authenticated("alice"))
            .unwrap();

        assert_eq!(admin.authorizer().kind(), "delegated");
        assert_eq!(user.authorizer().kind(), "deny_all");

        // The missing pre-authorizer answers with the deny-all policy.
        assert!(matches!(
            admin.get_resource_value(&path),
            Err(SessionError::AuthorizationDenied { .. })
        ));

        let recorder = Recorder::default();
        admin
            .add_listener(&["p1/*"], ListenerSinks::new().on_data(recorder.sink()))
            .unwrap();
        gw.twin.update_value(&path, 2.into()).unwrap();
        assert_eq!(recorder.len(), 1);
    }
}
