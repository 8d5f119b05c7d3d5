//! # Bus ↔ Token Auth
//!
//! 1. **Session logon**: `USER_LOGON` published asynchronously registers the
//!    session; the client then authenticates by session id
//! 2. **Token events**: the service announces issued and removed tokens
//! 3. **Logout**: `USER_LOGOUT` drops the session's clients
//! 4. **Idle purge**: the idle heartbeat evicts expired tokens and unbinds
//!    their attributes
//! 5. **Bearer tokens**: issued for a live client, rejected from a foreign
//!    address, dead once the client is gone

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use sirio_bus::messages::{
        CTX_CLIENT_ID, CTX_SESSION_ID, CTX_USER_ID, CTX_USER_NAME, TOKEN_ISSUED, TOKEN_REMOVED,
        USER_LOGON, USER_LOGOUT,
    };
    use sirio_bus::{listener_fn, BusConfig, BusContext, MessageBus, Originator};
    use sirio_token_auth::{
        attach, AccessControlList, AttributeValue, AuthConfig, AuthError, BindingListener,
        ControllableTimeSource, CsrfCheck, InMemoryDirectory, TokenAuthApi, TokenAuthService,
        User,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::sleep;

    type Auth = TokenAuthService<InMemoryDirectory, Arc<ControllableTimeSource>>;

    const START: u64 = 1_700_000_000_000;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Fixture {
        bus: Arc<MessageBus>,
        auth: Arc<Auth>,
        time: Arc<ControllableTimeSource>,
        events: Arc<Mutex<Vec<(i32, String)>>>,
    }

    fn fixture() -> Fixture {
        let directory = InMemoryDirectory::new()
            .with_user(
                User::new(7, "mario"),
                "pizza",
                AccessControlList::new(["doctor"], ["record.read"]),
            )
            .with_user(User::new(1, "anonymous"), "", AccessControlList::default());
        let time = Arc::new(ControllableTimeSource::new(START));
        let auth = Arc::new(
            TokenAuthService::with_time_source(
                AuthConfig::for_testing(),
                directory,
                Arc::clone(&time),
            )
            .unwrap(),
        );

        let bus = Arc::new(MessageBus::new(BusConfig::for_testing()));
        attach(&bus, &auth);

        let events: Arc<Mutex<Vec<(i32, String)>>> = Arc::default();
        let sink = Arc::clone(&events);
        bus.register_sync_listener(
            "audit",
            listener_fn(move |msg_id, _, ctx| {
                if msg_id == TOKEN_ISSUED || msg_id == TOKEN_REMOVED {
                    let client = ctx.get_str(CTX_CLIENT_ID).unwrap_or_default().to_string();
                    sink.lock().push((msg_id, client));
                }
                Ok(0)
            }),
        );

        Fixture {
            bus,
            auth,
            time,
            events,
        }
    }

    fn logon_context(session: &str) -> BusContext {
        BusContext::new()
            .with(CTX_SESSION_ID, session)
            .with(CTX_USER_ID, 7)
            .with(CTX_USER_NAME, "mario")
    }

    #[derive(Default)]
    struct Unbinds(AtomicUsize);

    impl BindingListener for Unbinds {
        fn value_unbound(&self, _name: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    // =============================================================================
    // TESTS
    // =============================================================================

    #[tokio::test]
    async fn test_session_logon_and_logout_via_bus() {
        let f = fixture();
        f.bus.start().unwrap();

        f.bus
            .send_message_async_delay(USER_LOGON, Originator::none(), logon_context("s1"), Duration::ZERO);
        sleep(Duration::from_millis(50)).await;

        let item = f.auth.add_client_session("s1", "c1").unwrap();
        assert_eq!(item.user().name, "mario");
        assert!(item.has_role("doctor"));

        let logout = BusContext::new().with(CTX_SESSION_ID, "s1");
        f.bus.send_message_sync(USER_LOGOUT, &Originator::none(), &logout);

        assert!(item.is_cleared());
        assert_eq!(
            f.auth.get_client("c1").unwrap_err(),
            AuthError::UnknownToken("c1".into())
        );
        assert!(matches!(
            f.auth.add_client_session("s1", "c2"),
            Err(AuthError::UnknownSession(_))
        ));

        f.bus.shutdown().await;
        assert_eq!(
            *f.events.lock(),
            vec![(TOKEN_ISSUED, "c1".to_string()), (TOKEN_REMOVED, "c1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_idle_heartbeat_purges_expired_tokens() {
        let f = fixture();
        let item = f.auth.add_client_credentials("mario", "pizza", "c1").unwrap();
        let unbinds = Arc::new(Unbinds::default());
        item.set_attribute("cart", AttributeValue::Bound(unbinds.clone()));
        f.auth.add_client_anonymous("c2").unwrap();

        f.time.advance(AuthConfig::for_testing().token_ttl.as_millis() as u64);
        f.bus.start().unwrap();
        sleep(Duration::from_millis(300)).await;
        f.bus.shutdown().await;

        assert!(f.auth.clients().is_empty());
        assert!(item.is_cleared());
        assert_eq!(unbinds.0.load(Ordering::SeqCst), 1);
        assert_eq!(
            f.auth.get_client("c1").unwrap_err(),
            AuthError::UnknownToken("c1".into())
        );
    }

    #[tokio::test]
    async fn test_bearer_token_lifecycle() {
        let f = fixture();
        let item = f.auth.add_client_credentials("mario", "pizza", "c1").unwrap();

        let token = f.auth.encrypt_token_oauth2("10.1.2.3", &item).unwrap();
        let claims = f.auth.decript_token_oauth2("10.1.2.3", &token).unwrap();
        assert_eq!(claims.idclient, "c1");
        assert_eq!(claims.user, "mario");

        assert!(matches!(
            f.auth.client_from_oauth2_token("10.9.9.9", &token),
            Err(AuthError::AddressMismatch { .. })
        ));
        let resolved = f.auth.client_from_oauth2_token("localhost", &token).unwrap();
        assert!(Arc::ptr_eq(&item, &resolved));

        assert!(f.auth.remove_client("c1"));
        assert!(f.auth.client_from_oauth2_token("10.1.2.3", &token).is_err());
    }

    #[tokio::test]
    async fn test_csrf_per_session() {
        let f = fixture();
        let t1 = f.auth.issue_token_anti_csrf("s1");
        let t2 = f.auth.issue_token_anti_csrf("s2");

        assert_eq!(f.auth.verifica_token_anti_csrf(&t1, "s2", true), CsrfCheck::SessionMismatch);
        assert_eq!(f.auth.verifica_token_anti_csrf(&t1, "s1", true), CsrfCheck::Valid);
        assert_eq!(f.auth.verifica_token_anti_csrf(&t1, "s1", true), CsrfCheck::UnknownToken);
        assert_eq!(f.auth.verifica_token_anti_csrf(&t2, "s2", false).code(), 0);
        assert_eq!(f.auth.verifica_token_anti_csrf("bogus", "s2", false).code(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_logons_share_one_item() {
        let f = fixture();
        let mut handles = Vec::new();
        for n in 0..8 {
            let auth = Arc::clone(&f.auth);
            handles.push(tokio::spawn(async move {
                auth.add_client_credentials("mario", "pizza", &format!("c{n}"))
                    .unwrap()
            }));
        }

        let mut items = Vec::new();
        for handle in handles {
            items.push(handle.await.unwrap());
        }
        assert!(items.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(f.auth.clients().len(), 1);
    }
}
