//! # Full Node
//!
//! The runtime container with all services wired:
//!
//! 1. **Keystore persistence**: a bearer token outlives a restart
//! 2. **Shutdown drain**: queued async messages are delivered before stop
//! 3. **Locks + auth together**: a client's user id owns the locks it takes

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use sirio_bus::{listener_fn, BusConfig, BusContext, Originator};
    use sirio_lock::{ResourceLockApi, ResourceTypeConfig};
    use sirio_runtime::container::{SirioConfig, SirioContainer};
    use sirio_token_auth::{
        AccessControlList, AuthError, InMemoryDirectory, SecurityDirectory, TokenAuthApi, User,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn directory() -> Arc<dyn SecurityDirectory> {
        Arc::new(InMemoryDirectory::new().with_user(
            User::new(7, "mario"),
            "pizza",
            AccessControlList::default(),
        ))
    }

    fn config(keystore: &TempDir) -> SirioConfig {
        let mut config = SirioConfig::default();
        config.bus = BusConfig::for_testing();
        config.lock.resource_types = vec![ResourceTypeConfig::new("invoice", 1, false)];
        config.auth.keystore_dir = Some(keystore.path().to_path_buf());
        config
    }

    #[tokio::test]
    async fn test_bearer_token_survives_restart() {
        let keystore = TempDir::new().unwrap();

        let first = SirioContainer::new(config(&keystore), directory()).unwrap();
        let item = first
            .auth()
            .add_client_credentials("mario", "pizza", "c1")
            .unwrap();
        let token = first.auth().encrypt_token_oauth2("10.0.0.1", &item).unwrap();
        drop(first);

        let second = SirioContainer::new(config(&keystore), directory()).unwrap();
        let claims = second.auth().decript_token_oauth2("10.0.0.1", &token).unwrap();
        assert_eq!(claims.idclient, "c1");

        // Signature still valid, but the client cache did not survive.
        assert_eq!(
            second
                .auth()
                .client_from_oauth2_token("10.0.0.1", &token)
                .unwrap_err(),
            AuthError::UnknownToken("c1".into())
        );
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let keystore = TempDir::new().unwrap();
        let node = SirioContainer::new(config(&keystore), directory()).unwrap();

        let seen: Arc<Mutex<Vec<i64>>> = Arc::default();
        let sink = Arc::clone(&seen);
        node.bus().register_sync_listener(
            "zz-recorder",
            listener_fn(move |msg_id, _, ctx| {
                if msg_id == 5_000 {
                    sink.lock().push(ctx.get_i64("n").unwrap_or_default());
                }
                Ok(0)
            }),
        );

        node.start().unwrap();
        for n in 0..5 {
            node.bus().send_message_async_delay(
                5_000,
                Originator::none(),
                BusContext::new().with("n", n),
                Duration::from_millis(20),
            );
        }
        node.shutdown().await;

        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(node.bus().queue_len(), 0);
        assert!(!node.is_running());
    }

    #[tokio::test]
    async fn test_client_user_owns_locks() {
        let keystore = TempDir::new().unwrap();
        let node = SirioContainer::new(config(&keystore), directory()).unwrap();

        let item = node
            .auth()
            .add_client_credentials("mario", "pizza", "c1")
            .unwrap();
        let locks = node.locks();
        locks
            .lock_resource("invoice", 99, item.user_id())
            .await
            .unwrap();

        let info = locks.lock_info("invoice", 99).unwrap().unwrap();
        assert_eq!(info.owners, vec![7]);
        assert_eq!(info.last_owner, Some(7));
        assert!(!locks
            .try_lock_resource("invoice", 99, 8, Duration::from_millis(20))
            .await
            .unwrap());
    }
}
