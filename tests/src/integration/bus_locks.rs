//! # Bus ↔ Lock Service
//!
//! 1. **Idle reaping**: the bus idle heartbeat drives lock slot garbage
//!    collection without any scheduler in the lock service
//! 2. **Delayed release**: an async message unlocks a resource another task
//!    is waiting on, no earlier than its delay
//! 3. **Transactional veto**: a transactional listener failure reaches the
//!    publisher, which rolls its locks back

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use sirio_bus::messages::IDLE_10_MINUTES;
    use sirio_bus::{
        listener_fn, transaction_listener_fn, BusConfig, BusContext, BusError, MessageBus,
        Originator,
    };
    use sirio_lock::{LockGarbageCollector, LockService, ResourceLockApi};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout, Instant};

    const UNLOCK_INVOICE: i32 = 1_001;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn locks() -> Arc<LockService> {
        let locks = LockService::new();
        locks.create_resource("invoice", 1, false).unwrap();
        locks.create_resource("ward", 2, true).unwrap();
        Arc::new(locks)
    }

    /// Listener unlocking `invoice/<id>` for `<user>` taken from the context.
    fn unlocker(locks: Arc<LockService>) -> Arc<dyn sirio_bus::BusListener> {
        listener_fn(move |msg_id, _, ctx| {
            if msg_id == UNLOCK_INVOICE {
                let id = ctx.get_i64("id").unwrap_or_default();
                let user = ctx.get_i64("user").unwrap_or_default();
                locks
                    .unlock_resource("invoice", id, user)
                    .map_err(|e| BusError::listener(msg_id, e.to_string()))?;
            }
            Ok(0)
        })
    }

    // =============================================================================
    // TESTS
    // =============================================================================

    #[tokio::test]
    async fn test_idle_heartbeat_reaps_free_slots() {
        let locks = locks();
        let bus = MessageBus::new(BusConfig::for_testing());
        LockGarbageCollector::attach(&bus, Arc::clone(&locks));

        locks.lock_resource("invoice", 1, 10).await.unwrap();
        locks.lock_resource("invoice", 2, 10).await.unwrap();
        locks.unlock_resource("invoice", 2, 10).unwrap();
        locks.lock_resource_multi("ward", 5, &[1, 2]).await.unwrap();
        locks.unlock_resource_multi("ward", 5, &[1]).unwrap();
        assert_eq!(locks.resource_count(), 3);

        bus.start().unwrap();
        sleep(Duration::from_millis(400)).await;
        bus.shutdown().await;

        assert_eq!(locks.resource_count(), 1);
        assert_eq!(locks.owners("invoice", 1).unwrap(), vec![10]);
    }

    #[tokio::test]
    async fn test_explicit_idle_message_reaps() {
        let locks = locks();
        let bus = MessageBus::default();
        LockGarbageCollector::attach(&bus, Arc::clone(&locks));

        locks.lock_resource("invoice", 1, 10).await.unwrap();
        locks.unlock_resource("invoice", 1, 10).unwrap();

        bus.send_message_sync(IDLE_10_MINUTES, &Originator::none(), &BusContext::new());
        assert_eq!(locks.resource_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_delayed_message_releases_waiter() {
        let locks = locks();
        let bus = Arc::new(MessageBus::new(BusConfig::for_testing()));
        bus.register_sync_listener("invoice-unlocker", unlocker(Arc::clone(&locks)));
        bus.start().unwrap();

        locks.lock_resource("invoice", 7, 10).await.unwrap();

        let started = Instant::now();
        let ctx = BusContext::new().with("id", 7).with("user", 10);
        assert!(bus.send_message_async_delay(
            UNLOCK_INVOICE,
            Originator::none(),
            ctx,
            Duration::from_millis(80)
        ));

        timeout(Duration::from_secs(2), locks.lock_resource("invoice", 7, 20))
            .await
            .expect("waiter should be released by the async message")
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(80));
        assert_eq!(locks.owners("invoice", 7).unwrap(), vec![20]);
        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_transaction_veto_rolls_back_locks() {
        let locks = locks();
        let bus = MessageBus::default();

        bus.register_transaction_listener(
            "a-journal",
            transaction_listener_fn(|msg_id, _, conn, _| {
                if let Some(journal) = conn.downcast_mut::<Vec<i32>>() {
                    journal.push(msg_id);
                }
                Ok(0)
            }),
        );
        bus.register_transaction_listener(
            "b-quota",
            transaction_listener_fn(|_, _, _, ctx| {
                if ctx.get_i64("amount").unwrap_or_default() > 100 {
                    return Err(BusError::TransactionAborted {
                        listener: "b-quota".into(),
                        reason: "over quota".into(),
                    });
                }
                Ok(0)
            }),
        );

        locks.lock_resources("invoice", &[1, 2], 10).await.unwrap();

        let mut journal: Vec<i32> = Vec::new();
        let ctx = BusContext::new().with("amount", 500);
        let outcome = bus.send_message_transaction(42, &Originator::none(), &mut journal, &ctx);

        assert!(matches!(outcome, Err(BusError::TransactionAborted { .. })));
        assert_eq!(journal, vec![42]);

        // The publisher rolls back: release everything it took.
        locks.unlock_resources("invoice", &[1, 2], 10).unwrap();
        assert!(!locks.is_locked("invoice", 1).unwrap());
        assert!(!locks.is_locked("invoice", 2).unwrap());
    }

    #[tokio::test]
    async fn test_async_failures_do_not_stop_delivery() {
        let bus = MessageBus::new(BusConfig::for_testing());
        let seen: Arc<Mutex<Vec<i64>>> = Arc::default();
        let sink = Arc::clone(&seen);
        bus.register_sync_listener(
            "collector",
            listener_fn(move |msg_id, _, ctx| {
                if msg_id != UNLOCK_INVOICE {
                    return Ok(0);
                }
                let n = ctx.get_i64("n").unwrap_or_default();
                if n == 2 {
                    return Err(BusError::listener(msg_id, "boom"));
                }
                sink.lock().push(n);
                Ok(0)
            }),
        );
        bus.start().unwrap();

        for n in 1..=3 {
            let ctx = BusContext::new().with("n", n);
            bus.send_message_async_delay(UNLOCK_INVOICE, Originator::none(), ctx, Duration::ZERO);
        }
        bus.shutdown().await;

        assert_eq!(*seen.lock(), vec![1, 3]);
    }
}
