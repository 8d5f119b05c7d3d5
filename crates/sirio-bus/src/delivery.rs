//! # Async Delivery Worker
//!
//! Drains the async queue on a single task.
//!
//! ## Ordering
//!
//! Messages are taken strictly FIFO. Each one is held until its own due
//! time (`enqueued + delay`) and then dispatched synchronously on the
//! worker, so a message with a short delay queued behind one with a long
//! delay waits for it. Two async messages are never dispatched concurrently.
//!
//! ## Idle Heartbeat
//!
//! When no message arrives for `idle_poll`, each idle tier whose period has
//! elapsed since its last firing fires once and starts a new period.

use crate::config::BusConfig;
use crate::context::{BusContext, Originator};
use crate::publisher::BusCore;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info};

/// One queued async message.
#[derive(Debug)]
pub struct QueueInfo {
    /// Message id.
    pub msg_id: i32,
    /// Publisher reference.
    pub originator: Originator,
    /// Payload.
    pub context: BusContext,
    /// Minimum time between enqueue and dispatch.
    pub delay: Duration,
    /// Enqueue time, milliseconds since the Unix epoch.
    pub origin_time_ms: u64,
    /// Enqueue time on the runtime clock.
    enqueued_at: Instant,
}

impl QueueInfo {
    pub(crate) fn new(
        msg_id: i32,
        originator: Originator,
        context: BusContext,
        delay: Duration,
    ) -> Self {
        Self {
            msg_id,
            originator,
            context,
            delay,
            origin_time_ms: epoch_millis(),
            enqueued_at: Instant::now(),
        }
    }

    /// Earliest instant at which the message may be dispatched.
    #[must_use]
    pub fn due(&self) -> Instant {
        self.enqueued_at + self.delay
    }
}

/// Idle heartbeat timers.
#[derive(Debug)]
pub(crate) struct IdleTimers {
    tiers: Vec<IdleTier>,
}

#[derive(Debug)]
struct IdleTier {
    msg_id: i32,
    period: Duration,
    last_fired: Instant,
}

impl IdleTimers {
    pub(crate) fn new(config: &BusConfig, now: Instant) -> Self {
        Self {
            tiers: config
                .idle_tiers
                .iter()
                .map(|&(msg_id, period)| IdleTier {
                    msg_id,
                    period,
                    last_fired: now,
                })
                .collect(),
        }
    }

    /// Message ids of the tiers that rolled over, in tier order.
    ///
    /// Each returned tier restarts its period at `now`.
    pub(crate) fn poll(&mut self, now: Instant) -> Vec<i32> {
        let mut fired = Vec::new();
        for tier in &mut self.tiers {
            if now.saturating_duration_since(tier.last_fired) >= tier.period {
                tier.last_fired = now;
                fired.push(tier.msg_id);
            }
        }
        fired
    }
}

/// Worker loop. Returns once the queue is closed and drained.
pub(crate) async fn run(core: Arc<BusCore>, mut receiver: mpsc::UnboundedReceiver<QueueInfo>) {
    let mut idle = IdleTimers::new(&core.config, Instant::now());
    let idle_poll = core.config.effective_idle_poll();
    debug!("Delivery worker running");

    loop {
        match timeout(idle_poll, receiver.recv()).await {
            Ok(Some(info)) => {
                core.queued.fetch_sub(1, Ordering::Relaxed);
                deliver(&core, info).await;
            }
            Ok(None) => break,
            Err(_) => {
                for msg_id in idle.poll(Instant::now()) {
                    debug!(msg_id, "Idle heartbeat");
                    core.dispatch_sync(msg_id, &Originator::none(), &BusContext::new());
                }
            }
        }
    }

    info!("Delivery worker stopped");
}

async fn deliver(core: &BusCore, info: QueueInfo) {
    sleep_until(info.due()).await;

    core.dispatch_sync(info.msg_id, &info.originator, &info.context);
    core.delivered.fetch_add(1, Ordering::Relaxed);
    debug!(
        msg_id = info.msg_id,
        delay_ms = info.delay.as_millis() as u64,
        "Async message delivered"
    );
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::listener_fn;
    use crate::messages::{IDLE_10_MINUTES, IDLE_30_MINUTES, IDLE_60_MINUTES};
    use crate::MessageBus;
    use parking_lot::Mutex;

    fn minutes(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    #[test]
    fn test_idle_tiers_fire_once_per_period() {
        let start = Instant::now();
        let mut timers = IdleTimers::new(&BusConfig::default(), start);

        assert!(timers.poll(start + minutes(9)).is_empty());
        assert_eq!(timers.poll(start + minutes(10)), vec![IDLE_10_MINUTES]);
        // Period restarted at minute 10.
        assert!(timers.poll(start + minutes(15)).is_empty());
        assert_eq!(timers.poll(start + minutes(20)), vec![IDLE_10_MINUTES]);
        assert_eq!(
            timers.poll(start + minutes(30)),
            vec![IDLE_10_MINUTES, IDLE_30_MINUTES]
        );
        assert_eq!(
            timers.poll(start + minutes(60)),
            vec![IDLE_10_MINUTES, IDLE_30_MINUTES, IDLE_60_MINUTES]
        );
        assert!(timers.poll(start + minutes(61)).is_empty());
    }

    #[test]
    fn test_queue_info_due() {
        let info = QueueInfo::new(
            1,
            Originator::none(),
            BusContext::new(),
            Duration::from_millis(300),
        );
        assert_eq!(info.due(), info.enqueued_at + Duration::from_millis(300));
        assert!(info.origin_time_ms > 0);
    }

    #[tokio::test]
    async fn test_worker_emits_idle_heartbeats() {
        let bus = MessageBus::new(BusConfig::for_testing());
        let seen: Arc<Mutex<Vec<i32>>> = Arc::default();
        let sink = Arc::clone(&seen);
        bus.register_sync_listener(
            "idle-watch",
            listener_fn(move |msg_id, _, _| {
                sink.lock().push(msg_id);
                Ok(0)
            }),
        );
        bus.start().unwrap();

        tokio::time::sleep(Duration::from_millis(700)).await;
        bus.shutdown().await;

        let seen = seen.lock();
        assert!(seen.contains(&IDLE_10_MINUTES));
        assert!(seen.contains(&IDLE_30_MINUTES));
        assert!(seen.contains(&IDLE_60_MINUTES));
        let ten = seen.iter().filter(|&&id| id == IDLE_10_MINUTES).count();
        let sixty = seen.iter().filter(|&&id| id == IDLE_60_MINUTES).count();
        assert!(ten >= sixty);
    }
}
