//! # Bus Configuration

use crate::messages::{IDLE_10_MINUTES, IDLE_30_MINUTES, IDLE_60_MINUTES};
use crate::{
    DEFAULT_ASYNC_DELAY_MS, DEFAULT_IDLE_POLL_SECS, DEFAULT_SLOW_LISTENER_MS, MIN_IDLE_POLL_MS,
};
use std::env;
use std::time::Duration;

/// Runtime parameters of a [`MessageBus`](crate::MessageBus).
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Delay applied by `send_message_async`.
    pub default_delay: Duration,
    /// Queue inactivity after which idle timers are checked. Values below
    /// [`MIN_IDLE_POLL_MS`] are raised to it by the delivery worker.
    pub idle_poll: Duration,
    /// Idle heartbeat tiers as `(message id, period)`.
    pub idle_tiers: Vec<(i32, Duration)>,
    /// Listener runtime above which a warning is logged.
    pub slow_listener_warning: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            default_delay: Duration::from_millis(DEFAULT_ASYNC_DELAY_MS),
            idle_poll: Duration::from_secs(DEFAULT_IDLE_POLL_SECS),
            idle_tiers: vec![
                (IDLE_10_MINUTES, Duration::from_secs(10 * 60)),
                (IDLE_30_MINUTES, Duration::from_secs(30 * 60)),
                (IDLE_60_MINUTES, Duration::from_secs(60 * 60)),
            ],
            slow_listener_warning: Duration::from_millis(DEFAULT_SLOW_LISTENER_MS),
        }
    }
}

impl BusConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SIRIO_BUS_DELAY_MS`: default async delay (default: 300)
    /// - `SIRIO_BUS_IDLE_POLL_MS`: idle poll interval (default: 3000, minimum: 10)
    /// - `SIRIO_BUS_SLOW_LISTENER_MS`: slow listener threshold (default: 50)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            default_delay: env_millis("SIRIO_BUS_DELAY_MS").unwrap_or(defaults.default_delay),
            idle_poll: env_millis("SIRIO_BUS_IDLE_POLL_MS")
                .map(clamp_idle_poll)
                .unwrap_or(defaults.idle_poll),
            slow_listener_warning: env_millis("SIRIO_BUS_SLOW_LISTENER_MS")
                .unwrap_or(defaults.slow_listener_warning),
            idle_tiers: defaults.idle_tiers,
        }
    }

    /// Idle poll interval the worker actually waits on.
    pub fn effective_idle_poll(&self) -> Duration {
        clamp_idle_poll(self.idle_poll)
    }

    /// Compressed timings for tests: 20ms idle poll, 100/200/400ms tiers.
    pub fn for_testing() -> Self {
        Self {
            default_delay: Duration::from_millis(30),
            idle_poll: Duration::from_millis(20),
            idle_tiers: vec![
                (IDLE_10_MINUTES, Duration::from_millis(100)),
                (IDLE_30_MINUTES, Duration::from_millis(200)),
                (IDLE_60_MINUTES, Duration::from_millis(400)),
            ],
            slow_listener_warning: Duration::from_millis(DEFAULT_SLOW_LISTENER_MS),
        }
    }
}

fn clamp_idle_poll(poll: Duration) -> Duration {
    poll.max(Duration::from_millis(MIN_IDLE_POLL_MS))
}

fn env_millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}
