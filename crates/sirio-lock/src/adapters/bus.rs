//! # Bus Adapter
//!
//! Reaps unused lock slots when the bus reports ten idle minutes.

use crate::ports::inbound::ResourceLockApi;
use sirio_bus::messages::IDLE_10_MINUTES;
use sirio_bus::{BusContext, BusError, BusListener, MessageBus, Originator};
use std::sync::Arc;
use tracing::debug;

/// Name under which the collector registers on the bus.
pub const LISTENER_NAME: &str = "lock-service.gc";

/// Sync listener running `collect_garbage` on `IDLE_10_MINUTES`.
pub struct LockGarbageCollector<L: ResourceLockApi> {
    locks: Arc<L>,
}

impl<L: ResourceLockApi + 'static> LockGarbageCollector<L> {
    pub fn new(locks: Arc<L>) -> Self {
        Self { locks }
    }

    /// Register a collector for `locks` on `bus`.
    pub fn attach(bus: &MessageBus, locks: Arc<L>) {
        bus.register_sync_listener(LISTENER_NAME, Arc::new(Self::new(locks)));
    }
}

impl<L: ResourceLockApi> BusListener for LockGarbageCollector<L> {
    fn message_received(
        &self,
        msg_id: i32,
        _originator: &Originator,
        _context: &BusContext,
    ) -> Result<i32, BusError> {
        if msg_id == IDLE_10_MINUTES {
            let removed = self.locks.collect_garbage();
            debug!(removed, "Idle lock reaping done");
        }
        Ok(0)
    }
}
