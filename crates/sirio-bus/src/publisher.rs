//! # Message Bus
//!
//! Listener registries, synchronous and transactional dispatch, and the
//! publishing side of the delayed asynchronous queue.

use crate::config::BusConfig;
use crate::context::{BusContext, MessagePack, Originator};
use crate::delivery::{self, QueueInfo};
use crate::error::BusError;
use crate::listener::{BusListener, TransactionListener};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// State shared between the bus handle and its delivery worker.
pub(crate) struct BusCore {
    pub(crate) config: BusConfig,

    /// Sync listeners by name. `BTreeMap` iteration gives the dispatch order.
    sync_listeners: RwLock<BTreeMap<String, Arc<dyn BusListener>>>,

    /// Transactional listeners by name.
    transaction_listeners: RwLock<BTreeMap<String, Arc<dyn TransactionListener>>>,

    /// Messages waiting in the async queue.
    pub(crate) queued: AtomicUsize,

    /// Async messages delivered by the worker.
    pub(crate) delivered: AtomicU64,
}

impl BusCore {
    fn new(config: BusConfig) -> Self {
        Self {
            config,
            sync_listeners: RwLock::new(BTreeMap::new()),
            transaction_listeners: RwLock::new(BTreeMap::new()),
            queued: AtomicUsize::new(0),
            delivered: AtomicU64::new(0),
        }
    }

    /// Copy of the sync registry in name order.
    ///
    /// Dispatch works on the copy, so listeners may register or remove
    /// listeners while being invoked.
    fn sync_snapshot(&self) -> Vec<(String, Arc<dyn BusListener>)> {
        self.sync_listeners
            .read()
            .iter()
            .map(|(name, listener)| (name.clone(), Arc::clone(listener)))
            .collect()
    }

    fn has_sync_listeners(&self) -> bool {
        !self.sync_listeners.read().is_empty()
    }

    /// Run every sync listener in name order; first non-zero result wins.
    pub(crate) fn dispatch_sync(
        &self,
        msg_id: i32,
        originator: &Originator,
        context: &BusContext,
    ) -> i32 {
        let mut result = 0;

        for (name, listener) in self.sync_snapshot() {
            let started = Instant::now();
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                listener.message_received(msg_id, originator, context)
            }));
            self.check_slow(&name, msg_id, started.elapsed());

            match outcome {
                Ok(Ok(0)) => {}
                Ok(Ok(code)) => {
                    debug!(msg_id, listener = %name, code, "Dispatch stopped by listener");
                    result = code;
                    break;
                }
                Ok(Err(e)) => {
                    error!(msg_id, listener = %name, error = %e, "Listener failed");
                }
                Err(_) => {
                    error!(msg_id, listener = %name, "Listener panicked");
                }
            }
        }

        for post in context.post_actions() {
            if let Err(e) = post.message_received(msg_id, originator, context) {
                error!(msg_id, error = %e, "Post-delivery action failed");
            }
        }

        result
    }

    fn check_slow(&self, name: &str, msg_id: i32, elapsed: Duration) {
        if elapsed > self.config.slow_listener_warning {
            warn!(
                msg_id,
                listener = name,
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow bus listener"
            );
        }
    }
}

/// In-process message bus.
///
/// Construct it at service start, register listeners, call [`start`] from
/// inside a tokio runtime to run the async delivery worker, and call
/// [`shutdown`] to drain the queue and stop the worker.
///
/// [`start`]: MessageBus::start
/// [`shutdown`]: MessageBus::shutdown
pub struct MessageBus {
    core: Arc<BusCore>,

    /// Sending side of the async queue. `None` once shut down.
    ///
    /// The mutex also keeps the messages of one pack contiguous.
    queue: Mutex<Option<mpsc::UnboundedSender<QueueInfo>>>,

    /// Receiving side, handed to the worker by `start`.
    receiver: Mutex<Option<mpsc::UnboundedReceiver<QueueInfo>>>,

    /// Worker task handle.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MessageBus {
    /// Create a bus with the given configuration. The worker is not running yet.
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            core: Arc::new(BusCore::new(config)),
            queue: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            worker: Mutex::new(None),
        }
    }

    /// Get the bus configuration.
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.core.config
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Spawn the delivery worker on the current tokio runtime.
    ///
    /// Messages published before `start` stay queued and are delivered once
    /// the worker runs.
    ///
    /// # Errors
    ///
    /// - `BusError::NoRuntime` - called outside of a tokio runtime
    /// - `BusError::AlreadyStarted` - the worker was already spawned
    pub fn start(&self) -> Result<(), BusError> {
        let handle = Handle::try_current().map_err(|_| BusError::NoRuntime)?;
        let receiver = self
            .receiver
            .lock()
            .take()
            .ok_or(BusError::AlreadyStarted)?;

        let core = Arc::clone(&self.core);
        *self.worker.lock() = Some(handle.spawn(delivery::run(core, receiver)));

        info!(
            default_delay_ms = self.core.config.default_delay.as_millis() as u64,
            idle_poll_ms = self.core.config.effective_idle_poll().as_millis() as u64,
            "Message bus started"
        );
        Ok(())
    }

    /// Close the async queue, deliver what is left, and wait for the worker.
    ///
    /// Async sends after shutdown are dropped.
    pub async fn shutdown(&self) {
        drop(self.queue.lock().take());

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "Delivery worker terminated abnormally");
            }
        }
        info!(
            delivered = self.core.delivered.load(Ordering::Relaxed),
            "Message bus stopped"
        );
    }

    /// Returns `true` while the worker is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    // =========================================================================
    // REGISTRIES
    // =========================================================================

    /// Register (or replace) a sync listener under `name`.
    pub fn register_sync_listener(&self, name: impl Into<String>, listener: Arc<dyn BusListener>) {
        let name = name.into();
        debug!(listener = %name, "Sync listener registered");
        self.core.sync_listeners.write().insert(name, listener);
    }

    /// Remove a sync listener. Returns `true` if it was registered.
    pub fn remove_sync_listener(&self, name: &str) -> bool {
        let removed = self.core.sync_listeners.write().remove(name).is_some();
        if removed {
            debug!(listener = name, "Sync listener removed");
        }
        removed
    }

    /// Register (or replace) a transactional listener under `name`.
    pub fn register_transaction_listener(
        &self,
        name: impl Into<String>,
        listener: Arc<dyn TransactionListener>,
    ) {
        let name = name.into();
        debug!(listener = %name, "Transaction listener registered");
        self.core.transaction_listeners.write().insert(name, listener);
    }

    /// Remove a transactional listener. Returns `true` if it was registered.
    pub fn remove_transaction_listener(&self, name: &str) -> bool {
        self.core
            .transaction_listeners
            .write()
            .remove(name)
            .is_some()
    }

    /// Names of the sync listeners, in dispatch order.
    #[must_use]
    pub fn sync_listener_names(&self) -> Vec<String> {
        self.core.sync_listeners.read().keys().cloned().collect()
    }

    /// Names of the transactional listeners, in dispatch order.
    #[must_use]
    pub fn transaction_listener_names(&self) -> Vec<String> {
        self.core
            .transaction_listeners
            .read()
            .keys()
            .cloned()
            .collect()
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Deliver a message to every sync listener on the caller's thread.
    ///
    /// Listeners run in ascending name order. The first listener returning a
    /// non-zero value stops the dispatch and its value is returned. Listener
    /// errors are logged and count as 0. The context's post-delivery actions
    /// run afterwards in every case.
    pub fn send_message_sync(
        &self,
        msg_id: i32,
        originator: &Originator,
        context: &BusContext,
    ) -> i32 {
        self.core.dispatch_sync(msg_id, originator, context)
    }

    /// Deliver a message to every transactional listener.
    ///
    /// Same ordering and veto rule as [`send_message_sync`], but the first
    /// listener error aborts the dispatch and is returned.
    ///
    /// # Errors
    ///
    /// Whatever error the failing listener returned.
    ///
    /// [`send_message_sync`]: MessageBus::send_message_sync
    pub fn send_message_transaction(
        &self,
        msg_id: i32,
        originator: &Originator,
        connection: &mut dyn Any,
        context: &BusContext,
    ) -> Result<i32, BusError> {
        let listeners: Vec<(String, Arc<dyn TransactionListener>)> = self
            .core
            .transaction_listeners
            .read()
            .iter()
            .map(|(name, listener)| (name.clone(), Arc::clone(listener)))
            .collect();

        for (name, listener) in listeners {
            let started = Instant::now();
            let outcome = listener.message_received(msg_id, originator, connection, context);
            self.core.check_slow(&name, msg_id, started.elapsed());

            match outcome? {
                0 => {}
                code => {
                    debug!(msg_id, listener = %name, code, "Transaction dispatch stopped");
                    return Ok(code);
                }
            }
        }
        Ok(0)
    }

    /// Queue a message for delivery after the default delay.
    ///
    /// Returns `false` if the message was dropped (no sync listener, or the
    /// bus has been shut down).
    pub fn send_message_async(
        &self,
        msg_id: i32,
        originator: Originator,
        context: BusContext,
    ) -> bool {
        let delay = self.core.config.default_delay;
        self.send_message_async_delay(msg_id, originator, context, delay)
    }

    /// Queue a message for delivery no earlier than `delay` from now.
    pub fn send_message_async_delay(
        &self,
        msg_id: i32,
        originator: Originator,
        context: BusContext,
        delay: Duration,
    ) -> bool {
        if !self.core.has_sync_listeners() {
            debug!(msg_id, "No listeners, async message dropped");
            return false;
        }

        let queue = self.queue.lock();
        let Some(sender) = queue.as_ref() else {
            warn!(msg_id, "Bus stopped, async message dropped");
            return false;
        };
        self.enqueue(sender, QueueInfo::new(msg_id, originator, context, delay))
    }

    /// Queue every message of a pack back to back.
    ///
    /// Returns the number of messages queued.
    pub fn send_message_pack_async(&self, pack: MessagePack) -> usize {
        if pack.is_empty() || !self.core.has_sync_listeners() {
            return 0;
        }

        let queue = self.queue.lock();
        let Some(sender) = queue.as_ref() else {
            warn!(messages = pack.len(), "Bus stopped, message pack dropped");
            return 0;
        };

        let mut queued = 0;
        for m in pack.into_messages() {
            if self.enqueue(sender, QueueInfo::new(m.msg_id, m.originator, m.context, m.delay)) {
                queued += 1;
            }
        }
        queued
    }

    fn enqueue(&self, sender: &mpsc::UnboundedSender<QueueInfo>, info: QueueInfo) -> bool {
        let msg_id = info.msg_id;
        self.core.queued.fetch_add(1, Ordering::Relaxed);
        match sender.send(info) {
            Ok(()) => {
                debug!(msg_id, "Async message queued");
                true
            }
            Err(_) => {
                self.core.queued.fetch_sub(1, Ordering::Relaxed);
                warn!(msg_id, "Delivery worker gone, async message dropped");
                false
            }
        }
    }

    // =========================================================================
    // STATISTICS
    // =========================================================================

    /// Messages waiting in the async queue.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.core.queued.load(Ordering::Relaxed)
    }

    /// Async messages delivered so far.
    #[must_use]
    pub fn messages_delivered(&self) -> u64 {
        self.core.delivered.load(Ordering::Relaxed)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}
