//! # Service Container
//!
//! Builds the three services and connects them through the bus.
//!
//! ```text
//!                 ┌──────────── MessageBus ────────────┐
//!                 │  IDLE_10      USER_LOGON/LOGOUT    │
//!                 ↓                     ↓              │
//!   "lock-service.gc"         "token-auth.sessions"    │
//!          │                            │              │
//!          ↓                            ↓              │
//!     LockService              TokenAuthService ──TOKEN_ISSUED/REMOVED
//! ```
//!
//! ## Lifecycle
//!
//! `new` wires everything but starts nothing. `start` launches the bus
//! delivery worker (and with it the idle heartbeat). `shutdown` stops the
//! worker after it has drained the queue.

use crate::container::config::SirioConfig;
use sirio_bus::{BusError, MessageBus};
use sirio_lock::{LockError, LockGarbageCollector, LockService};
use sirio_token_auth::{AuthError, SecurityDirectory, TokenAuthService};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Token auth service over a shared directory.
pub type AuthService = TokenAuthService<Arc<dyn SecurityDirectory>>;

/// Errors raised while building or running the container.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Lock service error: {0}")]
    Lock(#[from] LockError),

    #[error("Token auth error: {0}")]
    Auth(#[from] AuthError),
}

/// All services of a node.
pub struct SirioContainer {
    /// Configuration the container was built from.
    pub config: SirioConfig,
    bus: Arc<MessageBus>,
    locks: Arc<LockService>,
    auth: Arc<AuthService>,
}

impl SirioContainer {
    /// Build and wire the services.
    ///
    /// # Errors
    ///
    /// Invalid predeclared resource types or keystore failures.
    pub fn new(
        config: SirioConfig,
        directory: Arc<dyn SecurityDirectory>,
    ) -> Result<Self, ContainerError> {
        let bus = Arc::new(MessageBus::new(config.bus.clone()));

        let locks = Arc::new(LockService::from_config(&config.lock)?);
        LockGarbageCollector::attach(&bus, Arc::clone(&locks));

        let auth = Arc::new(TokenAuthService::new(config.auth.clone(), directory)?);
        sirio_token_auth::attach(&bus, &auth);

        info!(
            resource_types = locks.resource_types().len(),
            listeners = ?bus.sync_listener_names(),
            "Services wired"
        );

        Ok(Self {
            config,
            bus,
            locks,
            auth,
        })
    }

    /// Start the bus delivery worker. Must run inside a tokio runtime.
    pub fn start(&self) -> Result<(), ContainerError> {
        self.bus.start()?;
        info!("Services started");
        Ok(())
    }

    /// Drain the async queue and stop the delivery worker.
    pub async fn shutdown(&self) {
        info!(queued = self.bus.queue_len(), "Initiating graceful shutdown...");
        self.bus.shutdown().await;
        info!(
            delivered = self.bus.messages_delivered(),
            "Shutdown complete"
        );
    }

    pub fn is_running(&self) -> bool {
        self.bus.is_running()
    }

    pub fn bus(&self) -> Arc<MessageBus> {
        Arc::clone(&self.bus)
    }

    pub fn locks(&self) -> Arc<LockService> {
        Arc::clone(&self.locks)
    }

    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }
}
