//! # Sirio Bus - In-Process Message Bus
//!
//! Publish/subscribe backbone shared by the lock and token services.
//!
//! ## Delivery Modes
//!
//! - **Synchronous:** `send_message_sync` runs every sync listener on the
//!   caller's thread, in ascending name order. The first non-zero return
//!   value stops the dispatch and is returned to the caller.
//! - **Transactional:** `send_message_transaction` runs the transactional
//!   listeners in name order and propagates their errors, so a caller holding
//!   an open transaction can roll it back.
//! - **Delayed asynchronous:** `send_message_async*` enqueue the message and
//!   return. A single worker delivers the queue strictly FIFO, holding each
//!   message until its delay has elapsed.
//!
//! ```text
//!  publisher ──send_message_async──→ [ FIFO queue ] ──→ worker ──send_message_sync──→ listeners
//!                                          │                         (a < b < c)
//!                                   empty for 3s
//!                                          ↓
//!                          IDLE_10 / IDLE_30 / IDLE_60 heartbeats
//! ```
//!
//! ## Idle Heartbeat
//!
//! The worker is the only periodic mechanism in the system. Services that
//! need background maintenance (lock slot reaping, token purging) listen
//! for the `IDLE_*` messages instead of running their own schedulers.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod context;
pub mod delivery;
pub mod error;
pub mod listener;
pub mod messages;
pub mod publisher;

// Re-export main types
pub use config::BusConfig;
pub use context::{BusContext, MessagePack, Originator, PackedMessage};
pub use error::BusError;
pub use listener::{listener_fn, transaction_listener_fn, BusListener, TransactionListener};
pub use publisher::MessageBus;

/// Default delay applied by `send_message_async`, in milliseconds.
pub const DEFAULT_ASYNC_DELAY_MS: u64 = 300;

/// How long the delivery queue must stay empty before idle timers are checked.
pub const DEFAULT_IDLE_POLL_SECS: u64 = 3;

/// Lower bound of the idle poll interval, in milliseconds.
pub const MIN_IDLE_POLL_MS: u64 = 10;

/// Listener runtime above which a warning is logged, in milliseconds.
pub const DEFAULT_SLOW_LISTENER_MS: u64 = 50;
