//! # Sirio Lock - Resource Lock Service
//!
//! Mutual exclusion over application resources identified by
//! `(resource type, resource id)`.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): lock blocks, lock items, errors
//! - **Ports Layer** (`ports/`): the `ResourceLockApi` trait
//! - **Service Layer** (`service.rs`): `LockService`, the in-memory lock table
//! - **Adapters** (`adapters/`): bus listener reaping unused slots on idle
//!
//! ## Lock Model
//!
//! A resource type is registered once with `max_locks` (permits per
//! resource) and `allow_multi`. Single types grant one permit per user;
//! multi types grant one permit to a *set* of users who share it.
//!
//! Waiting for a permit never holds the lock table: the table lock only
//! covers finding or creating the item, the wait happens on the item's own
//! semaphore. Batches acquire in ascending id order, so competing batches
//! cannot deadlock each other.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::bus::LockGarbageCollector;
pub use config::{LockConfig, ResourceTypeConfig};
pub use domain::entities::{LockInfo, LockResourceBlock, LockResourceItem};
pub use domain::errors::LockError;
pub use ports::inbound::ResourceLockApi;
pub use service::LockService;
