//! # Lock Errors

use thiserror::Error;

/// Errors raised by lock operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    /// The resource type was never registered with `create_resource`.
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    /// The type is already registered with different parameters.
    #[error("Resource type {resource_type} already defined with max_locks={max_locks}, allow_multi={allow_multi}")]
    ConflictingDefinition {
        resource_type: String,
        max_locks: usize,
        allow_multi: bool,
    },

    /// `max_locks` must be between 1 and the semaphore permit limit.
    #[error("Resource type {0} needs between one and Semaphore::MAX_PERMITS lock slots")]
    InvalidMaxLocks(String),

    /// A multi-owner operation on a single-owner type.
    #[error("Resource type {0} does not allow shared locks")]
    MultiNotAllowed(String),

    /// A multi-owner operation with no users.
    #[error("Empty owner set")]
    EmptyOwnerSet,

    /// Unlock of a resource nobody holds.
    #[error("Resource {resource_type}/{resource_id} is not locked")]
    NotLocked {
        resource_type: String,
        resource_id: i64,
    },

    /// Unlock by users who do not own the resource.
    #[error("Resource {resource_type}/{resource_id} is not locked by {user_ids:?}")]
    NotOwner {
        resource_type: String,
        resource_id: i64,
        user_ids: Vec<i64>,
    },

    /// The item semaphore was closed.
    #[error("Lock service closed")]
    Closed,
}
