//! # Inbound Ports (Driving Ports / API)

use crate::domain::entities::LockInfo;
use crate::domain::errors::LockError;
use async_trait::async_trait;
use std::time::Duration;

/// Resource lock API.
///
/// Every operation on an unregistered type fails with
/// `LockError::UnknownResourceType`. Implementations must be thread-safe.
#[async_trait]
pub trait ResourceLockApi: Send + Sync {
    // =========================================================================
    // Resource Types
    // =========================================================================

    /// Register a resource type. Registering the same definition twice is a no-op.
    fn create_resource(
        &self,
        resource_type: &str,
        max_locks: usize,
        allow_multi: bool,
    ) -> Result<(), LockError>;

    // =========================================================================
    // Single Resource
    // =========================================================================

    /// Lock `(type, id)` for `user_id`, waiting as long as needed.
    ///
    /// Returns immediately without taking a permit if `user_id` already
    /// owns the resource.
    async fn lock_resource(
        &self,
        resource_type: &str,
        resource_id: i64,
        user_id: i64,
    ) -> Result<(), LockError>;

    /// Like `lock_resource` but gives up after `timeout`, returning `false`.
    async fn try_lock_resource(
        &self,
        resource_type: &str,
        resource_id: i64,
        user_id: i64,
        timeout: Duration,
    ) -> Result<bool, LockError>;

    /// Lock `(type, id)` for a set of users sharing one permit (multi types only).
    async fn lock_resource_multi(
        &self,
        resource_type: &str,
        resource_id: i64,
        user_ids: &[i64],
    ) -> Result<(), LockError>;

    /// Like `lock_resource_multi` but gives up after `timeout`.
    async fn try_lock_resource_multi(
        &self,
        resource_type: &str,
        resource_id: i64,
        user_ids: &[i64],
        timeout: Duration,
    ) -> Result<bool, LockError>;

    // =========================================================================
    // Batches
    // =========================================================================

    /// Lock every id of the batch for `user_id`, in ascending id order.
    async fn lock_resources(
        &self,
        resource_type: &str,
        resource_ids: &[i64],
        user_id: i64,
    ) -> Result<(), LockError>;

    /// All-or-nothing batch lock within `timeout`.
    ///
    /// On failure every permit taken by this call is released again.
    async fn try_lock_resources(
        &self,
        resource_type: &str,
        resource_ids: &[i64],
        user_id: i64,
        timeout: Duration,
    ) -> Result<bool, LockError>;

    /// Batch variant of `lock_resource_multi`.
    async fn lock_resources_multi(
        &self,
        resource_type: &str,
        resource_ids: &[i64],
        user_ids: &[i64],
    ) -> Result<(), LockError>;

    /// Batch variant of `try_lock_resource_multi`, all-or-nothing.
    async fn try_lock_resources_multi(
        &self,
        resource_type: &str,
        resource_ids: &[i64],
        user_ids: &[i64],
        timeout: Duration,
    ) -> Result<bool, LockError>;

    // =========================================================================
    // Unlock
    // =========================================================================

    /// Release the permit held by `user_id`.
    fn unlock_resource(
        &self,
        resource_type: &str,
        resource_id: i64,
        user_id: i64,
    ) -> Result<(), LockError>;

    /// Release a shared slot if any of `user_ids` owns it.
    ///
    /// The whole slot is freed and every owner cleared, including owners
    /// not listed in `user_ids`.
    fn unlock_resource_multi(
        &self,
        resource_type: &str,
        resource_id: i64,
        user_ids: &[i64],
    ) -> Result<(), LockError>;

    /// Release every id of the batch held by `user_id`.
    ///
    /// All ids are attempted; the first error is returned.
    fn unlock_resources(
        &self,
        resource_type: &str,
        resource_ids: &[i64],
        user_id: i64,
    ) -> Result<(), LockError>;

    /// Batch variant of `unlock_resource_multi`.
    fn unlock_resources_multi(
        &self,
        resource_type: &str,
        resource_ids: &[i64],
        user_ids: &[i64],
    ) -> Result<(), LockError>;

    /// `unlock_resource` reporting failure as `false`.
    fn unlock_resource_quiet(&self, resource_type: &str, resource_id: i64, user_id: i64) -> bool;

    // =========================================================================
    // Queries & Maintenance
    // =========================================================================

    /// Returns `true` if anyone holds `(type, id)`.
    fn is_locked(&self, resource_type: &str, resource_id: i64) -> Result<bool, LockError>;

    /// Current owners of `(type, id)`, ascending.
    fn owners(&self, resource_type: &str, resource_id: i64) -> Result<Vec<i64>, LockError>;

    /// Diagnostic snapshot of `(type, id)`, `None` if no item exists.
    fn lock_info(
        &self,
        resource_type: &str,
        resource_id: i64,
    ) -> Result<Option<LockInfo>, LockError>;

    /// Drop unused lock items of every type. Returns how many were removed.
    fn collect_garbage(&self) -> usize;
}
