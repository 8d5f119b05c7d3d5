//! # Lock Service
//!
//! In-memory implementation of [`ResourceLockApi`].
//!
//! ## Locking Discipline
//!
//! The type table (`RwLock`) and each block's item map (`Mutex`) are held
//! only to find or create an item. Waiting for a permit happens on the
//! item's semaphore with no table lock held, so a caller blocked on one
//! resource never stalls lock or unlock calls on other resources.

use crate::config::LockConfig;
use crate::domain::entities::{Grant, LockInfo, LockResourceBlock, LockResourceItem};
use crate::domain::errors::LockError;
use crate::ports::inbound::ResourceLockApi;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Resource lock service.
#[derive(Debug, Default)]
pub struct LockService {
    blocks: RwLock<HashMap<String, Arc<LockResourceBlock>>>,
}

impl LockService {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a service with the configured types registered.
    ///
    /// # Errors
    ///
    /// Fails on a zero `max_locks` or two conflicting declarations.
    pub fn from_config(config: &LockConfig) -> Result<Self, LockError> {
        let service = Self::new();
        for rt in &config.resource_types {
            service.create_resource(&rt.name, rt.max_locks, rt.allow_multi)?;
        }
        Ok(service)
    }

    /// Names of the registered types.
    pub fn resource_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.blocks.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Live lock items across all types.
    pub fn resource_count(&self) -> usize {
        self.blocks.read().values().map(|b| b.len()).sum()
    }

    fn block(&self, resource_type: &str) -> Result<Arc<LockResourceBlock>, LockError> {
        self.blocks
            .read()
            .get(resource_type)
            .cloned()
            .ok_or_else(|| LockError::UnknownResourceType(resource_type.to_string()))
    }

    fn multi_block(&self, resource_type: &str) -> Result<Arc<LockResourceBlock>, LockError> {
        let block = self.block(resource_type)?;
        if !block.allow_multi() {
            return Err(LockError::MultiNotAllowed(resource_type.to_string()));
        }
        Ok(block)
    }

    /// Owner set for a single-user request. Multi types treat it as a set of one.
    fn single(user_id: i64) -> BTreeSet<i64> {
        BTreeSet::from([user_id])
    }

    fn user_set(user_ids: &[i64]) -> Result<BTreeSet<i64>, LockError> {
        let users: BTreeSet<i64> = user_ids.iter().copied().collect();
        if users.is_empty() {
            return Err(LockError::EmptyOwnerSet);
        }
        Ok(users)
    }

    async fn acquire_one(
        block: &LockResourceBlock,
        resource_id: i64,
        users: &BTreeSet<i64>,
        wait: Option<Duration>,
    ) -> Result<Option<Grant>, LockError> {
        let item = block.item(resource_id);
        let grant = item.acquire(users, wait).await?;
        match grant {
            Some(Grant::Acquired) => {
                debug!(resource_type = block.name(), resource_id, users = ?users, "Resource locked")
            }
            Some(Grant::AlreadyOwned) => {
                debug!(resource_type = block.name(), resource_id, users = ?users, "Resource already owned")
            }
            None => {
                debug!(resource_type = block.name(), resource_id, users = ?users, "Lock attempt timed out")
            }
        }
        Ok(grant)
    }

    /// Lock every id in ascending order, waiting as long as needed.
    async fn acquire_batch(
        block: &LockResourceBlock,
        resource_ids: &[i64],
        users: &BTreeSet<i64>,
    ) -> Result<(), LockError> {
        let ordered: BTreeSet<i64> = resource_ids.iter().copied().collect();
        for resource_id in ordered {
            Self::acquire_one(block, resource_id, users, None).await?;
        }
        Ok(())
    }

    /// Lock every id in ascending order before `timeout` runs out.
    ///
    /// On the first failure, every grant taken by this call is undone.
    async fn try_acquire_batch(
        block: &LockResourceBlock,
        resource_ids: &[i64],
        users: &BTreeSet<i64>,
        timeout: Duration,
    ) -> Result<bool, LockError> {
        let deadline = Instant::now() + timeout;
        let ordered: BTreeSet<i64> = resource_ids.iter().copied().collect();
        let mut taken: Vec<Arc<LockResourceItem>> = Vec::new();

        for resource_id in ordered {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let outcome = Self::acquire_one(block, resource_id, users, Some(remaining)).await;

            match outcome {
                Ok(Some(Grant::Acquired)) => {
                    if let Some(item) = block.existing_item(resource_id) {
                        taken.push(item);
                    }
                }
                Ok(Some(Grant::AlreadyOwned)) => {}
                Ok(None) | Err(_) => {
                    warn!(
                        resource_type = block.name(),
                        resource_id,
                        rolled_back = taken.len(),
                        "Batch lock failed, rolling back"
                    );
                    for item in taken {
                        item.release_grant(users);
                    }
                    return outcome.map(|_| false);
                }
            }
        }
        Ok(true)
    }

    fn release_one(
        block: &LockResourceBlock,
        resource_id: i64,
        users: &BTreeSet<i64>,
        shared: bool,
    ) -> Result<(), LockError> {
        let item = block
            .existing_item(resource_id)
            .ok_or_else(|| LockError::NotLocked {
                resource_type: block.name().to_string(),
                resource_id,
            })?;

        let released = if shared {
            item.release_shared(users)
        } else {
            users.iter().any(|&u| item.release_owner(u))
        };

        if !released {
            return Err(if item.owners().is_empty() {
                LockError::NotLocked {
                    resource_type: block.name().to_string(),
                    resource_id,
                }
            } else {
                LockError::NotOwner {
                    resource_type: block.name().to_string(),
                    resource_id,
                    user_ids: users.iter().copied().collect(),
                }
            });
        }
        debug!(resource_type = block.name(), resource_id, users = ?users, "Resource unlocked");
        Ok(())
    }

    fn release_batch(
        block: &LockResourceBlock,
        resource_ids: &[i64],
        users: &BTreeSet<i64>,
        shared: bool,
    ) -> Result<(), LockError> {
        let mut first_error = None;
        for &resource_id in resource_ids {
            if let Err(e) = Self::release_one(block, resource_id, users, shared) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl ResourceLockApi for LockService {
    fn create_resource(
        &self,
        resource_type: &str,
        max_locks: usize,
        allow_multi: bool,
    ) -> Result<(), LockError> {
        if max_locks == 0 || max_locks > Semaphore::MAX_PERMITS {
            return Err(LockError::InvalidMaxLocks(resource_type.to_string()));
        }

        let mut blocks = self.blocks.write();
        if let Some(existing) = blocks.get(resource_type) {
            if existing.max_locks() == max_locks && existing.allow_multi() == allow_multi {
                return Ok(());
            }
            return Err(LockError::ConflictingDefinition {
                resource_type: resource_type.to_string(),
                max_locks: existing.max_locks(),
                allow_multi: existing.allow_multi(),
            });
        }

        blocks.insert(
            resource_type.to_string(),
            Arc::new(LockResourceBlock::new(resource_type, max_locks, allow_multi)),
        );
        info!(resource_type, max_locks, allow_multi, "Resource type registered");
        Ok(())
    }

    async fn lock_resource(
        &self,
        resource_type: &str,
        resource_id: i64,
        user_id: i64,
    ) -> Result<(), LockError> {
        let block = self.block(resource_type)?;
        Self::acquire_one(&block, resource_id, &Self::single(user_id), None).await?;
        Ok(())
    }

    async fn try_lock_resource(
        &self,
        resource_type: &str,
        resource_id: i64,
        user_id: i64,
        timeout: Duration,
    ) -> Result<bool, LockError> {
        let block = self.block(resource_type)?;
        let grant = Self::acquire_one(&block, resource_id, &Self::single(user_id), Some(timeout))
            .await?;
        Ok(grant.is_some())
    }

    async fn lock_resource_multi(
        &self,
        resource_type: &str,
        resource_id: i64,
        user_ids: &[i64],
    ) -> Result<(), LockError> {
        let block = self.multi_block(resource_type)?;
        let users = Self::user_set(user_ids)?;
        Self::acquire_one(&block, resource_id, &users, None).await?;
        Ok(())
    }

    async fn try_lock_resource_multi(
        &self,
        resource_type: &str,
        resource_id: i64,
        user_ids: &[i64],
        timeout: Duration,
    ) -> Result<bool, LockError> {
        let block = self.multi_block(resource_type)?;
        let users = Self::user_set(user_ids)?;
        let grant = Self::acquire_one(&block, resource_id, &users, Some(timeout)).await?;
        Ok(grant.is_some())
    }

    async fn lock_resources(
        &self,
        resource_type: &str,
        resource_ids: &[i64],
        user_id: i64,
    ) -> Result<(), LockError> {
        let block = self.block(resource_type)?;
        Self::acquire_batch(&block, resource_ids, &Self::single(user_id)).await
    }

    async fn try_lock_resources(
        &self,
        resource_type: &str,
        resource_ids: &[i64],
        user_id: i64,
        timeout: Duration,
    ) -> Result<bool, LockError> {
        let block = self.block(resource_type)?;
        Self::try_acquire_batch(&block, resource_ids, &Self::single(user_id), timeout).await
    }

    async fn lock_resources_multi(
        &self,
        resource_type: &str,
        resource_ids: &[i64],
        user_ids: &[i64],
    ) -> Result<(), LockError> {
        let block = self.multi_block(resource_type)?;
        let users = Self::user_set(user_ids)?;
        Self::acquire_batch(&block, resource_ids, &users).await
    }

    async fn try_lock_resources_multi(
        &self,
        resource_type: &str,
        resource_ids: &[i64],
        user_ids: &[i64],
        timeout: Duration,
    ) -> Result<bool, LockError> {
        let block = self.multi_block(resource_type)?;
        let users = Self::user_set(user_ids)?;
        Self::try_acquire_batch(&block, resource_ids, &users, timeout).await
    }

    fn unlock_resource(
        &self,
        resource_type: &str,
        resource_id: i64,
        user_id: i64,
    ) -> Result<(), LockError> {
        let block = self.block(resource_type)?;
        let shared = block.allow_multi();
        Self::release_one(&block, resource_id, &Self::single(user_id), shared)
    }

    fn unlock_resource_multi(
        &self,
        resource_type: &str,
        resource_id: i64,
        user_ids: &[i64],
    ) -> Result<(), LockError> {
        let block = self.multi_block(resource_type)?;
        let users = Self::user_set(user_ids)?;
        Self::release_one(&block, resource_id, &users, true)
    }

    fn unlock_resources(
        &self,
        resource_type: &str,
        resource_ids: &[i64],
        user_id: i64,
    ) -> Result<(), LockError> {
        let block = self.block(resource_type)?;
        let shared = block.allow_multi();
        Self::release_batch(&block, resource_ids, &Self::single(user_id), shared)
    }

    fn unlock_resources_multi(
        &self,
        resource_type: &str,
        resource_ids: &[i64],
        user_ids: &[i64],
    ) -> Result<(), LockError> {
        let block = self.multi_block(resource_type)?;
        let users = Self::user_set(user_ids)?;
        Self::release_batch(&block, resource_ids, &users, true)
    }

    fn unlock_resource_quiet(&self, resource_type: &str, resource_id: i64, user_id: i64) -> bool {
        match self.unlock_resource(resource_type, resource_id, user_id) {
            Ok(()) => true,
            Err(e) => {
                debug!(resource_type, resource_id, user_id, error = %e, "Quiet unlock failed");
                false
            }
        }
    }

    fn is_locked(&self, resource_type: &str, resource_id: i64) -> Result<bool, LockError> {
        Ok(!self.owners(resource_type, resource_id)?.is_empty())
    }

    fn owners(&self, resource_type: &str, resource_id: i64) -> Result<Vec<i64>, LockError> {
        let block = self.block(resource_type)?;
        Ok(block
            .existing_item(resource_id)
            .map(|item| item.owners())
            .unwrap_or_default())
    }

    fn lock_info(
        &self,
        resource_type: &str,
        resource_id: i64,
    ) -> Result<Option<LockInfo>, LockError> {
        let block = self.block(resource_type)?;
        Ok(block
            .existing_item(resource_id)
            .map(|item| item.info(resource_type, resource_id)))
    }

    fn collect_garbage(&self) -> usize {
        let blocks: Vec<Arc<LockResourceBlock>> = self.blocks.read().values().cloned().collect();
        let removed: usize = blocks.iter().map(|b| b.collect_garbage()).sum();
        if removed > 0 {
            info!(removed, remaining = self.resource_count(), "Unused lock slots reaped");
        }
        removed
    }
}
