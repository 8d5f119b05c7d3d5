//! # Lock Entities
//!
//! One [`LockResourceBlock`] per resource type, holding one
//! [`LockResourceItem`] per resource id that was ever locked and not yet
//! reaped.

use crate::domain::errors::LockError;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Outcome of a successful acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// A permit was taken for the requesting users.
    Acquired,
    /// One of the requesting users already held the resource; nothing taken.
    AlreadyOwned,
}

/// All lock items of one resource type.
#[derive(Debug)]
pub struct LockResourceBlock {
    name: String,
    max_locks: usize,
    allow_multi: bool,
    items: Mutex<HashMap<i64, Arc<LockResourceItem>>>,
}

impl LockResourceBlock {
    pub fn new(name: impl Into<String>, max_locks: usize, allow_multi: bool) -> Self {
        Self {
            name: name.into(),
            max_locks,
            allow_multi,
            items: Mutex::new(HashMap::new()),
        }
    }

    /// Resource type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Permits per resource id.
    pub fn max_locks(&self) -> usize {
        self.max_locks
    }

    /// Whether permits are shared by user sets.
    pub fn allow_multi(&self) -> bool {
        self.allow_multi
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns `true` if no item is live.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Find the item for `id`, creating it on first use.
    pub(crate) fn item(&self, id: i64) -> Arc<LockResourceItem> {
        let mut items = self.items.lock();
        Arc::clone(
            items
                .entry(id)
                .or_insert_with(|| Arc::new(LockResourceItem::new(self.max_locks))),
        )
    }

    /// Find the item for `id` without creating it.
    pub(crate) fn existing_item(&self, id: i64) -> Option<Arc<LockResourceItem>> {
        self.items.lock().get(&id).cloned()
    }

    /// Remove every item that is fully free and not in use by any caller.
    ///
    /// Callers only obtain items through this block's mutex, so an item
    /// whose only reference is the map cannot be handed out concurrently.
    pub(crate) fn collect_garbage(&self) -> usize {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|_, item| Arc::strong_count(item) > 1 || !item.is_free());
        before - items.len()
    }
}

#[derive(Debug, Default)]
struct ItemState {
    owners: BTreeSet<i64>,
    /// Permits currently taken from the semaphore.
    held: usize,
    last_owner: Option<i64>,
}

/// Lock state of one `(type, id)` pair.
///
/// The semaphore bounds how many grants exist; `owners` records who holds
/// them. On multi types one grant covers a whole set of owners, so the
/// owner count may exceed `max_locks`.
#[derive(Debug)]
pub struct LockResourceItem {
    semaphore: Semaphore,
    max_locks: usize,
    state: Mutex<ItemState>,
}

impl LockResourceItem {
    pub(crate) fn new(max_locks: usize) -> Self {
        Self {
            semaphore: Semaphore::new(max_locks),
            max_locks,
            state: Mutex::new(ItemState::default()),
        }
    }

    /// Permits not currently granted.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Current owners, ascending.
    pub fn owners(&self) -> Vec<i64> {
        self.state.lock().owners.iter().copied().collect()
    }

    /// Last user (lowest id of the last user set) granted a permit.
    pub fn last_owner(&self) -> Option<i64> {
        self.state.lock().last_owner
    }

    /// Returns `true` if any of `users` owns the item.
    pub fn is_owned_by_any(&self, users: &BTreeSet<i64>) -> bool {
        let state = self.state.lock();
        users.iter().any(|u| state.owners.contains(u))
    }

    /// Returns `true` when no permit is granted.
    pub fn is_free(&self) -> bool {
        self.available_permits() == self.max_locks && self.state.lock().owners.is_empty()
    }

    /// Take one permit for `users`, waiting at most `wait` (forever if `None`).
    ///
    /// Returns `Ok(None)` on timeout. Re-entry by a current owner returns
    /// `Grant::AlreadyOwned` without taking a permit.
    pub(crate) async fn acquire(
        &self,
        users: &BTreeSet<i64>,
        wait: Option<Duration>,
    ) -> Result<Option<Grant>, LockError> {
        if self.is_owned_by_any(users) {
            return Ok(Some(Grant::AlreadyOwned));
        }

        let permit = match wait {
            None => self.semaphore.acquire().await.map_err(|_| LockError::Closed)?,
            Some(wait) => match tokio::time::timeout(wait, self.semaphore.acquire()).await {
                Ok(permit) => permit.map_err(|_| LockError::Closed)?,
                Err(_) => return Ok(None),
            },
        };

        let mut state = self.state.lock();
        // Another call for the same user won the race; hand the permit back.
        if users.iter().any(|u| state.owners.contains(u)) {
            drop(permit);
            return Ok(Some(Grant::AlreadyOwned));
        }
        permit.forget();
        state.owners.extend(users.iter().copied());
        state.held += 1;
        state.last_owner = users.iter().next().copied();
        Ok(Some(Grant::Acquired))
    }

    /// Release the permit of a single owner. Returns `false` if not an owner.
    pub(crate) fn release_owner(&self, user: i64) -> bool {
        let mut state = self.state.lock();
        if !state.owners.remove(&user) {
            return false;
        }
        state.held = state.held.saturating_sub(1);
        self.semaphore.add_permits(1);
        true
    }

    /// Release the whole shared slot if any of `users` owns it.
    ///
    /// Clears every owner, including owners not listed in `users`.
    pub(crate) fn release_shared(&self, users: &BTreeSet<i64>) -> bool {
        let mut state = self.state.lock();
        if !users.iter().any(|u| state.owners.contains(u)) {
            return false;
        }
        let held = std::mem::take(&mut state.held);
        state.owners.clear();
        self.semaphore.add_permits(held);
        true
    }

    /// Undo exactly one `Grant::Acquired` made for `users`.
    pub(crate) fn release_grant(&self, users: &BTreeSet<i64>) {
        let mut state = self.state.lock();
        for user in users {
            state.owners.remove(user);
        }
        if state.held > 0 {
            state.held -= 1;
            self.semaphore.add_permits(1);
        }
    }

    pub(crate) fn info(&self, resource_type: &str, resource_id: i64) -> LockInfo {
        let state = self.state.lock();
        LockInfo {
            resource_type: resource_type.to_string(),
            resource_id,
            owners: state.owners.iter().copied().collect(),
            max_locks: self.max_locks,
            available_permits: self.semaphore.available_permits(),
            last_owner: state.last_owner,
        }
    }
}

/// Snapshot of one lock item, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockInfo {
    pub resource_type: String,
    pub resource_id: i64,
    pub owners: Vec<i64>,
    pub max_locks: usize,
    pub available_permits: usize,
    pub last_owner: Option<i64>,
}
