//! # TTL Cache
//!
//! Expiring map behind the client token table and the anti-CSRF table.
//!
//! The cache does not read a clock: every operation takes `now` in
//! milliseconds from the caller's time source. Expired entries are not
//! dropped silently. A lookup that hits one evicts it and hands it back as
//! [`Lookup::Expired`], and [`TtlCache::purge_expired`] returns everything
//! it evicted, so the owner can release per-entry resources.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: u64,
}

/// Result of a cache lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<V> {
    /// Live entry. Its TTL was restarted if the lookup refreshes.
    Hit(V),
    /// Entry whose TTL had run out. It has been evicted.
    Expired(V),
    /// No entry.
    Miss,
}

/// Map whose entries expire `ttl_ms` after their last insert or refresh.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    ttl_ms: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            entries: HashMap::new(),
            ttl_ms,
        }
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// Insert or replace. Returns the replaced value.
    pub fn insert(&mut self, key: K, value: V, now: u64) -> Option<V> {
        let entry = Entry {
            value,
            expires_at: now.saturating_add(self.ttl_ms),
        };
        self.entries.insert(key, entry).map(|e| e.value)
    }

    /// Look up `key`, restarting its TTL on a hit.
    pub fn get<Q>(&mut self, key: &Q, now: u64) -> Lookup<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key, now, true)
    }

    /// Look up `key` without touching its TTL.
    pub fn peek<Q>(&mut self, key: &Q, now: u64) -> Lookup<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key, now, false)
    }

    fn lookup<Q>(&mut self, key: &Q, now: u64, refresh: bool) -> Lookup<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let expired = match self.entries.get(key) {
            None => return Lookup::Miss,
            Some(entry) => entry.expires_at <= now,
        };
        if expired {
            return self
                .entries
                .remove(key)
                .map_or(Lookup::Miss, |e| Lookup::Expired(e.value));
        }

        let ttl = self.ttl_ms;
        match self.entries.get_mut(key) {
            Some(entry) => {
                if refresh {
                    entry.expires_at = now.saturating_add(ttl);
                }
                Lookup::Hit(entry.value.clone())
            }
            None => Lookup::Miss,
        }
    }

    /// Remove `key` whether expired or not.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key).map(|e| e.value)
    }

    /// First live entry matching `pred`, TTL restarted. Linear scan.
    pub fn find<F>(&mut self, now: u64, mut pred: F) -> Option<V>
    where
        F: FnMut(&V) -> bool,
    {
        let ttl = self.ttl_ms;
        self.entries
            .values_mut()
            .find(|e| e.expires_at > now && pred(&e.value))
            .map(|e| {
                e.expires_at = now.saturating_add(ttl);
                e.value.clone()
            })
    }

    /// Remove every entry matching `pred`, live or expired.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Vec<V>
    where
        F: FnMut(&V) -> bool,
    {
        let keys: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, e)| pred(&e.value))
            .map(|(k, _)| k.clone())
            .collect();
        keys.iter().filter_map(|k| self.remove(k)).collect()
    }

    /// Evict every expired entry and return the evicted values.
    pub fn purge_expired(&mut self, now: u64) -> Vec<V> {
        let keys: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        keys.iter().filter_map(|k| self.remove(k)).collect()
    }

    /// Live values, in no particular order.
    pub fn values(&self, now: u64) -> Vec<V> {
        self.entries
            .values()
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone())
            .collect()
    }

    /// Stored entries, expired ones included until evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> TtlCache<&'static str, u32> {
        TtlCache::new(100)
    }

    #[test]
    fn test_hit_refreshes_ttl() {
        let mut cache = cache();
        cache.insert("a", 1, 0);

        assert_eq!(cache.get(&"a", 90), Lookup::Hit(1));
        // Refreshed at 90: alive until 190.
        assert_eq!(cache.get(&"a", 180), Lookup::Hit(1));
        assert_eq!(cache.get(&"a", 280), Lookup::Expired(1));
        assert_eq!(cache.get(&"a", 280), Lookup::Miss);
    }

    #[test]
    fn test_peek_does_not_refresh() {
        let mut cache = cache();
        cache.insert("a", 1, 0);

        assert_eq!(cache.peek(&"a", 90), Lookup::Hit(1));
        assert_eq!(cache.peek(&"a", 100), Lookup::Expired(1));
    }

    #[test]
    fn test_find_skips_expired() {
        let mut cache = cache();
        cache.insert("old", 1, 0);
        cache.insert("new", 1, 50);

        assert_eq!(cache.find(120, |v| *v == 1), Some(1));
        assert_eq!(cache.values(120), vec![1]);
        assert_eq!(cache.find(120, |v| *v == 2), None);
    }

    #[test]
    fn test_purge_returns_evicted() {
        let mut cache = cache();
        cache.insert("a", 1, 0);
        cache.insert("b", 2, 50);
        cache.insert("c", 3, 80);

        let mut evicted = cache.purge_expired(120);
        evicted.sort_unstable();
        assert_eq!(evicted, vec![1]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_remove_where() {
        let mut cache = cache();
        cache.insert("a", 1, 0);
        cache.insert("b", 2, 0);
        cache.insert("c", 1, 0);

        assert_eq!(cache.remove_where(|v| *v == 1).len(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.remove(&"b"), Some(2));
        assert!(cache.is_empty());
    }
}
