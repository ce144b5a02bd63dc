#![forbid(unsafe_code)]

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use review_ledger_contracts::MonotonicTimeNs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expire_at: MonotonicTimeNs,
}

impl<V> CacheEntry<V> {
    pub fn is_expired(&self, now: MonotonicTimeNs) -> bool {
        now >= self.expire_at
    }
}

/// Process-local key/value map with per-entry expiry.
///
/// Expiry is lazy: `set`, `get`, `exists` and `take` first drop every entry
/// whose deadline has passed, so cost is linear in the table size. Nothing
/// survives a restart.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, now: MonotonicTimeNs, key: K, value: V, ttl_seconds: u64) {
        let mut entries = self.entries();
        entries.insert(
            key,
            CacheEntry {
                value,
                expire_at: now.saturating_add_secs(ttl_seconds),
            },
        );
        sweep_expired(&mut entries, now);
    }

    pub fn get<Q>(&self, now: MonotonicTimeNs, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut entries = self.entries();
        sweep_expired(&mut entries, now);
        entries.get(key).map(|e| e.value.clone())
    }

    pub fn exists<Q>(&self, now: MonotonicTimeNs, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(now, key).is_some()
    }

    /// Removes and returns a live entry under one lock acquisition.
    pub fn take<Q>(&self, now: MonotonicTimeNs, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut entries = self.entries();
        sweep_expired(&mut entries, now);
        entries.remove(key).map(|e| e.value)
    }

    pub fn delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries().remove(key).map(|e| e.value)
    }

    /// Raw entry count, expired entries included.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sweep_expired<K, V>(entries: &mut HashMap<K, CacheEntry<V>>, now: MonotonicTimeNs) {
    entries.retain(|_, entry| !entry.is_expired(now));
}
