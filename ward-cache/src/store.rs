//! Keyed entry storage.
//!
//! `CacheStore` is plain data behind the coordinator's lock. It holds exactly
//! one entry per key and only changes through `put`, `invalidate`, `remove`,
//! and `evict_idle`.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::entry::{CacheEntry, QueryStatus};
use crate::key::QueryKey;

pub struct CacheStore<T> {
    entries: HashMap<QueryKey, CacheEntry<T>>,
}

impl<T> Default for CacheStore<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> CacheStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &QueryKey) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    /// Replace the entry for `key`.
    pub fn put(&mut self, key: QueryKey, entry: CacheEntry<T>) {
        self.entries.insert(key, entry);
    }

    /// Force the next access to treat the entry as stale.
    ///
    /// Returns false when there is nothing to invalidate.
    pub fn invalidate(&mut self, key: &QueryKey) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.entries.insert(key.clone(), entry.invalidated());
                true
            }
            None => false,
        }
    }

    /// Drop the entry for `key` unless a fetch is running for it.
    pub fn remove(&mut self, key: &QueryKey) -> Option<CacheEntry<T>> {
        if self.entries.get(key)?.is_in_flight() {
            return None;
        }
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.entries.keys()
    }

    /// Evict entries idle for longer than `idle`.
    ///
    /// Entries with a running fetch, or for which `is_observed` returns
    /// true, are never evicted. Returns the evicted keys.
    pub fn evict_idle<F>(&mut self, now: DateTime<Utc>, idle: Duration, is_observed: F) -> Vec<QueryKey>
    where
        F: Fn(&QueryKey) -> bool,
    {
        let idle = chrono::Duration::from_std(idle).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let evictable: Vec<QueryKey> = self
            .entries
            .iter()
            .filter(|(key, entry)| {
                !entry.is_in_flight() && !is_observed(key) && now - entry.last_accessed() > idle
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &evictable {
            self.entries.remove(key);
        }
        evictable
    }
}

/// Whether `entry` must be revalidated at `now`.
///
/// True when the entry was invalidated, failed, was never fetched, or its
/// freshness window has elapsed. The window end itself is still fresh.
pub fn is_stale<T>(entry: &CacheEntry<T>, now: DateTime<Utc>) -> bool {
    if entry.is_invalidated() || entry.status() == QueryStatus::Failure {
        return true;
    }
    match entry.stale_after() {
        Some(stale_after) => now > stale_after,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{canonicalize, ParamValue};
    use std::sync::Arc;
    use ward_core::FetchError;

    fn key(name: &str) -> QueryKey {
        canonicalize("patients", vec![("name", Some(ParamValue::from(name)))]).unwrap()
    }

    fn success(now: DateTime<Utc>, window: Duration) -> CacheEntry<u32> {
        CacheEntry::new(now).into_success(Arc::new(1), 0, now, window)
    }

    #[test]
    fn test_put_replaces_entry() {
        let now = Utc::now();
        let mut store = CacheStore::new();
        store.put(key("a"), CacheEntry::new(now));
        store.put(key("a"), success(now, Duration::from_secs(1)));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key("a")).map(CacheEntry::status), Some(QueryStatus::Success));
    }

    #[test]
    fn test_staleness_boundaries() {
        let now = Utc::now();
        let window = Duration::from_secs(30);
        let entry = success(now, window);

        assert!(!is_stale(&entry, now + chrono::Duration::seconds(29)));
        assert!(!is_stale(&entry, now + chrono::Duration::seconds(30)));
        assert!(is_stale(&entry, now + chrono::Duration::seconds(31)));
    }

    #[test]
    fn test_failure_and_empty_are_stale() {
        let now = Utc::now();
        let failed = success(now, Duration::from_secs(60)).into_failure(FetchError::permanent("404"));
        assert!(is_stale(&failed, now));
        assert!(is_stale(&CacheEntry::<u32>::new(now), now));
    }

    #[test]
    fn test_invalidate_forces_staleness() {
        let now = Utc::now();
        let mut store = CacheStore::new();
        store.put(key("a"), success(now, Duration::from_secs(60)));

        assert!(store.invalidate(&key("a")));
        assert!(!store.invalidate(&key("missing")));
        let entry = store.get(&key("a")).unwrap();
        assert!(is_stale(entry, now));
        assert_eq!(entry.generation(), 1);
    }

    #[test]
    fn test_evict_idle_respects_observers() {
        let start = Utc::now();
        let mut store = CacheStore::new();
        store.put(key("a"), success(start, Duration::from_secs(1)));
        store.put(key("b"), success(start, Duration::from_secs(1)));

        let later = start + chrono::Duration::seconds(120);
        let observed = key("b");
        let evicted = store.evict_idle(later, Duration::from_secs(60), |k| *k == observed);

        assert_eq!(evicted, vec![key("a")]);
        assert!(store.get(&key("b")).is_some());
    }

    #[test]
    fn test_evict_idle_keeps_recent_entries() {
        let start = Utc::now();
        let mut store = CacheStore::new();
        store.put(key("a"), success(start, Duration::from_secs(1)));

        let evicted = store.evict_idle(start + chrono::Duration::seconds(30), Duration::from_secs(60), |_| false);
        assert!(evicted.is_empty());
        assert_eq!(store.len(), 1);
    }
}
