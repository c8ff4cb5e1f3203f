//! Per-key observer registry.
//!
//! Callbacks run outside the registry lock, each behind `catch_unwind`, so a
//! panicking observer neither poisons the registry nor starves the others.
//! Every subscriber carries a live flag that is cleared on unsubscribe and
//! checked right before each invocation.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::entry::CacheEntry;
use crate::key::QueryKey;

type Callback<T> = Arc<dyn Fn(&QueryKey, &CacheEntry<T>) + Send + Sync>;

struct Subscriber<T> {
    id: u64,
    live: Arc<AtomicBool>,
    callback: Callback<T>,
}

struct Registry<T> {
    next_id: u64,
    by_key: HashMap<QueryKey, Vec<Subscriber<T>>>,
}

struct BroadcastInner<T> {
    registry: Mutex<Registry<T>>,
}

trait Detach: Send + Sync {
    fn detach(&self, key: &QueryKey, id: u64);
}

impl<T> Detach for BroadcastInner<T> {
    fn detach(&self, key: &QueryKey, id: u64) {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(subscribers) = registry.by_key.get_mut(key) {
            subscribers.retain(|s| s.id != id);
            if subscribers.is_empty() {
                registry.by_key.remove(key);
            }
        }
    }
}

/// Fan-out of entry updates to everyone observing a key.
pub struct Broadcaster<T> {
    inner: Arc<BroadcastInner<T>>,
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Broadcaster<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(BroadcastInner {
                registry: Mutex::new(Registry {
                    next_id: 0,
                    by_key: HashMap::new(),
                }),
            }),
        }
    }
}

impl<T: Send + Sync + 'static> Broadcaster<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for updates to `key`.
    ///
    /// The callback is removed when the returned guard is dropped or
    /// explicitly unsubscribed.
    pub fn subscribe<F>(&self, key: QueryKey, callback: F) -> Subscription
    where
        F: Fn(&QueryKey, &CacheEntry<T>) + Send + Sync + 'static,
    {
        let live = Arc::new(AtomicBool::new(true));
        let id = {
            let mut registry = self.inner.registry.lock().unwrap_or_else(PoisonError::into_inner);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.by_key.entry(key.clone()).or_default().push(Subscriber {
                id,
                live: Arc::clone(&live),
                callback: Arc::new(callback),
            });
            id
        };

        let owner: Arc<dyn Detach> = self.inner.clone();
        Subscription {
            key,
            id,
            live,
            owner: Arc::downgrade(&owner),
        }
    }

    /// Invoke every live callback for `key` with `entry`.
    ///
    /// Returns the number of callbacks that ran to completion.
    pub fn notify(&self, key: &QueryKey, entry: &CacheEntry<T>) -> usize {
        let snapshot: Vec<(Arc<AtomicBool>, Callback<T>)> = {
            let registry = self.inner.registry.lock().unwrap_or_else(PoisonError::into_inner);
            match registry.by_key.get(key) {
                Some(subscribers) => subscribers
                    .iter()
                    .map(|s| (Arc::clone(&s.live), Arc::clone(&s.callback)))
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for (live, callback) in snapshot {
            if !live.load(Ordering::Acquire) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| callback(key, entry))) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::error!(key = %key, "Subscriber callback panicked"),
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        let registry = self.inner.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.by_key.get(key).map_or(0, Vec::len)
    }

    pub fn has_subscribers(&self, key: &QueryKey) -> bool {
        self.subscriber_count(key) > 0
    }
}

/// Handle for one registered callback.
///
/// Dropping the handle unsubscribes. Unsubscribing more than once is a no-op.
pub struct Subscription {
    key: QueryKey,
    id: u64,
    live: Arc<AtomicBool>,
    owner: Weak<dyn Detach>,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn is_active(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub fn unsubscribe(&self) {
        if !self.live.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(owner) = self.owner.upgrade() {
            owner.detach(&self.key, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
