//! Request coordinator.
//!
//! `QueryClient` owns the store and the broadcaster for one payload type and
//! is the only writer to either. It decides for each `ensure` whether to
//! serve the cached payload, attach to the fetch already running for the
//! key, or start a new one.
//!
//! A started fetch is a single shared future. The first poller (a spawned
//! driver when a Tokio runtime is available, otherwise whoever resolves the
//! handle) runs the fetcher through the retry loop. Every other caller
//! awaits the same future, so concurrent `ensure` calls for one key cost
//! exactly one fetch.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt};
use ward_core::{CacheSettings, FetchError, RetryConfig};

use crate::broadcast::{Broadcaster, Subscription};
use crate::clock::{Clock, SystemClock};
use crate::entry::{CacheEntry, InFlight, QueryStatus, SharedFetch};
use crate::freshness::CacheRead;
use crate::key::QueryKey;
use crate::retry::RetryPolicy;
use crate::store::{is_stale, CacheStore};
use crate::traits::CacheStats;

type BoxedFetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync>;

/// Configuration for a query client.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// How long a successful payload is served without refetching.
    pub stale_time: Duration,
    /// How long an unobserved entry is kept after its last access.
    pub idle_eviction: Duration,
    pub retry: RetryPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(30),
            idle_eviction: Duration::from_secs(300),
            retry: RetryPolicy::default(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &CacheSettings, retry: &RetryConfig) -> Self {
        Self {
            stale_time: settings.stale_time(),
            idle_eviction: settings.idle_eviction(),
            retry: RetryPolicy::from(retry),
        }
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_idle_eviction(mut self, idle: Duration) -> Self {
        self.idle_eviction = idle;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    deduplicated: AtomicU64,
    evictions: AtomicU64,
}

struct ClientInner<T> {
    store: Mutex<CacheStore<T>>,
    broadcaster: Broadcaster<T>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    next_flight: AtomicU64,
    counters: Counters,
}

impl<T> ClientInner<T> {
    fn lock_store(&self) -> MutexGuard<'_, CacheStore<T>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outcome of [`QueryClient::ensure`].
pub enum Ensure<T> {
    /// A fresh payload was already cached; no fetch was started.
    Cached(CacheRead<T>),
    /// A fetch is running for the key, either new or joined.
    InFlight(FetchHandle<T>),
}

impl<T> Ensure<T> {
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }

    /// True when this call attached to a fetch another caller started.
    pub fn joined_existing(&self) -> bool {
        match self {
            Self::Cached(_) => false,
            Self::InFlight(handle) => handle.joined_existing(),
        }
    }

    /// Wait for the payload.
    pub async fn resolve(self) -> Result<CacheRead<T>, FetchError> {
        match self {
            Self::Cached(read) => Ok(read),
            Self::InFlight(handle) => handle.resolve().await,
        }
    }
}

/// A waiter on one shared fetch.
pub struct FetchHandle<T> {
    future: SharedFetch<T>,
    joined_existing: bool,
}

impl<T> FetchHandle<T> {
    pub fn joined_existing(&self) -> bool {
        self.joined_existing
    }

    pub async fn resolve(self) -> Result<CacheRead<T>, FetchError> {
        self.future.await
    }
}

/// Keyed query cache for payloads of type `T`.
///
/// Cloning is cheap and every clone shares the same store.
pub struct QueryClient<T> {
    inner: Arc<ClientInner<T>>,
}

impl<T> Clone for QueryClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> QueryClient<T> {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                store: Mutex::new(CacheStore::new()),
                broadcaster: Broadcaster::new(),
                config,
                clock,
                next_flight: AtomicU64::new(0),
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Make sure a payload for `key` is available or on its way.
    ///
    /// Serves a fresh `Success` entry synchronously, attaches to a running
    /// fetch, or starts a new one through `fetcher`.
    pub fn ensure<F, Fut>(&self, key: &QueryKey, fetcher: F) -> Ensure<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let now = self.inner.clock.now();
        let mut store = self.inner.lock_store();
        let existing = store.get(key).cloned();

        if let Some(entry) = existing {
            if let Some(handle) = attach(&entry) {
                store.put(key.clone(), entry.touched(now));
                drop(store);
                self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.inner.counters.deduplicated.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, "Attached to in-flight fetch");
                return Ensure::InFlight(handle);
            }

            let fresh = match (entry.payload(), entry.fetched_at()) {
                (Some(payload), Some(fetched_at))
                    if entry.status() == QueryStatus::Success && !is_stale(&entry, now) =>
                {
                    Some(CacheRead::from_cache(Arc::clone(payload), fetched_at))
                }
                _ => None,
            };
            if let Some(read) = fresh {
                store.put(key.clone(), entry.touched(now));
                drop(store);
                self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %key, "Cache hit");
                return Ensure::Cached(read);
            }
        }

        self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
        let handle = self.start_fetch(store, key, boxed(fetcher), now);
        Ensure::InFlight(handle)
    }

    /// Explicit user retry: fetch again regardless of freshness.
    ///
    /// The retry count starts over. A fetch that is already running is
    /// joined instead of duplicated.
    pub fn retry<F, Fut>(&self, key: &QueryKey, fetcher: F) -> FetchHandle<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let now = self.inner.clock.now();
        let store = self.inner.lock_store();
        if let Some(handle) = store.get(key).and_then(attach) {
            return handle;
        }
        tracing::debug!(key = %key, "Manual retry");
        self.start_fetch(store, key, boxed(fetcher), now)
    }

    /// Mark the entry for `key` stale and tell its observers.
    ///
    /// A fetch already running still writes its result, but the entry stays
    /// stale afterwards.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let snapshot = {
            let mut store = self.inner.lock_store();
            if !store.invalidate(key) {
                return false;
            }
            store.get(key).cloned()
        };
        if let Some(entry) = snapshot {
            self.inner.broadcaster.notify(key, &entry);
        }
        tracing::debug!(key = %key, "Invalidated");
        true
    }

    /// Snapshot of the current entry for `key`.
    pub fn entry(&self, key: &QueryKey) -> Option<CacheEntry<T>> {
        self.inner.lock_store().get(key).cloned()
    }

    /// Whether the entry for `key` must be revalidated now.
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        let now = self.inner.clock.now();
        self.inner.lock_store().get(key).map_or(true, |entry| is_stale(entry, now))
    }

    /// Observe every transition of the entry for `key`.
    pub fn subscribe<F>(&self, key: QueryKey, callback: F) -> Subscription
    where
        F: Fn(&QueryKey, &CacheEntry<T>) + Send + Sync + 'static,
    {
        self.inner.broadcaster.subscribe(key, callback)
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.inner.broadcaster.subscriber_count(key)
    }

    /// Drop entries nobody has touched within the idle window.
    ///
    /// Entries with a running fetch or a live subscriber are kept.
    pub fn evict_idle(&self) -> Vec<QueryKey> {
        let now = self.inner.clock.now();
        let broadcaster = &self.inner.broadcaster;
        let evicted = self.inner.lock_store().evict_idle(
            now,
            self.inner.config.idle_eviction,
            |key| broadcaster.has_subscribers(key),
        );
        if !evicted.is_empty() {
            self.inner
                .counters
                .evictions
                .fetch_add(evicted.len() as u64, Ordering::Relaxed);
            tracing::debug!(count = evicted.len(), "Evicted idle entries");
        }
        evicted
    }

    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            fetches: counters.fetches.load(Ordering::Relaxed),
            deduplicated: counters.deduplicated.load(Ordering::Relaxed),
            entry_count: self.inner.lock_store().len() as u64,
            evictions: counters.evictions.load(Ordering::Relaxed),
        }
    }

    /// Put the entry into `Pending` with a new shared fetch, notify, and
    /// start driving the fetch.
    fn start_fetch(
        &self,
        mut store: MutexGuard<'_, CacheStore<T>>,
        key: &QueryKey,
        fetcher: BoxedFetcher<T>,
        now: DateTime<Utc>,
    ) -> FetchHandle<T> {
        let id = self.inner.next_flight.fetch_add(1, Ordering::Relaxed) + 1;
        let base = store.get(key).cloned().unwrap_or_else(|| CacheEntry::new(now));
        let future = run_fetch(
            Arc::downgrade(&self.inner),
            Arc::clone(&self.inner.clock),
            key.clone(),
            fetcher,
            id,
            self.inner.config.retry.clone(),
        )
        .boxed()
        .shared();

        let flight = InFlight {
            id,
            generation: base.generation(),
            future: future.clone(),
        };
        let pending = base.into_pending(flight, now);
        store.put(key.clone(), pending.clone());
        drop(store);

        self.inner.counters.fetches.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, flight = id, "Starting fetch");
        self.inner.broadcaster.notify(key, &pending);

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            drop(runtime.spawn(future.clone()));
        }

        FetchHandle {
            future,
            joined_existing: false,
        }
    }
}

fn attach<T>(entry: &CacheEntry<T>) -> Option<FetchHandle<T>> {
    entry.in_flight().map(|flight| FetchHandle {
        future: flight.future.clone(),
        joined_existing: true,
    })
}

fn boxed<T, F, Fut>(fetcher: F) -> BoxedFetcher<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
    Arc::new(move || fetcher().boxed())
}

/// Run `fetcher` under `policy`, writing the outcome back if the client is
/// still alive and this flight is still the current one.
async fn run_fetch<T: Send + Sync + 'static>(
    client: Weak<ClientInner<T>>,
    clock: Arc<dyn Clock>,
    key: QueryKey,
    fetcher: BoxedFetcher<T>,
    flight_id: u64,
    policy: RetryPolicy,
) -> Result<CacheRead<T>, FetchError> {
    let mut attempt = 1;
    loop {
        match fetcher().await {
            Ok(value) => {
                let payload = Arc::new(value);
                let fetched_at = complete(&client, &key, flight_id, Ok(Arc::clone(&payload)))
                    .unwrap_or_else(|| clock.now());
                return Ok(CacheRead::from_fetch(payload, fetched_at));
            }
            Err(err) if policy.should_retry(&err, attempt) => {
                let Some(inner) = client.upgrade() else {
                    return Err(err);
                };
                let delay = policy.backoff_for(attempt);
                tracing::warn!(
                    key = %key,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient fetch failure, retrying"
                );
                record_retry(&inner, &key, flight_id, attempt);
                drop(inner);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::warn!(
                    key = %key,
                    attempts = attempt,
                    transient = err.is_transient(),
                    error = %err,
                    "Fetch failed"
                );
                complete(&client, &key, flight_id, Err(err.clone()));
                return Err(err);
            }
        }
    }
}

fn record_retry<T: Send + Sync + 'static>(
    inner: &ClientInner<T>,
    key: &QueryKey,
    flight_id: u64,
    retry_count: u32,
) {
    let mut store = inner.lock_store();
    let Some(entry) = store.get(key).cloned() else {
        return;
    };
    if entry.in_flight().map(|f| f.id) == Some(flight_id) {
        store.put(key.clone(), entry.with_retry_count(retry_count));
    }
}

/// Write the final outcome of flight `flight_id` and notify observers.
///
/// Returns the completion time, or `None` once the client is gone.
fn complete<T: Send + Sync + 'static>(
    client: &Weak<ClientInner<T>>,
    key: &QueryKey,
    flight_id: u64,
    outcome: Result<Arc<T>, FetchError>,
) -> Option<DateTime<Utc>> {
    let inner = client.upgrade()?;
    let now = inner.clock.now();

    let snapshot = {
        let mut store = inner.lock_store();
        let Some(entry) = store.get(key).cloned() else {
            return Some(now);
        };
        let Some(flight_generation) = entry
            .in_flight()
            .filter(|f| f.id == flight_id)
            .map(|f| f.generation)
        else {
            tracing::trace!(key = %key, flight = flight_id, "Dropping superseded fetch result");
            return Some(now);
        };

        let next = match outcome {
            Ok(payload) => entry.into_success(payload, flight_generation, now, inner.config.stale_time),
            Err(err) => entry.into_failure(err),
        };
        store.put(key.clone(), next.clone());
        next
    };

    inner.broadcaster.notify(key, &snapshot);
    Some(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::key::{canonicalize, ParamValue};
    use std::sync::atomic::AtomicUsize;

    fn key(id: &str) -> QueryKey {
        canonicalize("patient", vec![("id", Some(ParamValue::from(id)))]).unwrap()
    }

    fn fast_config() -> CacheConfig {
        CacheConfig::default().with_retry(
            RetryPolicy::default().with_backoff(Duration::from_millis(1), Duration::from_millis(2)),
        )
    }

    fn counting(calls: &Arc<AtomicUsize>, value: u32) -> impl Fn() -> BoxFuture<'static, Result<u32, FetchError>> + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(value) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_ensure_fetches_then_serves_cached() {
        let client = QueryClient::<u32>::new(fast_config());
        let calls = Arc::new(AtomicUsize::new(0));

        let first = client.ensure(&key("a"), counting(&calls, 7));
        assert!(!first.is_cached());
        assert_eq!(*first.resolve().await.unwrap().value(), 7);

        let second = client.ensure(&key("a"), counting(&calls, 8));
        assert!(second.is_cached());
        assert_eq!(*second.resolve().await.unwrap().value(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = client.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_second_ensure_attaches_to_running_fetch() {
        let client = QueryClient::<u32>::new(fast_config());
        let calls = Arc::new(AtomicUsize::new(0));

        let a = client.ensure(&key("a"), counting(&calls, 1));
        let b = client.ensure(&key("a"), counting(&calls, 2));
        assert!(!a.joined_existing());
        assert!(b.joined_existing());

        let (ra, rb) = (a.resolve().await.unwrap(), b.resolve().await.unwrap());
        assert_eq!(*ra.value(), 1);
        assert_eq!(*rb.value(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.stats().deduplicated, 1);
    }

    #[tokio::test]
    async fn test_retry_count_recorded_on_failure() {
        let client = QueryClient::<u32>::new(fast_config());
        let result = client
            .ensure(&key("a"), || async { Err(FetchError::transient("down")) })
            .resolve()
            .await;

        assert!(result.is_err());
        let entry = client.entry(&key("a")).unwrap();
        assert_eq!(entry.status(), QueryStatus::Failure);
        assert_eq!(entry.retry_count(), 2);
        assert!(!entry.is_in_flight());
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let client = QueryClient::<u32>::new(fast_config());
        let calls = Arc::new(AtomicUsize::new(0));

        client.ensure(&key("a"), counting(&calls, 1)).resolve().await.unwrap();
        assert!(client.invalidate(&key("a")));
        assert!(client.is_stale(&key("a")));
        assert!(!client.ensure(&key("a"), counting(&calls, 2)).is_cached());
        assert!(!client.invalidate(&key("missing")));
    }

    #[tokio::test]
    async fn test_evict_idle_skips_subscribed_keys() {
        let clock = Arc::new(ManualClock::default());
        let client = QueryClient::<u32>::with_clock(
            fast_config().with_idle_eviction(Duration::from_secs(60)),
            clock.clone(),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        client.ensure(&key("a"), counting(&calls, 1)).resolve().await.unwrap();
        client.ensure(&key("b"), counting(&calls, 2)).resolve().await.unwrap();
        let _watch = client.subscribe(key("b"), |_, _| {});

        clock.advance(Duration::from_secs(61));
        assert_eq!(client.evict_idle(), vec![key("a")]);
        assert!(client.entry(&key("b")).is_some());
        assert_eq!(client.stats().evictions, 1);
    }

    #[test]
    fn test_ensure_without_runtime_runs_on_resolve() {
        let client = QueryClient::<u32>::new(CacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let ensure = client.ensure(&key("a"), counting(&calls, 3));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let read = runtime.block_on(ensure.resolve()).unwrap();
        assert_eq!(*read.value(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.entry(&key("a")).map(|e| e.status()), Some(QueryStatus::Success));
    }

    #[test]
    fn test_fetch_outliving_client_stamps_injected_clock() {
        let start = Utc::now() - chrono::Duration::days(400);
        let clock = Arc::new(ManualClock::new(start));
        let client = QueryClient::<u32>::with_clock(CacheConfig::default(), clock.clone());
        let calls = Arc::new(AtomicUsize::new(0));
        let Ensure::InFlight(handle) = client.ensure(&key("a"), counting(&calls, 5)) else {
            panic!("expected a new fetch");
        };
        drop(client);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let read = runtime.block_on(handle.resolve()).unwrap();
        assert_eq!(*read.value(), 5);
        assert_eq!(read.fetched_at(), start);
    }
}
