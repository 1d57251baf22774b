//! Stale-while-revalidate cache with single-flight fetches
//!
//! Entries are classified purely from their age:
//!
//! ```text
//! 0 ........ ttl ............ ttl + stale_window ........
//! |  fresh   |      stale       |        miss
//! ```
//!
//! A fresh entry is served without touching the fetcher. A stale entry is served
//! immediately while one detached refresh runs in the background. A miss waits for
//! the fetch. Concurrent callers for the same key share one underlying fetch.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;

/// A fetch shared by every caller waiting on the same key
type PendingFetch<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Freshness classification of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Fresh,
    Stale,
    Miss,
}

impl CacheState {
    /// Classifies an entry of the given age
    ///
    /// `Stale` is only possible when `stale_window` is non-zero.
    pub fn classify(age: Duration, ttl: Duration, stale_window: Duration) -> Self {
        if age <= ttl {
            CacheState::Fresh
        } else if !stale_window.is_zero() && age <= ttl + stale_window {
            CacheState::Stale
        } else {
            CacheState::Miss
        }
    }
}

/// A cached value and when it was stored
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub updated_at: Instant,
    /// A background refresh for this entry is running
    pub is_revalidating: bool,
}

impl<T> CacheEntry<T> {
    fn new(data: T) -> Self {
        Self {
            data,
            updated_at: Instant::now(),
            is_revalidating: false,
        }
    }

    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.updated_at)
    }
}

/// Result of a side-effect free [`SwrCache::get`]
#[derive(Debug, Clone)]
pub struct CacheLookup<T> {
    pub state: CacheState,
    /// Present for `Fresh` and `Stale`
    pub entry: Option<CacheEntry<T>>,
}

/// Options for [`SwrCache::fetch`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Drop the cached entry and go to the fetcher
    pub force_refresh: bool,
}

/// Value returned by [`SwrCache::fetch`] and how it was obtained
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub data: T,
    /// `Miss` whenever the caller waited on a fetch
    pub state: CacheState,
}

impl<T> Fetched<T> {
    fn miss(data: T) -> Self {
        Self {
            data,
            state: CacheState::Miss,
        }
    }

    /// True when the value came out of the cache
    pub fn from_cache(&self) -> bool {
        self.state != CacheState::Miss
    }
}

/// A fetch that panicked instead of settling
///
/// Converted into the cache's error type so every waiting caller gets an error
/// and the key is released for the next fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPanicked {
    pub message: String,
}

impl FetchPanicked {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        Self { message }
    }
}

impl Display for FetchPanicked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fetch panicked: {}", self.message)
    }
}

struct InFlight<T, E> {
    generation: u64,
    pending: PendingFetch<T, E>,
}

struct Inner<K, T, E> {
    entries: RwLock<HashMap<K, CacheEntry<T>>>,
    /// Lock order: `in_flight` before `entries`
    in_flight: Mutex<HashMap<K, InFlight<T, E>>>,
    next_generation: AtomicU64,
    ttl: Duration,
    stale_window: Duration,
}

impl<K, T, E> Inner<K, T, E>
where
    K: Eq + Hash + Clone + Display,
    T: Clone,
{
    fn classify(&self, entry: &CacheEntry<T>) -> CacheState {
        CacheState::classify(entry.age(), self.ttl, self.stale_window)
    }

    /// Stores `data` for `key`, dropping entries that have aged past the stale window
    fn store(&self, entries: &mut HashMap<K, CacheEntry<T>>, key: K, data: T) {
        entries.retain(|_, entry| self.classify(entry) != CacheState::Miss);
        entries.insert(key, CacheEntry::new(data));
    }

    /// Settles a fetch. Results of superseded fetches are dropped.
    fn complete(&self, key: &K, generation: u64, result: &Result<T, E>) {
        let mut in_flight = self.in_flight.lock();
        match in_flight.get(key) {
            Some(record) if record.generation == generation => {}
            _ => {
                tracing::debug!(key = %key, generation, "Discarding result of superseded fetch");
                return;
            }
        }
        in_flight.remove(key);

        let mut entries = self.entries.write();
        match result {
            Ok(data) => self.store(&mut entries, key.clone(), data.clone()),
            Err(_) => {
                let expired = match entries.get_mut(key) {
                    Some(entry) => {
                        entry.is_revalidating = false;
                        self.classify(entry) == CacheState::Miss
                    }
                    None => false,
                };
                if expired {
                    entries.remove(key);
                }
            }
        }
    }
}

/// Generic key/value store with fresh/stale/miss semantics
///
/// Cloning is cheap and clones share state.
pub struct SwrCache<K, T, E> {
    inner: Arc<Inner<K, T, E>>,
}

impl<K, T, E> Clone for SwrCache<K, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, T, E> SwrCache<K, T, E>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Display + From<FetchPanicked> + Send + Sync + 'static,
{
    /// Creates an empty cache
    pub fn new(ttl: Duration, stale_window: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                ttl,
                stale_window,
            }),
        }
    }

    /// Classifies the entry for `key` without side effects
    pub fn get(&self, key: &K) -> CacheLookup<T> {
        let entries = self.inner.entries.read();
        let lookup = entries.get(key).and_then(|entry| {
            match self.inner.classify(entry) {
                CacheState::Miss => None,
                state => Some(CacheLookup {
                    state,
                    entry: Some(entry.clone()),
                }),
            }
        });

        lookup.unwrap_or(CacheLookup {
            state: CacheState::Miss,
            entry: None,
        })
    }

    /// Inserts or overwrites the entry for `key`, stamped now
    pub fn set(&self, key: K, data: T) {
        let mut entries = self.inner.entries.write();
        self.inner.store(&mut entries, key, data);
    }

    /// Returns the value for `key`, calling `fetcher` only when needed
    ///
    /// The fetcher is invoked at most once per in-flight fetch; callers arriving
    /// while a fetch is running join it and observe the same result.
    pub async fn fetch<F, Fut>(
        &self,
        key: K,
        fetcher: F,
        options: FetchOptions,
    ) -> Result<Fetched<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        if options.force_refresh {
            self.inner.entries.write().remove(&key);
            let pending = self.join_or_start(key, fetcher);
            return pending.await.map(Fetched::miss);
        }

        let lookup = self.get(&key);
        match (lookup.state, lookup.entry) {
            (CacheState::Fresh, Some(entry)) => {
                tracing::debug!(key = %key, "Cache hit");
                Ok(Fetched {
                    data: entry.data,
                    state: CacheState::Fresh,
                })
            }
            (CacheState::Stale, Some(entry)) => {
                self.revalidate(key, fetcher);
                Ok(Fetched {
                    data: entry.data,
                    state: CacheState::Stale,
                })
            }
            _ => self.join_or_start(key, fetcher).await.map(Fetched::miss),
        }
    }

    /// Drops the entry and any in-flight record for `key`
    pub fn invalidate(&self, key: &K) {
        let mut in_flight = self.inner.in_flight.lock();
        in_flight.remove(key);
        self.inner.entries.write().remove(key);
    }

    /// Drops every entry and in-flight record
    pub fn clear(&self) {
        let mut in_flight = self.inner.in_flight.lock();
        in_flight.clear();
        self.inner.entries.write().clear();
    }

    /// Number of stored entries
    ///
    /// Expired entries are pruned on the next write, so this may briefly count them.
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of fetches currently running
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    /// Starts a detached refresh unless one is already running
    fn revalidate<F, Fut>(&self, key: K, fetcher: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut in_flight = self.inner.in_flight.lock();
        if in_flight.contains_key(&key) {
            tracing::debug!(key = %key, "Stale hit, refresh already running");
            return;
        }
        if let Some(entry) = self.inner.entries.write().get_mut(&key) {
            entry.is_revalidating = true;
        }
        let pending = self.register(&mut in_flight, key.clone(), fetcher);
        drop(in_flight);

        tracing::debug!(key = %key, "Stale hit, revalidating in background");
        Self::drive(pending, key, true);
    }

    /// Joins the running fetch for `key` or registers a new one
    fn join_or_start<F, Fut>(&self, key: K, fetcher: F) -> PendingFetch<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut in_flight = self.inner.in_flight.lock();
        if let Some(record) = in_flight.get(&key) {
            tracing::debug!(key = %key, "Joining in-flight fetch");
            return record.pending.clone();
        }
        let pending = self.register(&mut in_flight, key.clone(), fetcher);
        drop(in_flight);

        Self::drive(pending.clone(), key, false);
        pending
    }

    /// Must be called with the in-flight lock held so check-and-register is atomic
    fn register<F, Fut>(
        &self,
        in_flight: &mut HashMap<K, InFlight<T, E>>,
        key: K,
        fetcher: F,
    ) -> PendingFetch<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let inner: Weak<Inner<K, T, E>> = Arc::downgrade(&self.inner);
        let task_key = key.clone();
        let fetch = fetcher();

        let pending = async move {
            let result = match AssertUnwindSafe(fetch).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    let panicked = FetchPanicked::from_payload(payload.as_ref());
                    tracing::error!(key = %task_key, error = %panicked, "Fetch panicked");
                    Err(E::from(panicked))
                }
            };
            if let Some(inner) = inner.upgrade() {
                inner.complete(&task_key, generation, &result);
            }
            result
        }
        .boxed()
        .shared();

        in_flight.insert(
            key,
            InFlight {
                generation,
                pending: pending.clone(),
            },
        );
        pending
    }

    /// Polls the fetch to completion even if every waiting caller goes away
    fn drive(pending: PendingFetch<T, E>, key: K, background: bool) {
        tokio::spawn(async move {
            if let Err(e) = pending.await {
                if background {
                    tracing::warn!(key = %key, error = %e, "Background revalidation failed, keeping stale entry");
                } else {
                    tracing::debug!(key = %key, error = %e, "Fetch failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::{advance, sleep};

    type TestCache = SwrCache<String, String, String>;

    impl From<FetchPanicked> for String {
        fn from(panicked: FetchPanicked) -> Self {
            panicked.to_string()
        }
    }

    fn exploding_fetch() -> Result<String, String> {
        panic!("adapter bug")
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn key(k: &str) -> String {
        k.to_string()
    }

    /// Fetcher that counts invocations and resolves to `value` after `delay`
    fn counting_fetcher(
        calls: &Arc<AtomicUsize>,
        delay: Duration,
        value: Result<&str, &str>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<String, String>> {
        let calls = Arc::clone(calls);
        let value = value.map(str::to_string).map_err(str::to_string);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                sleep(delay).await;
                value
            }
            .boxed()
        }
    }

    /// Lets spawned drivers run
    async fn settle() {
        sleep(ms(1)).await;
    }

    #[test]
    fn test_classify_boundaries() {
        let ttl = ms(1000);
        let swr = ms(500);
        assert_eq!(CacheState::classify(ms(0), ttl, swr), CacheState::Fresh);
        assert_eq!(CacheState::classify(ms(1000), ttl, swr), CacheState::Fresh);
        assert_eq!(CacheState::classify(ms(1001), ttl, swr), CacheState::Stale);
        assert_eq!(CacheState::classify(ms(1500), ttl, swr), CacheState::Stale);
        assert_eq!(CacheState::classify(ms(1501), ttl, swr), CacheState::Miss);
        assert_eq!(
            CacheState::classify(ms(1001), ttl, Duration::ZERO),
            CacheState::Miss
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_follows_ttl_without_stale_window() {
        let cache = TestCache::new(ms(1000), Duration::ZERO);
        cache.set(key("k"), "v1".to_string());

        advance(ms(500)).await;
        let lookup = cache.get(&key("k"));
        assert_eq!(lookup.state, CacheState::Fresh);
        assert_eq!(lookup.entry.unwrap().data, "v1");

        advance(ms(1000)).await;
        let lookup = cache.get(&key("k"));
        assert_eq!(lookup.state, CacheState::Miss);
        assert!(lookup.entry.is_none());

        cache.set(key("k"), "v2".to_string());
        cache.invalidate(&key("k"));
        assert_eq!(cache.get(&key("k")).state, CacheState::Miss);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_reports_stale_inside_window() {
        let cache = TestCache::new(ms(1000), ms(500));
        cache.set(key("k"), "v1".to_string());

        advance(ms(1200)).await;
        let lookup = cache.get(&key("k"));
        assert_eq!(lookup.state, CacheState::Stale);
        assert_eq!(lookup.entry.unwrap().data, "v1");

        advance(ms(400)).await;
        assert_eq!(cache.get(&key("k")).state, CacheState::Miss);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_never_calls_fetcher() {
        let cache = TestCache::new(ms(1000), ms(1000));
        let calls = Arc::new(AtomicUsize::new(0));
        cache.set(key("k"), "cached".to_string());

        let fetched = cache
            .fetch(key("k"), counting_fetcher(&calls, ms(0), Ok("new")), FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(fetched.data, "cached");
        assert_eq!(fetched.state, CacheState::Fresh);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_fetch() {
        let cache = TestCache::new(ms(1000), Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));

        let requests = (0..10).map(|_| {
            cache.fetch(
                key("k"),
                counting_fetcher(&calls, ms(50), Ok("value")),
                FetchOptions::default(),
            )
        });
        let results = join_all(requests).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            let fetched = result.unwrap();
            assert_eq!(fetched.data, "value");
            assert_eq!(fetched.state, CacheState::Miss);
        }
        assert_eq!(cache.get(&key("k")).state, CacheState::Fresh);
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_rejection() {
        let cache = TestCache::new(ms(1000), Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));

        let requests = (0..5).map(|_| {
            cache.fetch(
                key("k"),
                counting_fetcher(&calls, ms(20), Err("upstream down")),
                FetchOptions::default(),
            )
        });
        let results = join_all(requests).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap_err(), "upstream down");
        }
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_served_and_refreshed_once() {
        let cache = TestCache::new(ms(1000), ms(5000));
        let calls = Arc::new(AtomicUsize::new(0));
        cache.set(key("k"), "old".to_string());
        advance(ms(1500)).await;

        let first = cache
            .fetch(key("k"), counting_fetcher(&calls, ms(100), Ok("new")), FetchOptions::default())
            .await
            .unwrap();
        let second = cache
            .fetch(key("k"), counting_fetcher(&calls, ms(100), Ok("newer")), FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(first.data, "old");
        assert_eq!(first.state, CacheState::Stale);
        assert_eq!(second.data, "old");
        assert!(cache.get(&key("k")).entry.unwrap().is_revalidating);

        sleep(ms(200)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let lookup = cache.get(&key("k"));
        assert_eq!(lookup.state, CacheState::Fresh);
        let entry = lookup.entry.unwrap();
        assert_eq!(entry.data, "new");
        assert!(!entry.is_revalidating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_failure_keeps_stale_entry() {
        let cache = TestCache::new(ms(1000), ms(5000));
        let calls = Arc::new(AtomicUsize::new(0));
        cache.set(key("k"), "old".to_string());
        advance(ms(1500)).await;

        let fetched = cache
            .fetch(key("k"), counting_fetcher(&calls, ms(0), Err("boom")), FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(fetched.data, "old");

        settle().await;
        let lookup = cache.get(&key("k"));
        assert_eq!(lookup.state, CacheState::Stale);
        let entry = lookup.entry.unwrap();
        assert_eq!(entry.data, "old");
        assert!(!entry.is_revalidating);
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_refresh_always_fetches() {
        let cache = TestCache::new(ms(60_000), Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));
        cache.set(key("k"), "v1".to_string());

        let fetched = cache
            .fetch(
                key("k"),
                counting_fetcher(&calls, ms(10), Ok("v2")),
                FetchOptions { force_refresh: true },
            )
            .await
            .unwrap();

        assert_eq!(fetched.data, "v2");
        assert_eq!(fetched.state, CacheState::Miss);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(&key("k")).entry.unwrap().data, "v2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_refresh_joins_running_fetch() {
        let cache = TestCache::new(ms(1000), Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));

        let plain = cache.fetch(
            key("k"),
            counting_fetcher(&calls, ms(50), Ok("v")),
            FetchOptions::default(),
        );
        let forced = cache.fetch(
            key("k"),
            counting_fetcher(&calls, ms(50), Ok("forced")),
            FetchOptions { force_refresh: true },
        );
        let (plain, forced) = tokio::join!(plain, forced);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(plain.unwrap().data, "v");
        assert_eq!(forced.unwrap().data, "v");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_discards_running_fetch_result() {
        let cache = TestCache::new(ms(1000), Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));

        let request = cache.fetch(
            key("k"),
            counting_fetcher(&calls, ms(50), Ok("late")),
            FetchOptions::default(),
        );
        let invalidate = async {
            sleep(ms(10)).await;
            cache.invalidate(&key("k"));
        };
        let (result, _) = tokio::join!(request, invalidate);

        // The waiting caller still gets its value; the cache does not.
        assert_eq!(result.unwrap().data, "late");
        assert_eq!(cache.get(&key("k")).state, CacheState::Miss);
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_completes_when_caller_is_dropped() {
        let cache = TestCache::new(ms(1000), Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));

        let request = cache.fetch(
            key("k"),
            counting_fetcher(&calls, ms(50), Ok("v")),
            FetchOptions::default(),
        );
        let _ = tokio::time::timeout(ms(10), request).await;

        sleep(ms(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(&key("k")).entry.unwrap().data, "v");
    }

    #[tokio::test]
    async fn test_clear_drops_everything() {
        let cache = TestCache::new(ms(1000), Duration::ZERO);
        cache.set(key("a"), "1".to_string());
        cache.set(key("b"), "2".to_string());
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key("a")).state, CacheState::Miss);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_fetch_releases_key() {
        let cache = TestCache::new(ms(1000), Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));

        let err = cache
            .fetch(key("k"), || async { exploding_fetch() }, FetchOptions::default())
            .await
            .unwrap_err();
        assert!(err.contains("adapter bug"));
        assert_eq!(cache.in_flight_count(), 0);
        assert!(cache.is_empty());

        let fetched = cache
            .fetch(
                key("k"),
                counting_fetcher(&calls, ms(0), Ok("v")),
                FetchOptions { force_refresh: true },
            )
            .await
            .unwrap();
        assert_eq!(fetched.data, "v");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_pruned_on_write() {
        let cache = TestCache::new(ms(1000), ms(500));
        cache.set(key("old"), "1".to_string());
        cache.set(key("stale"), "2".to_string());
        advance(ms(1000)).await;
        cache.set(key("fresh"), "3".to_string());
        assert_eq!(cache.len(), 3);

        // "old" and "stale" are now past ttl + stale window
        advance(ms(600)).await;
        cache.set(key("new"), "4".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key("fresh")).state, CacheState::Fresh);
        assert_eq!(cache.get(&key("new")).state, CacheState::Fresh);
        assert_eq!(cache.get(&key("old")).state, CacheState::Miss);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_share_one_fetch_across_threads() {
        let cache = TestCache::new(ms(60_000), Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(tokio::sync::Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    cache
                        .fetch(
                            key("k"),
                            counting_fetcher(&calls, ms(50), Ok("value")),
                            FetchOptions::default(),
                        )
                        .await
                })
            })
            .collect();

        for handle in join_all(handles).await {
            assert_eq!(handle.unwrap().unwrap().data, "value");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight_count(), 0);
    }
}
