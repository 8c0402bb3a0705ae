//! Weight-bounded LRU store with per-entry time-to-live.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use tokio::time::Instant;

use crate::flight::InFlight;
use crate::{CacheSettings, Cached};

/// Computes the weight of a value (usually its size in bytes).
type Weigher<V> = Arc<dyn Fn(&V) -> usize + Send + Sync>;

/// Get-or-compute cache bounded by aggregate weight and entry age.
///
/// Values are cloned out of the cache on every hit, so `V` is typically an
/// `Arc` or another cheaply clonable handle.
///
/// The invariant `total_weight <= max_weight` holds after every insert. An
/// entry whose own weight exceeds `max_weight` is returned to the caller but
/// never stored.
pub struct BoundedCache<V> {
    settings: CacheSettings,
    weigher: Weigher<V>,
    inner: Mutex<Inner<V>>,
    in_flight: InFlight,
}

struct Inner<V> {
    total_weight: usize,
    lru: LruCache<String, Entry<V>>,
}

struct Entry<V> {
    value: V,
    weight: usize,
    inserted_at: Instant,
}

impl<V: Clone> BoundedCache<V> {
    /// Create a cache with the given settings and weigher.
    pub fn new(
        settings: CacheSettings,
        weigher: impl Fn(&V) -> usize + Send + Sync + 'static,
    ) -> Self {
        Self {
            settings,
            weigher: Arc::new(weigher),
            inner: Mutex::new(Inner {
                total_weight: 0,
                lru: LruCache::unbounded(),
            }),
            in_flight: InFlight::default(),
        }
    }

    /// Settings this cache was created with.
    pub fn settings(&self) -> CacheSettings {
        self.settings
    }

    /// Return the live value for `key`, computing and storing it on a miss.
    ///
    /// - Disabled cache: `supplier` always runs and nothing is stored.
    /// - Live entry: returned with `fresh == false`; `supplier` does not run.
    /// - Miss: `supplier` runs; `Some` is stored (evicting LRU entries as
    ///   needed) and returned with `fresh == true`; `None` is not stored.
    ///
    /// While one caller computes a key, other callers for the same key wait
    /// and then re-check the cache instead of running their own supplier.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, supplier: F) -> Option<Cached<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<V>>,
    {
        if !self.settings.enabled {
            return supplier().await.map(Cached::fresh);
        }

        if let Some(value) = self.lookup(key) {
            return Some(Cached::hit(value));
        }

        let _claim = self.in_flight.claim(key).await;

        // Another caller may have stored the value while we waited.
        if let Some(value) = self.lookup(key) {
            return Some(Cached::hit(value));
        }

        let value = supplier().await?;
        self.insert(key, value.clone());
        Some(Cached::fresh(value))
    }

    /// Live value for `key`, if any. Expired entries are dropped.
    pub fn get(&self, key: &str) -> Option<V> {
        if !self.settings.enabled {
            return None;
        }
        self.lookup(key)
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn insert(&self, key: &str, value: V) {
        if !self.settings.enabled {
            return;
        }

        let weight = (self.weigher)(&value);
        let mut inner = self.lock();

        if let Some(prev) = inner.lru.pop(key) {
            inner.total_weight = inner.total_weight.saturating_sub(prev.weight);
        }

        if weight > self.settings.max_weight {
            tracing::debug!(
                key,
                weight,
                max_weight = self.settings.max_weight,
                "Item exceeds cache capacity, not storing"
            );
            return;
        }

        inner.lru.put(
            key.to_owned(),
            Entry {
                value,
                weight,
                inserted_at: Instant::now(),
            },
        );
        inner.total_weight = inner.total_weight.saturating_add(weight);

        while inner.total_weight > self.settings.max_weight {
            let Some((evicted_key, evicted)) = inner.lru.pop_lru() else {
                inner.total_weight = 0;
                break;
            };
            inner.total_weight = inner.total_weight.saturating_sub(evicted.weight);
            tracing::trace!(key = %evicted_key, weight = evicted.weight, "Evicted cache entry");
        }
    }

    /// Remove the entry for `key`.
    pub fn invalidate(&self, key: &str) {
        let mut inner = self.lock();
        if let Some(prev) = inner.lru.pop(key) {
            inner.total_weight = inner.total_weight.saturating_sub(prev.weight);
        }
    }

    /// Remove every entry whose key starts with `prefix`.
    ///
    /// Returns the number of removed entries.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.lock();
        let doomed: Vec<String> = inner
            .lru
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            if let Some(prev) = inner.lru.pop(key.as_str()) {
                inner.total_weight = inner.total_weight.saturating_sub(prev.weight);
            }
        }
        doomed.len()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.lru.clear();
        inner.total_weight = 0;
    }

    /// Number of stored entries, including ones that expired but were not
    /// looked up since.
    pub fn len(&self) -> usize {
        self.lock().lru.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the weights of all stored entries.
    pub fn weight(&self) -> usize {
        self.lock().total_weight
    }

    fn lookup(&self, key: &str) -> Option<V> {
        let mut inner = self.lock();
        let expired = match inner.lru.get(key) {
            None => return None,
            Some(entry) => entry.inserted_at.elapsed() >= self.settings.ttl,
        };
        if expired {
            if let Some(prev) = inner.lru.pop(key) {
                inner.total_weight = inner.total_weight.saturating_sub(prev.weight);
            }
            return None;
        }
        inner.lru.peek(key).map(|entry| entry.value.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    const TTL: Duration = Duration::from_secs(600);

    fn string_cache(max_weight: usize) -> BoundedCache<String> {
        BoundedCache::new(CacheSettings::new(max_weight, TTL), String::len)
    }

    async fn counted(
        cache: &BoundedCache<String>,
        key: &str,
        value: &str,
        calls: &AtomicUsize,
    ) -> Option<Cached<String>> {
        cache
            .get_or_compute(key, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Some(value.to_owned())
            })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_within_ttl_is_a_hit() {
        let cache = string_cache(1024);
        let calls = &AtomicUsize::new(0);

        let first = counted(&cache, "k", "v", calls).await.unwrap();
        let second = counted(&cache, "k", "v", calls).await.unwrap();

        assert!(first.fresh);
        assert!(!second.fresh);
        assert_eq!(second.value, "v");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_recomputed() {
        let cache = string_cache(1024);
        let calls = &AtomicUsize::new(0);

        counted(&cache, "k", "v", calls).await;
        tokio::time::advance(TTL).await;
        let again = counted(&cache, "k", "v", calls).await.unwrap();

        assert!(again.fresh);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_just_before_ttl_is_live() {
        let cache = string_cache(1024);
        let calls = &AtomicUsize::new(0);

        counted(&cache, "k", "v", calls).await;
        tokio::time::advance(TTL - Duration::from_millis(1)).await;
        counted(&cache, "k", "v", calls).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_none_is_not_cached() {
        let cache = string_cache(1024);
        let calls = &AtomicUsize::new(0);

        for _ in 0..2 {
            let result = cache
                .get_or_compute("missing", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    None
                })
                .await;
            assert!(result.is_none());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_cache_always_computes() {
        let cache: BoundedCache<String> = BoundedCache::new(CacheSettings::disabled(), String::len);
        let calls = &AtomicUsize::new(0);

        let first = counted(&cache, "k", "v", calls).await.unwrap();
        let second = counted(&cache, "k", "v", calls).await.unwrap();

        assert!(first.fresh);
        assert!(second.fresh);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test]
    async fn test_eviction_removes_least_recently_used_first() {
        let cache = string_cache(10);

        cache.insert("a", "aaaa".to_owned());
        cache.insert("b", "bbbb".to_owned());
        // Touch "a" so "b" becomes the least recently used entry
        assert_eq!(cache.get("a").as_deref(), Some("aaaa"));

        cache.insert("c", "cccc".to_owned());

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a").as_deref(), Some("aaaa"));
        assert_eq!(cache.get("c").as_deref(), Some("cccc"));
        assert_eq!(cache.weight(), 8);
    }

    #[tokio::test]
    async fn test_eviction_until_within_capacity() {
        let cache = string_cache(10);

        cache.insert("a", "aaa".to_owned());
        cache.insert("b", "bbb".to_owned());
        cache.insert("c", "ccc".to_owned());
        cache.insert("big", "bbbbbbbb".to_owned());

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), None);
        assert_eq!(cache.get("big").as_deref(), Some("bbbbbbbb"));
        assert!(cache.weight() <= 10);
    }

    #[tokio::test]
    async fn test_oversized_item_returned_but_not_stored() {
        let cache = string_cache(4);
        let calls = &AtomicUsize::new(0);

        let result = counted(&cache, "k", "too large", calls).await.unwrap();
        assert!(result.fresh);
        assert_eq!(result.value, "too large");
        assert!(cache.is_empty());
        assert_eq!(cache.weight(), 0);
    }

    #[tokio::test]
    async fn test_replacing_entry_updates_weight() {
        let cache = string_cache(100);
        cache.insert("k", "12345".to_owned());
        cache.insert("k", "12".to_owned());
        assert_eq!(cache.weight(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_prefix() {
        let cache = string_cache(100);
        cache.insert("/sites/a:default:home", "1".to_owned());
        cache.insert("/sites/a:default:about", "2".to_owned());
        cache.insert("/sites/b:default:home", "3".to_owned());

        assert_eq!(cache.invalidate_prefix("/sites/a:"), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.weight(), 1);

        cache.invalidate("/sites/b:default:home");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = string_cache(100);
        cache.insert("a", "1".to_owned());
        cache.insert("b", "2".to_owned());
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.weight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_run_supplier_once() {
        let cache = string_cache(1024);
        let calls = &AtomicUsize::new(0);

        let slow = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Some("computed".to_owned())
        };

        let (a, b) = tokio::join!(
            cache.get_or_compute("k", slow),
            cache.get_or_compute("k", slow)
        );

        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(a.fresh);
        assert!(!b.fresh);
        assert_eq!(b.value, "computed");
        assert_eq!(cache.in_flight.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_on_different_keys_run_independently() {
        let cache = string_cache(1024);
        let calls = &AtomicUsize::new(0);

        let (a, b) = tokio::join!(
            counted(&cache, "a", "1", calls),
            counted(&cache, "b", "2", calls)
        );

        assert!(a.unwrap().fresh);
        assert!(b.unwrap().fresh);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
