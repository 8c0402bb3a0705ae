//! Weighted in-memory cache for Folio.
//!
//! [`BoundedCache`] is a get-or-compute store keyed by an opaque string. Each
//! entry carries a weight computed by a caller-supplied weigher (usually the
//! byte size of the cached item), and the cache keeps the sum of weights under
//! a configured ceiling by evicting least-recently-used entries. Entries older
//! than the configured time-to-live are treated as absent.
//!
//! Concurrent misses on the same key are coalesced: only the first caller runs
//! the supplier, later callers wait for it and then read the stored value.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use folio_cache::{BoundedCache, CacheSettings};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
//! # rt.block_on(async {
//! let settings = CacheSettings::new(1024, Duration::from_secs(60));
//! let cache = BoundedCache::new(settings, |s: &String| s.len());
//!
//! let first = cache
//!     .get_or_compute("greeting", || async { Some("hello".to_owned()) })
//!     .await
//!     .unwrap();
//! assert!(first.fresh);
//!
//! let second = cache
//!     .get_or_compute("greeting", || async { Some("ignored".to_owned()) })
//!     .await
//!     .unwrap();
//! assert!(!second.fresh);
//! assert_eq!(second.value, "hello");
//! # });
//! ```

mod bounded;
mod flight;

use std::time::Duration;

pub use bounded::BoundedCache;

/// Capacity, lifetime, and on/off switch of one cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// When false every lookup runs the supplier and nothing is stored.
    pub enabled: bool,
    /// Ceiling for the sum of entry weights.
    pub max_weight: usize,
    /// Time after insertion at which an entry expires.
    pub ttl: Duration,
}

impl CacheSettings {
    /// Enabled cache with the given capacity and time-to-live.
    #[must_use]
    pub fn new(max_weight: usize, ttl: Duration) -> Self {
        Self {
            enabled: true,
            max_weight,
            ttl,
        }
    }

    /// Cache that never stores anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_weight: 0,
            ttl: Duration::ZERO,
        }
    }

    /// Same settings with the enabled flag replaced.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// A value returned by [`BoundedCache::get_or_compute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached<V> {
    /// The cached or freshly computed value.
    pub value: V,
    /// True when the supplier produced the value during this call.
    pub fresh: bool,
}

impl<V> Cached<V> {
    pub(crate) fn fresh(value: V) -> Self {
        Self { value, fresh: true }
    }

    pub(crate) fn hit(value: V) -> Self {
        Self {
            value,
            fresh: false,
        }
    }
}
