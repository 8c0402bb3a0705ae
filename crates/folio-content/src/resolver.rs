//! Cached access to collections, resources and search results.

use std::path::Path;
use std::sync::Arc;

use folio_cache::{BoundedCache, CacheSettings, Cached};

use crate::collection::ResourceCollection;
use crate::resource::Resource;
use crate::search::SearchOptions;

/// Shared search result list.
pub type SearchResults = Arc<[Arc<Resource>]>;

/// Construction parameters for [`ContentResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    /// Extension appended to logical paths without one.
    pub default_extension: String,
    pub resources: CacheSettings,
    pub collections: CacheSettings,
    pub search: CacheSettings,
}

impl ResolverSettings {
    /// Same settings with every cache switched on or off.
    #[must_use]
    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.resources = self.resources.with_enabled(enabled);
        self.collections = self.collections.with_enabled(enabled);
        self.search = self.search.with_enabled(enabled);
        self
    }
}

/// Entry point for reading content through the caches.
///
/// Cache keys start with the content root followed by `:`, which lets
/// [`ContentResolver::flush_root`] drop everything for one root.
pub struct ContentResolver {
    default_extension: String,
    collections: BoundedCache<Arc<ResourceCollection>>,
    resources: BoundedCache<Arc<Resource>>,
    searches: BoundedCache<SearchResults>,
}

impl ContentResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self {
            default_extension: settings.default_extension,
            collections: BoundedCache::new(settings.collections, |c: &Arc<ResourceCollection>| {
                c.weight()
            }),
            resources: BoundedCache::new(settings.resources, |r: &Arc<Resource>| r.size),
            searches: BoundedCache::new(settings.search, |results: &SearchResults| {
                results.iter().map(|r| r.size).sum()
            }),
        }
    }

    /// The collection for `root` as seen by `access_token`.
    ///
    /// Opening a collection loads its policy, so a cached collection keeps
    /// the policy it was opened with until it expires or is flushed.
    pub async fn collection(
        &self,
        root: &Path,
        access_token: &str,
    ) -> Cached<Arc<ResourceCollection>> {
        let key = format!("{}:{access_token}", root.display());
        let cached = self
            .collections
            .get_or_compute(&key, || async move {
                Some(self.open_collection(root, access_token).await)
            })
            .await;

        match cached {
            Some(cached) => cached,
            // The supplier never yields `None`.
            None => Cached {
                value: self.open_collection(root, access_token).await,
                fresh: true,
            },
        }
    }

    async fn open_collection(&self, root: &Path, access_token: &str) -> Arc<ResourceCollection> {
        let collection =
            ResourceCollection::open(root, access_token, self.default_extension.as_str()).await;
        Arc::new(collection)
    }

    /// The resource at `logical_path`, if it exists and is visible.
    ///
    /// Keyed by root, policy scope and path, so tokens that share a scope share
    /// entries. Absent results are not cached.
    pub async fn resource(
        &self,
        collection: &ResourceCollection,
        logical_path: &str,
    ) -> Option<Cached<Arc<Resource>>> {
        let key = format!(
            "{}:{}:{logical_path}",
            collection.root().display(),
            collection.policy().scope.as_str()
        );
        self.resources
            .get_or_compute(&key, || async move {
                collection.get(logical_path).await.map(Arc::new)
            })
            .await
    }

    /// Search results for `query`, an opaque string that identifies the
    /// request (path plus query string).
    pub async fn search(
        &self,
        collection: &ResourceCollection,
        query: &str,
        search_path: &str,
        options: &SearchOptions,
    ) -> Cached<SearchResults> {
        let key = format!(
            "{}:{}:{query}",
            collection.root().display(),
            collection.access_token()
        );
        let cached = self
            .searches
            .get_or_compute(&key, || async move {
                Some(run_search(collection, search_path, options).await)
            })
            .await;

        match cached {
            Some(cached) => cached,
            // The supplier never yields `None`.
            None => Cached {
                value: run_search(collection, search_path, options).await,
                fresh: true,
            },
        }
    }

    /// Drop every cached entry belonging to the content root at `root`.
    ///
    /// Returns the number of removed entries.
    pub fn flush_root(&self, root: &Path) -> usize {
        let prefix = format!("{}:", root.display());
        let removed = self.collections.invalidate_prefix(&prefix)
            + self.resources.invalidate_prefix(&prefix)
            + self.searches.invalidate_prefix(&prefix);
        tracing::info!(root = %root.display(), removed, "Flushed content caches");
        removed
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.collections.clear();
        self.resources.clear();
        self.searches.clear();
    }
}

async fn run_search(
    collection: &ResourceCollection,
    search_path: &str,
    options: &SearchOptions,
) -> SearchResults {
    collection
        .search(search_path, options)
        .await
        .into_iter()
        .map(Arc::new)
        .collect()
}
