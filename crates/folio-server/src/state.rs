//! Application state.
//!
//! Shared state for all request handlers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use folio_content::ContentResolver;
use folio_sync::SyncEngine;

use crate::ServerConfig;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Cached collections, resources and searches.
    pub(crate) resolver: ContentResolver,
    /// Content root template (`%h`, `%t`, `%p`).
    pub(crate) content_path: String,
    /// Honor `X-Forwarded-Host` for `%h`.
    pub(crate) trust_proxy: bool,
    /// Sync support (if enabled).
    pub(crate) sync: Option<SyncService>,
}

impl AppState {
    pub(crate) fn new(config: &ServerConfig) -> Self {
        Self {
            resolver: ContentResolver::new(config.resolver.clone()),
            content_path: config.content_path.clone(),
            trust_proxy: config.trust_proxy,
            sync: config.sync_enabled.then(SyncService::default),
        }
    }

    pub(crate) fn uses_path_prefix(&self) -> bool {
        self.content_path.contains("%p")
    }
}

/// Sync engine plus one lock per content root, so two syncs of the same
/// root never overlap.
#[derive(Default)]
pub(crate) struct SyncService {
    pub(crate) engine: SyncEngine,
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl SyncService {
    /// The lock guarding syncs of `root`.
    pub(crate) fn lock_for(&self, root: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(root.to_path_buf()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_for_is_shared_per_root() {
        let sync = SyncService::default();

        let a = sync.lock_for(Path::new("/srv/a"));
        let again = sync.lock_for(Path::new("/srv/a"));
        let b = sync.lock_for(Path::new("/srv/b"));

        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_sync_disabled_by_default() {
        let state = AppState::new(&ServerConfig::default());
        assert!(state.sync.is_none());
        assert!(!state.uses_path_prefix());
    }
}
