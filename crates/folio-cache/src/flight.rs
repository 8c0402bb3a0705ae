//! Per-key guards that let a single caller compute a missing entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of keys whose value is currently being computed.
#[derive(Default)]
pub(crate) struct InFlight {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl InFlight {
    /// Wait until no other caller is computing `key`, then claim it.
    ///
    /// The returned guard releases the claim when dropped.
    pub(crate) async fn claim<'a>(&'a self, key: &str) -> FlightGuard<'a> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.to_owned()).or_default())
        };
        let permit = Arc::clone(&lock).lock_owned().await;
        FlightGuard {
            registry: self,
            key: key.to_owned(),
            lock,
            permit: Some(permit),
        }
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Claim on a key; dropping it wakes the next waiter or forgets the key.
pub(crate) struct FlightGuard<'a> {
    registry: &'a InFlight,
    key: String,
    lock: Arc<AsyncMutex<()>>,
    permit: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        // Release the permit first so its Arc clone no longer counts.
        self.permit.take();

        let mut locks = self
            .registry
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Clones are only taken under `locks`, so a count of two (map + self)
        // means nobody is waiting on this key.
        if let Some(current) = locks.get(&self.key)
            && Arc::ptr_eq(current, &self.lock)
            && Arc::strong_count(&self.lock) <= 2
        {
            locks.remove(&self.key);
        }
    }
}
