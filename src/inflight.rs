//! Per-key single-flight locks.
//!
//! [`InFlight::acquire`] hands out an owned guard on an async mutex shared by
//! every caller using the same key. The map holds only `Weak` references, so
//! a key's entry goes stale once its last guard is dropped and the next
//! `acquire` prunes it.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held for the duration of one computation for a key.
pub struct InFlightGuard {
    _guard: OwnedMutexGuard<()>,
}

#[derive(Default)]
pub struct InFlight {
    locks: DashMap<String, Weak<AsyncMutex<()>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        self.locks.retain(|_, weak| weak.strong_count() > 0);
        let mut entry = self.locks.entry(key.to_string()).or_default();
        if let Some(existing) = entry.upgrade() {
            return existing;
        }
        let lock = Arc::new(AsyncMutex::new(()));
        *entry = Arc::downgrade(&lock);
        lock
    }

    /// Wait until no other caller holds `key`, then hold it.
    pub async fn acquire(&self, key: &str) -> InFlightGuard {
        let lock = self.lock_for(key);
        InFlightGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Keys with a live holder or waiter.
    pub fn tracked(&self) -> usize {
        self.locks
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }
}
