//! Per-resource locks
//!
//! Mutations that touch one machine's resource graph (disk attach, detach,
//! create-and-attach, and the machine read used as a barrier) must not
//! interleave, since the G8 does not serialize them itself. The registry
//! hands out one async mutex per resource id and forgets the entry once no
//! caller holds or waits for it.
//!
//! Locks are local to the process; separate provider processes are not
//! coordinated.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Registry = Arc<Mutex<HashMap<i64, LockEntry>>>;

struct LockEntry {
    lock: Arc<AsyncMutex<()>>,
    refs: usize,
}

/// Registry of per-resource mutexes
#[derive(Clone, Default)]
pub struct ResourceLocks {
    entries: Registry,
}

/// RAII guard for a resource lock
///
/// Field order matters: the mutex guard is released before the registry
/// reference is dropped.
pub struct ResourceGuard {
    _guard: OwnedMutexGuard<()>,
    _lease: Lease,
}

/// Registry reference held by a waiter or a guard
struct Lease {
    entries: Registry,
    id: i64,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`
    ///
    /// Dropping the returned guard releases the lock. Dropping the future
    /// while it waits gives up the registry reference as well.
    pub async fn acquire(&self, id: i64) -> ResourceGuard {
        let (lock, lease) = {
            let mut entries = self.registry();
            let entry = entries.entry(id).or_insert_with(|| LockEntry {
                lock: Arc::new(AsyncMutex::new(())),
                refs: 0,
            });
            entry.refs += 1;
            (
                Arc::clone(&entry.lock),
                Lease {
                    entries: Arc::clone(&self.entries),
                    id,
                },
            )
        };

        tracing::debug!("Waiting for lock on resource {}", id);
        let guard = lock.lock_owned().await;
        tracing::debug!("Acquired lock on resource {}", id);

        ResourceGuard {
            _guard: guard,
            _lease: lease,
        }
    }

    /// Number of resource ids with a live entry
    pub fn tracked(&self) -> usize {
        self.registry().len()
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<i64, LockEntry>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(&self.id) {
            entry.refs -= 1;
            if entry.refs == 0 {
                entries.remove(&self.id);
                tracing::debug!("Released lock on resource {}", self.id);
            }
        }
    }
}

impl std::fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("id", &self._lease.id)
            .finish()
    }
}

impl std::fmt::Debug for ResourceLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLocks")
            .field("tracked", &self.tracked())
            .finish()
    }
}
