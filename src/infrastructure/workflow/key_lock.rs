//! Per-key async locks

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serializes operations per key while different keys proceed in parallel
///
/// Entries are dropped once no holder or waiter is left.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<K, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dropping the returned future while it waits still prunes the entry
    pub async fn lock(&self, key: &K) -> KeyGuard<'_, K> {
        // Must be declared before the lock future so it is dropped after it
        let mut held = KeyGuard {
            owner: self,
            key: key.clone(),
            guard: None,
        };

        let lock = Arc::clone(self.map().entry(key.clone()).or_default());
        held.guard = Some(lock.lock_owned().await);
        held
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct KeyGuard<'a, K>
where
    K: Clone + Eq + Hash,
{
    owner: &'a KeyedLocks<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K> Drop for KeyGuard<'_, K>
where
    K: Clone + Eq + Hash,
{
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut map = self.owner.map();
        if map
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.key);
        }
    }
}
