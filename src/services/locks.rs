//! Per-key async mutexes.
//!
//! Cart mutations are serialized per session and order transitions per
//! order id, so read-modify-write cycles on the same key never interleave.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self { Self { slots: Mutex::new(HashMap::new()) } }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self { Self::default() }

    /// Waits for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // a slot referenced only by the map is neither held nor awaited
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        slot.lock_owned().await
    }

    pub fn len(&self) -> usize { self.slots.lock().unwrap_or_else(PoisonError::into_inner).len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}
