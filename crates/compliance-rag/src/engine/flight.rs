//! Per-cache-key generation slots
//!
//! Concurrent misses on the same cache key queue behind one slot. The first
//! caller generates; the others re-check the cache once they get the slot.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::cache::CacheKey;

#[derive(Default)]
pub(crate) struct GenerationSlots {
    slots: Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>,
}

impl GenerationSlots {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of the slot for `key`
    pub(crate) async fn acquire(&self, key: &CacheKey) -> SlotGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        // built before waiting so a cancelled wait still releases the slot
        let mut held = SlotGuard {
            owner: self,
            key: key.clone(),
            slot,
            guard: None,
        };
        held.guard = Some(Arc::clone(&held.slot).lock_owned().await);
        held
    }

    /// Keys with a caller holding or waiting on their slot
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.lock().len()
    }

    fn release(&self, key: &CacheKey, slot: &Arc<AsyncMutex<()>>) {
        let mut slots = self.slots.lock();
        // map entry plus ours: nobody else is waiting
        if Arc::strong_count(slot) <= 2 {
            if let Some(current) = slots.get(key) {
                if Arc::ptr_eq(current, slot) {
                    slots.remove(key);
                }
            }
        }
    }
}

/// Held for the duration of one generation attempt
pub(crate) struct SlotGuard<'a> {
    owner: &'a GenerationSlots,
    key: CacheKey,
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        // unlock first so the owned guard no longer counts as a holder
        self.guard.take();
        self.owner.release(&self.key, &self.slot);
    }
}
