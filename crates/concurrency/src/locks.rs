//! Per-document write locks
//!
//! Writers to the same document id serialize on a mutex owned by the lock
//! table; writers to different ids never contend beyond the DashMap shard
//! lookup. An entry is removed as soon as its last holder releases it and
//! nobody else has cloned it, so the table stays proportional to the number
//! of documents being written right now rather than every id ever seen.

use dashmap::DashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::sync::Arc;
use tessera_core::DocId;

type Slot = Arc<Mutex<()>>;

/// Table of per-document mutexes
#[derive(Debug, Default)]
pub struct DocumentLocks {
    slots: DashMap<DocId, Slot>,
}

impl DocumentLocks {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until this thread holds the lock for `id`
    pub fn lock(&self, id: &DocId) -> DocLockGuard<'_> {
        // Clone the slot out before blocking so the shard lock is released.
        let slot: Slot = Arc::clone(self.slots.entry(id.clone()).or_default().value());
        let guard = slot.lock_arc();
        DocLockGuard {
            table: self,
            id: id.clone(),
            guard: Some(guard),
        }
    }

    /// Number of ids with a live lock slot
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if no lock slot is allocated
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn release(&self, id: &DocId) {
        // The map's own reference is the only one left when nobody is
        // holding or waiting on the slot.
        self.slots
            .remove_if(id, |_, slot| Arc::strong_count(slot) == 1);
    }
}

/// Exclusive hold on one document's write lock
pub struct DocLockGuard<'a> {
    table: &'a DocumentLocks,
    id: DocId,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl DocLockGuard<'_> {
    /// Locked document id
    pub fn id(&self) -> &DocId {
        &self.id
    }
}

impl Drop for DocLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.table.release(&self.id);
    }
}

impl std::fmt::Debug for DocLockGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocLockGuard").field("id", &self.id).finish()
    }
}
