//! Point-in-time views of the document store
//!
//! A [`StoreSnapshot`] captures the published commit sequence and registers
//! it with the store's [`SnapshotRegistry`]. While registered, garbage
//! collection keeps every version the snapshot can observe. Dropping the
//! snapshot releases the pin.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tessera_core::{DocId, Document};

use crate::record::DocumentRecord;
use crate::store::DocumentStore;

/// Multiset of sequences pinned by live snapshots
#[derive(Debug, Default)]
pub struct SnapshotRegistry {
    active: Mutex<BTreeMap<u64, usize>>,
}

impl SnapshotRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the current value of `published` and return it
    ///
    /// The load happens under the registry lock so that a concurrent
    /// [`SnapshotRegistry::horizon`] either sees the pin or computes a
    /// horizon no newer than the pinned sequence.
    pub(crate) fn pin(&self, published: &AtomicU64) -> u64 {
        let mut active = self.active.lock();
        let sequence = published.load(Ordering::Acquire);
        *active.entry(sequence).or_insert(0) += 1;
        sequence
    }

    pub(crate) fn unpin(&self, sequence: u64) {
        let mut active = self.active.lock();
        if let Some(count) = active.get_mut(&sequence) {
            *count -= 1;
            if *count == 0 {
                active.remove(&sequence);
            }
        }
    }

    /// Oldest sequence any reader may still observe
    pub(crate) fn horizon(&self, published: &AtomicU64) -> u64 {
        let active = self.active.lock();
        let current = published.load(Ordering::Acquire);
        active.keys().next().copied().map_or(current, |oldest| oldest.min(current))
    }

    /// Number of live snapshots
    pub fn active_count(&self) -> usize {
        self.active.lock().values().sum()
    }
}

/// Consistent view of the store at one commit sequence
pub struct StoreSnapshot {
    sequence: u64,
    store: Arc<DocumentStore>,
}

impl StoreSnapshot {
    pub(crate) fn new(sequence: u64, store: Arc<DocumentStore>) -> Self {
        StoreSnapshot { sequence, store }
    }

    /// Commit sequence this snapshot observes
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Live record as of the snapshot
    pub fn live_record(&self, id: &DocId) -> Option<Arc<DocumentRecord>> {
        self.store
            .record_at(id, self.sequence)
            .filter(|r| r.is_live())
    }

    /// Live document as of the snapshot
    pub fn get(&self, id: &DocId) -> Option<Document> {
        self.live_record(id).and_then(|r| r.to_document(id))
    }

    /// Every live record visible at the snapshot, in lineage creation order
    pub fn live_records(&self) -> Vec<(DocId, Arc<DocumentRecord>)> {
        self.store.live_records_at(self.sequence)
    }
}

impl Drop for StoreSnapshot {
    fn drop(&mut self) {
        self.store.registry().unpin(self.sequence);
    }
}

impl std::fmt::Debug for StoreSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSnapshot")
            .field("sequence", &self.sequence)
            .finish()
    }
}
