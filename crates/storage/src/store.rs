//! Sharded MVCC document store
//!
//! # Design
//!
//! - DashMap keyed by document id: sharded writes, reads take a shard read
//!   lock only long enough to clone an `Arc`
//! - FxHash for fast non-crypto hashing of ids
//! - `published`: highest commit sequence whose record has been applied;
//!   snapshots capture it
//! - `live`: exact number of live documents, adjusted on every apply
//!
//! # Apply Ordering
//!
//! Callers apply records in strictly increasing sequence order (the engine
//! holds its commit lock across journal append and apply). Because
//! `published` only advances after a record is in its chain, every record
//! with `sequence <= published` is already visible to readers.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tessera_core::{DocId, Document};
use tracing::debug;

use crate::chain::VersionChain;
use crate::record::DocumentRecord;
use crate::snapshot::{SnapshotRegistry, StoreSnapshot};

type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Effect of applying one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedChange {
    /// Sequence of the applied record
    pub sequence: u64,
    /// Whether the id held a live document before
    pub live_before: bool,
    /// Whether the id holds a live document after
    pub live_after: bool,
}

/// In-memory document store
pub struct DocumentStore {
    chains: DashMap<DocId, VersionChain, FxBuildHasher>,
    published: AtomicU64,
    live: AtomicUsize,
    registry: SnapshotRegistry,
}

impl DocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            chains: DashMap::with_hasher(FxBuildHasher::default()),
            published: AtomicU64::new(0),
            live: AtomicUsize::new(0),
            registry: SnapshotRegistry::new(),
        }
    }

    /// Highest applied commit sequence
    #[inline]
    pub fn published_sequence(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    /// Number of live documents
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Number of ids with a chain (live, tombstoned or awaiting reclaim)
    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    /// Snapshot registry backing this store
    pub fn registry(&self) -> &SnapshotRegistry {
        &self.registry
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Newest record for `id`, whatever its state
    pub fn latest(&self, id: &DocId) -> Option<Arc<DocumentRecord>> {
        self.chains
            .get(id)
            .and_then(|chain| chain.latest().map(Arc::clone))
    }

    /// Newest record for `id` committed at or before `sequence`
    pub fn record_at(&self, id: &DocId, sequence: u64) -> Option<Arc<DocumentRecord>> {
        self.chains
            .get(id)
            .and_then(|chain| chain.at(sequence).map(Arc::clone))
    }

    /// Latest live document
    pub fn get(&self, id: &DocId) -> Option<Document> {
        self.latest(id)
            .filter(|r| r.is_live())
            .and_then(|r| r.to_document(id))
    }

    /// Live records visible at `sequence`, ordered by lineage creation
    pub fn live_records_at(&self, sequence: u64) -> Vec<(DocId, Arc<DocumentRecord>)> {
        let mut rows: Vec<(DocId, Arc<DocumentRecord>)> = self
            .chains
            .iter()
            .filter_map(|entry| {
                entry
                    .value()
                    .at(sequence)
                    .filter(|r| r.is_live())
                    .map(|r| (entry.key().clone(), Arc::clone(r)))
            })
            .collect();
        rows.sort_by_key(|(_, r)| r.lineage_start());
        rows
    }

    /// Pin the published sequence and return a view of it
    pub fn snapshot(self: &Arc<Self>) -> StoreSnapshot {
        let sequence = self.registry.pin(&self.published);
        StoreSnapshot::new(sequence, Arc::clone(self))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Append a committed record and publish its sequence
    ///
    /// Must be called in increasing sequence order.
    pub fn apply(&self, id: DocId, record: DocumentRecord) -> AppliedChange {
        let sequence = record.sequence();
        let record = Arc::new(record);
        let live_after = record.is_live();

        let live_before = match self.chains.entry(id) {
            Entry::Occupied(mut e) => {
                let before = e.get().latest().map_or(false, |r| r.is_live());
                e.get_mut().push(record);
                before
            }
            Entry::Vacant(e) => {
                e.insert(VersionChain::new(record));
                false
            }
        };

        match (live_before, live_after) {
            (false, true) => {
                self.live.fetch_add(1, Ordering::AcqRel);
            }
            (true, false) => {
                self.live.fetch_sub(1, Ordering::AcqRel);
            }
            _ => {}
        }

        self.published.fetch_max(sequence, Ordering::AcqRel);

        AppliedChange {
            sequence,
            live_before,
            live_after,
        }
    }

    /// Reclaim versions and purged ids no reader can observe
    ///
    /// Returns the number of versions dropped.
    pub fn gc(&self) -> usize {
        let horizon = self.registry.horizon(&self.published);
        let mut dropped = 0;
        for mut chain in self.chains.iter_mut() {
            dropped += chain.value_mut().gc(horizon);
        }
        let before = self.chains.len();
        self.chains.retain(|_, chain| !chain.is_reclaimable(horizon));
        let reclaimed = before.saturating_sub(self.chains.len());

        if dropped > 0 || reclaimed > 0 {
            debug!(
                target: "tessera::storage",
                horizon,
                dropped,
                reclaimed,
                "version chains collected"
            );
        }
        dropped + reclaimed
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("published", &self.published_sequence())
            .field("live", &self.live_count())
            .field("chains", &self.chain_count())
            .finish()
    }
}
