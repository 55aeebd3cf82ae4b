//! Per-document version chains
//!
//! Versions are stored newest first, so the common reads (latest state, or
//! newest state at or before a snapshot sequence) stop at the first match.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::record::DocumentRecord;

/// MVCC history of one document id
///
/// Uses VecDeque for O(1) push_front; documents updated in a tight loop
/// (the update race) append on every round.
#[derive(Debug, Clone)]
pub struct VersionChain {
    versions: VecDeque<Arc<DocumentRecord>>,
}

impl VersionChain {
    /// Create a chain with a single version
    pub fn new(record: Arc<DocumentRecord>) -> Self {
        let mut versions = VecDeque::with_capacity(4);
        versions.push_front(record);
        Self { versions }
    }

    /// Add a new version (must be newer than every existing version)
    #[inline]
    pub fn push(&mut self, record: Arc<DocumentRecord>) {
        debug_assert!(self
            .latest()
            .map_or(true, |cur| cur.sequence() < record.sequence()));
        self.versions.push_front(record);
    }

    /// Newest version
    #[inline]
    pub fn latest(&self) -> Option<&Arc<DocumentRecord>> {
        self.versions.front()
    }

    /// Newest version committed at or before `sequence`
    pub fn at(&self, sequence: u64) -> Option<&Arc<DocumentRecord>> {
        self.versions.iter().find(|r| r.sequence() <= sequence)
    }

    /// Drop versions no reader at `min_active` or later can observe
    ///
    /// Keeps every version newer than `min_active` plus the newest version
    /// at or before it. Returns the number of versions dropped.
    pub fn gc(&mut self, min_active: u64) -> usize {
        let keep = match self.versions.iter().position(|r| r.sequence() <= min_active) {
            Some(pos) => pos + 1,
            None => return 0,
        };
        let dropped = self.versions.len() - keep;
        self.versions.truncate(keep);
        dropped
    }

    /// True when the chain holds only a purge marker no reader can see past
    pub fn is_reclaimable(&self, min_active: u64) -> bool {
        self.versions.len() == 1
            && self
                .latest()
                .map_or(true, |r| r.is_purged() && r.sequence() <= min_active)
    }

    /// Number of versions stored
    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    /// Versions newest first
    pub fn history(&self) -> impl Iterator<Item = &Arc<DocumentRecord>> {
        self.versions.iter()
    }
}
