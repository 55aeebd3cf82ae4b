//! Revision ledger
//!
//! The ledger decides whether a write may proceed and which generation it
//! produces. A caller takes a [`LedgerGuard`] for the document, reads the
//! current [`Lineage`] from storage, and asks the guard to
//! [`allocate`](LedgerGuard::allocate). The guard holds the document's write
//! lock until it is dropped, which the caller does only after the write has
//! been applied. Check, allocate and commit are therefore indivisible for
//! one document.
//!
//! ## Concurrency control
//!
//! | Policy | Check |
//! |--------|-------|
//! | `LastWriteWins` | always passes |
//! | `FailOnConflict` | expected revision must equal the current one |
//!
//! Under `FailOnConflict`, an expected revision of `None` means "I believe
//! there is no live document": it matches an absent id and a tombstone.

use tessera_core::{DocId, Revision, TesseraError};
use thiserror::Error;
use tracing::warn;

use crate::locks::{DocLockGuard, DocumentLocks};

/// How a write treats a stale base revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrencyControl {
    /// The write always applies on top of whatever is current
    #[default]
    LastWriteWins,
    /// The write fails if the current revision differs from the expected one
    FailOnConflict,
}

/// Current state of a document's lineage, as seen under its write lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lineage {
    /// Never written, or purged
    Absent,
    /// Live at this revision
    Live(Revision),
    /// Tombstoned at this revision
    Tombstoned(Revision),
}

impl Lineage {
    /// Current revision, if the lineage exists
    pub fn revision(&self) -> Option<Revision> {
        match self {
            Lineage::Absent => None,
            Lineage::Live(r) | Lineage::Tombstoned(r) => Some(*r),
        }
    }

    /// True for a live document
    pub fn is_live(&self) -> bool {
        matches!(self, Lineage::Live(_))
    }

    /// Generation the next write produces
    pub fn next_generation(&self) -> u64 {
        self.revision().map_or(1, |r| r.generation() + 1)
    }
}

/// Expected revision did not match the current one
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("revision conflict on {id}")]
pub struct LedgerConflict {
    /// Document being written
    pub id: DocId,
    /// Revision the caller based the write on
    pub expected: Option<Revision>,
    /// Current revision
    pub actual: Option<Revision>,
}

impl From<LedgerConflict> for TesseraError {
    fn from(c: LedgerConflict) -> Self {
        TesseraError::conflict(c.id, c.expected, c.actual)
    }
}

/// Per-document revision authority
#[derive(Debug, Default)]
pub struct RevisionLedger {
    locks: DocumentLocks,
}

impl RevisionLedger {
    /// Create a ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the write lock for `id`
    pub fn begin(&self, id: &DocId) -> LedgerGuard<'_> {
        LedgerGuard {
            lock: self.locks.lock(id),
        }
    }

    /// Number of documents currently locked or awaited
    pub fn locked_count(&self) -> usize {
        self.locks.len()
    }
}

/// Write lock on one document plus the right to allocate its next revision
#[derive(Debug)]
pub struct LedgerGuard<'a> {
    lock: DocLockGuard<'a>,
}

impl LedgerGuard<'_> {
    /// Locked document id
    pub fn id(&self) -> &DocId {
        self.lock.id()
    }

    /// Check `expected` against `current` and return the next generation
    pub fn allocate(
        &self,
        current: Lineage,
        expected: Option<Revision>,
        control: ConcurrencyControl,
    ) -> Result<u64, LedgerConflict> {
        if control == ConcurrencyControl::FailOnConflict {
            let matches = match expected {
                None => !current.is_live(),
                Some(rev) => current.revision() == Some(rev),
            };
            if !matches {
                warn!(
                    target: "tessera::txn",
                    id = %self.id(),
                    expected = ?expected,
                    actual = ?current.revision(),
                    "revision conflict"
                );
                return Err(LedgerConflict {
                    id: self.id().clone(),
                    expected,
                    actual: current.revision(),
                });
            }
        }
        Ok(current.next_generation())
    }
}
