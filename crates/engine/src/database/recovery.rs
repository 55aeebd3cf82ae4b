//! Journal replay
//!
//! Rebuilds a store from the records `WalReader` recovered. Revisions,
//! tombstones, purges and lineage starts all come from the records, so a
//! reopened database continues every document's revision history and the
//! global sequence exactly where the journal ends.
//!
//! A journal whose append reported failure after its bytes landed leaves a
//! record the database never committed. The engine hands that sequence to
//! the next commit, so when two adjacent records share a sequence the later
//! one is the commit and the earlier one is dropped.

use std::sync::Arc;
use tessera_core::{TesseraError, TesseraResult};
use tessera_durability::WalRecord;
use tessera_storage::{DocumentRecord, DocumentStore};
use tracing::warn;

/// What replay applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RecoveryStats {
    pub saves: u64,
    pub deletes: u64,
    pub purges: u64,
    /// Records replaced by a later record with the same sequence
    pub superseded: u64,
    pub last_sequence: u64,
}

impl RecoveryStats {
    pub(crate) fn records(&self) -> u64 {
        self.saves + self.deletes + self.purges
    }
}

/// Apply `records` to an empty `store` in journal order
///
/// Fails if sequences go backwards; such a journal was not written by a
/// database.
pub(crate) fn replay(store: &DocumentStore, records: Vec<WalRecord>) -> TesseraResult<RecoveryStats> {
    let mut stats = RecoveryStats::default();
    let mut pending: Option<WalRecord> = None;
    for record in records {
        let sequence = record.sequence();
        match pending.take() {
            Some(aborted) if aborted.sequence() == sequence => {
                stats.superseded += 1;
                warn!(
                    target: "tessera::db",
                    sequence,
                    "dropping journal record of an aborted commit"
                );
            }
            Some(previous) => apply(store, previous, &mut stats),
            None => {}
        }
        if sequence <= stats.last_sequence {
            return Err(TesseraError::storage(format!(
                "journal sequence {} follows {}",
                sequence, stats.last_sequence
            )));
        }
        pending = Some(record);
    }
    if let Some(last) = pending {
        apply(store, last, &mut stats);
    }
    Ok(stats)
}

fn apply(store: &DocumentStore, record: WalRecord, stats: &mut RecoveryStats) {
    let sequence = record.sequence();
    let (id, stored) = match record {
        WalRecord::Save {
            sequence,
            id,
            revision,
            lineage_start,
            body,
        } => {
            stats.saves += 1;
            (
                id,
                DocumentRecord::live(revision, Arc::new(body), sequence, lineage_start),
            )
        }
        WalRecord::Delete {
            sequence,
            id,
            revision,
            lineage_start,
        } => {
            stats.deletes += 1;
            (id, DocumentRecord::tombstone(revision, sequence, lineage_start))
        }
        WalRecord::Purge { sequence, id, last } => {
            stats.purges += 1;
            (id, DocumentRecord::purged(last, sequence))
        }
    };
    store.apply(id, stored);
    stats.last_sequence = sequence;
}
