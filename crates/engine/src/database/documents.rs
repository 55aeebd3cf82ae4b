//! Document operations
//!
//! Every mutation takes the document's ledger lock, commits, releases the
//! lock and only then sweeps old versions and publishes its event, so
//! neither a slow listener nor a sweep holds a document lock.

use std::sync::Arc;
use tessera_concurrency::{ConcurrencyControl, LedgerConflict, Lineage};
use tessera_core::{
    Body, ChangeEvent, ChangeKind, DocId, Document, Revision, TesseraError, TesseraResult,
};
use tessera_durability::WalRecord;
use tessera_storage::{DocumentRecord, RecordState};
use tracing::{debug, error};

use super::Database;
use crate::query::{Query, QueryPlan, ResultSet};

/// A checked mutation waiting for its sequence
enum Mutation {
    Save {
        generation: u64,
        /// `None` starts a new lineage at the commit's own sequence
        lineage_start: Option<u64>,
        body: Arc<Body>,
        kind: ChangeKind,
    },
    Delete {
        generation: u64,
        lineage_start: u64,
    },
    Purge {
        last: Revision,
    },
}

impl Mutation {
    fn into_record(self, id: &DocId, sequence: u64) -> (DocumentRecord, ChangeEvent) {
        match self {
            Mutation::Save {
                generation,
                lineage_start,
                body,
                kind,
            } => {
                let revision = Revision::new(generation, sequence);
                let record = DocumentRecord::live(
                    revision,
                    body,
                    sequence,
                    lineage_start.unwrap_or(sequence),
                );
                (record, ChangeEvent::new(id.clone(), revision, kind, sequence))
            }
            Mutation::Delete {
                generation,
                lineage_start,
            } => {
                let revision = Revision::new(generation, sequence);
                (
                    DocumentRecord::tombstone(revision, sequence, lineage_start),
                    ChangeEvent::new(id.clone(), revision, ChangeKind::Deleted, sequence),
                )
            }
            Mutation::Purge { last } => (
                DocumentRecord::purged(last, sequence),
                ChangeEvent::new(id.clone(), last, ChangeKind::Purged, sequence),
            ),
        }
    }
}

/// A commit whose follow-up runs once the ledger guard is gone
struct Committed {
    event: ChangeEvent,
    /// A version sweep is due
    sweep: bool,
}

fn lineage_of(record: Option<&DocumentRecord>) -> Lineage {
    match record.map(DocumentRecord::state) {
        Some(RecordState::Live { revision, .. }) => Lineage::Live(*revision),
        Some(RecordState::Tombstone { revision }) => Lineage::Tombstoned(*revision),
        Some(RecordState::Purged { .. }) | None => Lineage::Absent,
    }
}

fn journal_entry(id: &DocId, record: &DocumentRecord) -> WalRecord {
    let sequence = record.sequence();
    match record.state() {
        RecordState::Live { revision, body } => WalRecord::Save {
            sequence,
            id: id.clone(),
            revision: *revision,
            lineage_start: record.lineage_start(),
            body: Body::clone(body),
        },
        RecordState::Tombstone { revision } => WalRecord::Delete {
            sequence,
            id: id.clone(),
            revision: *revision,
            lineage_start: record.lineage_start(),
        },
        RecordState::Purged { last } => WalRecord::Purge {
            sequence,
            id: id.clone(),
            last: *last,
        },
    }
}

fn require_id(doc: &Document) -> TesseraResult<&DocId> {
    match doc.id() {
        Some(id) if id.is_valid() => Ok(id),
        Some(_) => Err(TesseraError::invalid_input("document id must not be empty")),
        None => Err(TesseraError::invalid_input("document has no id")),
    }
}

impl Database {
    // ========================================================================
    // Writes
    // ========================================================================

    /// Save `doc` with last-writer-wins semantics
    ///
    /// Creates the document if it does not exist (generating an id if `doc`
    /// has none), otherwise writes a new revision. Returns the stored state.
    pub fn save(&self, doc: &Document) -> TesseraResult<Document> {
        self.save_with(doc, ConcurrencyControl::default())
    }

    /// Save `doc` under the given concurrency control
    ///
    /// With `FailOnConflict` the save fails with `Conflict` unless
    /// `doc.revision()` is the current revision (or `None` and no live
    /// document exists).
    pub fn save_with(&self, doc: &Document, control: ConcurrencyControl) -> TesseraResult<Document> {
        let _op = self.enter()?;
        let id = match doc.id() {
            Some(id) if !id.is_valid() => {
                return Err(TesseraError::invalid_input("document id must not be empty"))
            }
            Some(id) => id.clone(),
            None => DocId::generate(),
        };
        let body = Arc::clone(doc.body());

        let committed = {
            let guard = self.ledger.begin(&id);
            let current = self.store.latest(&id);
            let lineage = lineage_of(current.as_deref());
            let generation = guard
                .allocate(lineage, doc.revision(), control)
                .map_err(|c| self.conflict(c))?;
            let lineage_start = match lineage {
                Lineage::Absent => None,
                _ => current.map(|r| r.lineage_start()),
            };
            let kind = if lineage.is_live() {
                ChangeKind::Updated
            } else {
                ChangeKind::Created
            };
            self.commit(
                &id,
                Mutation::Save {
                    generation,
                    lineage_start,
                    body: Arc::clone(&body),
                    kind,
                },
            )?
        };

        self.metrics.record_save();
        let event = &committed.event;
        let saved = Document::from_parts(id, event.revision, event.sequence, false, body);
        self.settle(committed);
        Ok(saved)
    }

    /// Delete `doc` with last-writer-wins semantics
    ///
    /// Writes a tombstone and returns it. Deleting a tombstone returns it
    /// unchanged; deleting an id with no record fails with `NotFound`.
    pub fn delete(&self, doc: &Document) -> TesseraResult<Document> {
        self.delete_with(doc, ConcurrencyControl::default())
    }

    /// Delete `doc` under the given concurrency control
    pub fn delete_with(&self, doc: &Document, control: ConcurrencyControl) -> TesseraResult<Document> {
        let _op = self.enter()?;
        let id = require_id(doc)?;

        let (committed, tombstone) = {
            let guard = self.ledger.begin(id);
            let current = self
                .store
                .latest(id)
                .filter(|r| !r.is_purged())
                .ok_or_else(|| TesseraError::not_found(id))?;
            let lineage = lineage_of(Some(&*current));
            let generation = guard
                .allocate(lineage, doc.revision(), control)
                .map_err(|c| self.conflict(c))?;

            if current.is_tombstone() {
                debug!(target: "tessera::txn", id = %id, "delete of tombstone is a no-op");
                return current
                    .to_document(id)
                    .ok_or_else(|| TesseraError::not_found(id));
            }

            let committed = self.commit(
                id,
                Mutation::Delete {
                    generation,
                    lineage_start: current.lineage_start(),
                },
            )?;
            let event = &committed.event;
            let tombstone =
                Document::from_parts(id.clone(), event.revision, event.sequence, true, Arc::default());
            (committed, tombstone)
        };

        self.metrics.record_delete();
        self.settle(committed);
        Ok(tombstone)
    }

    /// Purge `doc`: erase it and its whole history
    pub fn purge(&self, doc: &Document) -> TesseraResult<()> {
        let id = require_id(doc)?;
        self.purge_id(id)
    }

    /// Purge the document with `id`
    ///
    /// Works on live and tombstoned documents. Fails with `NotFound` if the
    /// id has no record, including when it was already purged.
    pub fn purge_id(&self, id: impl Into<DocId>) -> TesseraResult<()> {
        let _op = self.enter()?;
        let id = id.into();
        if !id.is_valid() {
            return Err(TesseraError::invalid_input("document id must not be empty"));
        }

        let committed = {
            let _guard = self.ledger.begin(&id);
            let last = self
                .store
                .latest(&id)
                .and_then(|r| r.revision())
                .ok_or_else(|| TesseraError::not_found(&id))?;
            self.commit(&id, Mutation::Purge { last })?
        };

        self.metrics.record_purge();
        self.settle(committed);
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Latest live state of `id`
    ///
    /// Never waits for writers. Tombstoned and purged documents read as
    /// `None`.
    pub fn get(&self, id: impl Into<DocId>) -> TesseraResult<Option<Document>> {
        let _op = self.enter()?;
        Ok(self.store.get(&id.into()))
    }

    /// Number of live documents
    ///
    /// Available in every lifecycle state.
    pub fn count(&self) -> usize {
        self.store.live_count()
    }

    /// Run `query` against the current snapshot
    ///
    /// The returned rows reflect the database at the moment of the call,
    /// however long iteration takes.
    pub fn query(&self, query: &Query) -> TesseraResult<ResultSet> {
        let _op = self.enter()?;
        let plan = QueryPlan::build(query);
        let snapshot = self.store.snapshot();
        let candidates = plan.candidates(&snapshot);
        Ok(ResultSet::new(plan, candidates, snapshot.sequence()))
    }

    /// Execution plan of `query`
    pub fn explain(&self, query: &Query) -> TesseraResult<String> {
        let _op = self.enter()?;
        Ok(query.explain())
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Journal and apply one mutation
    ///
    /// Caller holds the document's ledger guard, and must pass the result
    /// to [`Database::settle`] after releasing it.
    fn commit(&self, id: &DocId, mutation: Mutation) -> TesseraResult<Committed> {
        let mut state = self.commit.lock();
        let sequence = state.last_sequence + 1;
        let (record, event) = mutation.into_record(id, sequence);

        if state.journal.durability().requires_wal() {
            if let Err(e) = state.journal.append(&journal_entry(id, &record)) {
                drop(state);
                self.metrics.record_storage_failure();
                error!(
                    target: "tessera::db",
                    id = %id,
                    sequence,
                    error = %e,
                    "Journal append failed, mutation aborted"
                );
                return Err(e.into());
            }
        }

        state.last_sequence = sequence;
        self.store.apply(id.clone(), record);
        state.commits_since_gc += 1;
        let sweep = state.commits_since_gc >= self.config.gc_interval;
        if sweep {
            state.commits_since_gc = 0;
        }
        drop(state);

        debug!(
            target: "tessera::txn",
            id = %id,
            sequence,
            revision = %event.revision,
            kind = %event.kind,
            "committed"
        );
        Ok(Committed { event, sweep })
    }

    /// Sweep if due, then deliver the event
    ///
    /// Runs without any ledger guard held.
    fn settle(&self, committed: Committed) {
        if committed.sweep {
            self.store.gc();
        }
        self.publish(committed.event);
    }

    fn conflict(&self, conflict: LedgerConflict) -> TesseraError {
        self.metrics.record_conflict();
        conflict.into()
    }
}
