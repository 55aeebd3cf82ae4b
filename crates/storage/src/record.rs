//! Committed document states
//!
//! A [`DocumentRecord`] is never mutated after it is appended to a chain.
//! Readers clone the `Arc` and keep a stable view for as long as they like.

use std::sync::Arc;
use tessera_core::{Body, DocId, Document, Revision};

/// State of a document as of one commit
#[derive(Debug, Clone, PartialEq)]
pub enum RecordState {
    /// Live document with a body
    Live {
        /// Revision of this state
        revision: Revision,
        /// Shared property map
        body: Arc<Body>,
    },
    /// Deleted marker; still answers conflict checks
    Tombstone {
        /// Revision written by the delete
        revision: Revision,
    },
    /// End of a lineage; the id reads as absent
    Purged {
        /// Last revision before the purge
        last: Revision,
    },
}

/// Immutable committed state plus the commit that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    state: RecordState,
    sequence: u64,
    lineage_start: u64,
}

impl DocumentRecord {
    /// Live state
    pub fn live(revision: Revision, body: Arc<Body>, sequence: u64, lineage_start: u64) -> Self {
        DocumentRecord {
            state: RecordState::Live { revision, body },
            sequence,
            lineage_start,
        }
    }

    /// Tombstone state
    pub fn tombstone(revision: Revision, sequence: u64, lineage_start: u64) -> Self {
        DocumentRecord {
            state: RecordState::Tombstone { revision },
            sequence,
            lineage_start,
        }
    }

    /// Purge marker
    pub fn purged(last: Revision, sequence: u64) -> Self {
        DocumentRecord {
            state: RecordState::Purged { last },
            sequence,
            lineage_start: sequence,
        }
    }

    /// State of this record
    pub fn state(&self) -> &RecordState {
        &self.state
    }

    /// Commit sequence that wrote this record
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Sequence of the commit that created the lineage
    ///
    /// Queries return rows ordered by this value.
    pub fn lineage_start(&self) -> u64 {
        self.lineage_start
    }

    /// Revision of this state
    ///
    /// `None` for a purge marker: the lineage is gone and nothing can be
    /// compared against it.
    pub fn revision(&self) -> Option<Revision> {
        match &self.state {
            RecordState::Live { revision, .. } | RecordState::Tombstone { revision } => {
                Some(*revision)
            }
            RecordState::Purged { .. } => None,
        }
    }

    /// True for a live document
    pub fn is_live(&self) -> bool {
        matches!(self.state, RecordState::Live { .. })
    }

    /// True for a tombstone
    pub fn is_tombstone(&self) -> bool {
        matches!(self.state, RecordState::Tombstone { .. })
    }

    /// True for a purge marker
    pub fn is_purged(&self) -> bool {
        matches!(self.state, RecordState::Purged { .. })
    }

    /// Body of a live record
    pub fn body(&self) -> Option<&Arc<Body>> {
        match &self.state {
            RecordState::Live { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Client-side view of this record
    ///
    /// Returns `None` for a purge marker.
    pub fn to_document(&self, id: &DocId) -> Option<Document> {
        match &self.state {
            RecordState::Live { revision, body } => Some(Document::from_parts(
                id.clone(),
                *revision,
                self.sequence,
                false,
                Arc::clone(body),
            )),
            RecordState::Tombstone { revision } => Some(Document::from_parts(
                id.clone(),
                *revision,
                self.sequence,
                true,
                Arc::default(),
            )),
            RecordState::Purged { .. } => None,
        }
    }
}
