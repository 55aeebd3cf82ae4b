//! Change events
//!
//! Every committed mutation produces exactly one [`ChangeEvent`]. The
//! `sequence` field is the database-wide commit sequence, so sorting events
//! by it recovers the commit order.

use crate::contract::Revision;
use crate::document::DocId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of committed mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// First live revision of a lineage
    Created,
    /// New live revision of an existing document
    Updated,
    /// Tombstone written
    Deleted,
    /// Document and its history removed
    Purged,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Purged => "purged",
        };
        f.write_str(s)
    }
}

/// One committed mutation
///
/// For [`ChangeKind::Purged`] the revision is the last one the document had
/// before it was purged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Affected document
    pub doc_id: DocId,
    /// Revision produced by the mutation
    pub revision: Revision,
    /// What happened
    pub kind: ChangeKind,
    /// Global commit sequence
    pub sequence: u64,
}

impl ChangeEvent {
    /// Create an event
    pub fn new(doc_id: DocId, revision: Revision, kind: ChangeKind, sequence: u64) -> Self {
        ChangeEvent {
            doc_id,
            revision,
            kind,
            sequence,
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} @ {}",
            self.sequence, self.kind, self.doc_id, self.revision
        )
    }
}
