//! Lazy query results

use std::fmt;
use std::sync::Arc;
use std::vec;
use tessera_core::{resolve_path, Body, DocId, Revision, Value};
use tessera_storage::DocumentRecord;

use super::expr::SelectItem;
use super::plan::QueryPlan;

/// Column name for [`SelectItem::Id`]
pub const ID_COLUMN: &str = "_id";

/// Column name for [`SelectItem::Revision`]
pub const REVISION_COLUMN: &str = "_rev";

/// One result row
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRow {
    id: DocId,
    revision: Revision,
    sequence: u64,
    columns: Vec<(String, Value)>,
}

impl QueryRow {
    /// Id of the matched document
    pub fn id(&self) -> &DocId {
        &self.id
    }

    /// Revision of the matched document
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Commit sequence of the matched state
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Column by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, v)| v)
    }

    /// String column by name
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Columns in projection order
    pub fn columns(&self) -> &[(String, Value)] {
        &self.columns
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True if the row has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.columns
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::from(v.clone())))
                .collect(),
        )
    }
}

fn project(select: &[SelectItem], id: &DocId, revision: Revision, body: &Body) -> Vec<(String, Value)> {
    let mut columns = Vec::with_capacity(select.len());
    for item in select {
        match item {
            SelectItem::Id => columns.push((ID_COLUMN.to_string(), Value::from(id.as_str()))),
            SelectItem::Revision => {
                columns.push((REVISION_COLUMN.to_string(), Value::from(revision.to_string())))
            }
            SelectItem::Field(path) => columns.push((
                path.clone(),
                resolve_path(body, path).cloned().unwrap_or(Value::Null),
            )),
            SelectItem::All => {
                let mut keys: Vec<&String> = body.keys().collect();
                keys.sort();
                columns.extend(keys.into_iter().map(|k| (k.clone(), body[k].clone())));
            }
        }
    }
    columns
}

/// Rows of one query execution
///
/// The candidate records were pinned when the query ran, so iteration sees
/// one consistent snapshot no matter what commits meanwhile. Filtering and
/// projection happen per `next()`. Iterating consumes the set; run the
/// query again for fresh results.
pub struct ResultSet {
    plan: QueryPlan,
    candidates: vec::IntoIter<(DocId, Arc<DocumentRecord>)>,
    remaining: Option<usize>,
    snapshot_sequence: u64,
}

impl ResultSet {
    pub(crate) fn new(
        plan: QueryPlan,
        candidates: Vec<(DocId, Arc<DocumentRecord>)>,
        snapshot_sequence: u64,
    ) -> Self {
        let remaining = plan.limit();
        ResultSet {
            plan,
            candidates: candidates.into_iter(),
            remaining,
            snapshot_sequence,
        }
    }

    /// Commit sequence of the snapshot the rows come from
    pub fn snapshot_sequence(&self) -> u64 {
        self.snapshot_sequence
    }

    /// Plan this set was produced by
    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }
}

impl Iterator for ResultSet {
    type Item = QueryRow;

    fn next(&mut self) -> Option<QueryRow> {
        if self.remaining == Some(0) {
            return None;
        }
        loop {
            let (id, record) = self.candidates.next()?;
            let (Some(body), Some(revision)) = (record.body(), record.revision()) else {
                continue;
            };
            if !self.plan.predicate().matches(&id, body) {
                continue;
            }
            if let Some(n) = self.remaining.as_mut() {
                *n -= 1;
            }
            let columns = project(self.plan.select(), &id, revision, body);
            return Some(QueryRow {
                id,
                revision,
                sequence: record.sequence(),
                columns,
            });
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let upper = self.candidates.len();
        (0, Some(self.remaining.map_or(upper, |n| n.min(upper))))
    }
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("snapshot_sequence", &self.snapshot_sequence)
            .field("pending_candidates", &self.candidates.len())
            .finish()
    }
}
