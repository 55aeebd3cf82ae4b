//! Query planning
//!
//! Two access paths exist: a primary-key lookup when the predicate pins
//! `_id` to a literal, and a scan of every live document otherwise. The
//! whole predicate is evaluated on every candidate either way.

use std::fmt::Write as _;
use std::sync::Arc;
use tessera_core::DocId;
use tessera_storage::{DocumentRecord, StoreSnapshot};

use super::expr::{Predicate, Query, SelectItem};

/// How candidate documents are found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Direct lookup of one id
    PrimaryKey(DocId),
    /// Every live document, in creation order
    Scan,
}

/// Executable form of a [`Query`]
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    access: Access,
    predicate: Predicate,
    select: Vec<SelectItem>,
    limit: Option<usize>,
}

impl QueryPlan {
    /// Plan `query`
    pub fn build(query: &Query) -> Self {
        let access = match query.predicate().primary_key() {
            Some(id) => Access::PrimaryKey(DocId::from(id)),
            None => Access::Scan,
        };
        QueryPlan {
            access,
            predicate: query.predicate().clone(),
            select: query.select_items().to_vec(),
            limit: query.max_rows(),
        }
    }

    /// Chosen access path
    pub fn access(&self) -> &Access {
        &self.access
    }

    pub(crate) fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub(crate) fn select(&self) -> &[SelectItem] {
        &self.select
    }

    pub(crate) fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Candidate records visible in `snapshot`, in output order
    pub(crate) fn candidates(&self, snapshot: &StoreSnapshot) -> Vec<(DocId, Arc<DocumentRecord>)> {
        match &self.access {
            Access::PrimaryKey(id) => snapshot
                .live_record(id)
                .map(|record| vec![(id.clone(), record)])
                .unwrap_or_default(),
            Access::Scan => snapshot.live_records(),
        }
    }

    /// Human-readable plan, one step per line
    ///
    /// ```text
    /// SCAN documents
    /// FILTER tag = 'Create'
    /// PROJECT _id
    /// ```
    pub fn explain(&self) -> String {
        let mut out = String::new();
        match &self.access {
            Access::PrimaryKey(id) => {
                let _ = writeln!(out, "SEARCH documents USING PRIMARY KEY (_id = '{}')", id);
            }
            Access::Scan => out.push_str("SCAN documents\n"),
        }
        if self.predicate != Predicate::All {
            let _ = writeln!(out, "FILTER {}", self.predicate);
        }
        let columns: Vec<String> = self.select.iter().map(|s| s.to_string()).collect();
        let _ = write!(out, "PROJECT {}", columns.join(", "));
        if let Some(n) = self.limit {
            let _ = write!(out, "\nLIMIT {}", n);
        }
        out
    }
}
