//! Document revision identifiers
//!
//! A revision tags one committed state of one document. It pairs:
//!
//! - **generation**: per-document counter, 1 for the first write of a
//!   lineage and incremented by every create, update or delete.
//! - **sequence**: the database-wide commit sequence that produced the state.
//!
//! Generations alone are strictly increasing within a lineage. A purge ends
//! the lineage; re-creating the id starts again at generation 1, and the
//! sequence component keeps the new revision distinct from every earlier one.
//!
//! Revisions render as `"<generation>-<sequence hex>"`, e.g. `3-1f`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Revision of a single document
///
/// Ordering compares generations first, then sequences. Within one lineage
/// a later revision always compares greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Revision {
    generation: u64,
    sequence: u64,
}

impl Revision {
    /// Create a revision from its parts
    pub const fn new(generation: u64, sequence: u64) -> Self {
        Revision {
            generation,
            sequence,
        }
    }

    /// First revision of a new lineage
    pub const fn first(sequence: u64) -> Self {
        Revision::new(1, sequence)
    }

    /// Per-document generation
    #[inline]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Global commit sequence that produced this revision
    #[inline]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Revision that follows this one, committed at `sequence`
    pub const fn next(&self, sequence: u64) -> Self {
        Revision::new(self.generation + 1, sequence)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:x}", self.generation, self.sequence)
    }
}

/// Error returned when a revision string is malformed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed revision string: {0:?}")]
pub struct ParseRevisionError(pub String);

impl FromStr for Revision {
    type Err = ParseRevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRevisionError(s.to_string());
        let (gen, seq) = s.split_once('-').ok_or_else(err)?;
        let generation: u64 = gen.parse().map_err(|_| err())?;
        let sequence = u64::from_str_radix(seq, 16).map_err(|_| err())?;
        if generation == 0 {
            return Err(err());
        }
        Ok(Revision::new(generation, sequence))
    }
}
