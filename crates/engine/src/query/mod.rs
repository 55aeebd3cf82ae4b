//! Query engine
//!
//! A [`Query`] selects columns from live documents that satisfy a
//! [`Predicate`]. Planning picks between a primary-key lookup and a full
//! scan; execution pins the candidate records of one snapshot and filters
//! and projects them lazily as the [`ResultSet`] is iterated.
//!
//! ```text
//! Query::select([SelectItem::Id])
//!     .filter(Predicate::eq("tag", "Create"))
//! ```

mod expr;
mod plan;
mod results;

pub use expr::{FieldRef, Predicate, Query, SelectItem};
pub use plan::{Access, QueryPlan};
pub use results::{QueryRow, ResultSet, ID_COLUMN, REVISION_COLUMN};
