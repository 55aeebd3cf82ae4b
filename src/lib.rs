//! TesseraDB - Concurrent embedded document store
//!
//! Documents are schemaless property maps identified by a string id. Every
//! write produces a new revision; writers to the same document serialize,
//! writers to different documents run in parallel, and readers never wait.
//! Each committed change is delivered to registered listeners in one global
//! order before the write returns.
//!
//! # Quick Start
//!
//! ```ignore
//! use tesseradb::prelude::*;
//!
//! let db = Database::ephemeral("contacts")?;
//!
//! let saved = db.save(&Document::with_id("doc1").with("tag", "friend"))?;
//! assert_eq!(saved.revision().unwrap().generation(), 1);
//!
//! let query = Query::select([SelectItem::Id]).filter(Predicate::eq("tag", "friend"));
//! for row in db.query(&query)? {
//!     println!("{}", row.id());
//! }
//!
//! db.close()?;
//! ```
//!
//! # Architecture
//!
//! | Crate | Concern |
//! |-------|---------|
//! | `tessera-core` | values, documents, revisions, errors |
//! | `tessera-storage` | MVCC document store and snapshots |
//! | `tessera-concurrency` | revision ledger, lifecycle gate, dispatch ordering |
//! | `tessera-durability` | write-ahead journal |
//! | `tessera-engine` | database handle, queries, change notification |

pub use tessera_concurrency::{ConcurrencyControl, LifecycleState};
pub use tessera_core::{
    Body, ChangeEvent, ChangeKind, DocId, Document, ErrorKind, Revision, TesseraError,
    TesseraResult, Timestamp, Value,
};
pub use tessera_durability::{DurabilityMode, Journal, NullJournal, WalRecord};
pub use tessera_engine::{
    ChangeListener, Database, DatabaseBuilder, DatabaseMetrics, FieldRef, ListenerScope,
    ListenerToken, Predicate, Query, QueryRow, ResultSet, SelectItem, TesseraConfig,
};

/// Everything needed for everyday use
pub mod prelude {
    pub use crate::{
        ChangeEvent, ChangeKind, ConcurrencyControl, Database, DocId, Document, ListenerScope,
        Predicate, Query, SelectItem, TesseraError, TesseraResult, Value,
    };
}
