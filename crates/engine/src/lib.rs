//! Database engine for Tessera
//!
//! This crate orchestrates all lower layers:
//! - Database: open/close, document operations, configuration, metrics
//! - Query planning and lazy result sets
//! - Change notification with ordered, synchronous delivery
//! - Journal replay on open
//!
//! The engine is the only component that knows about:
//! - The commit path (ledger lock, journal, store, dispatch)
//! - Cross-layer coordination (storage + journal + recovery)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod database;
pub mod notify;
pub mod query;

pub use database::{
    Database, DatabaseBuilder, DatabaseMetrics, TesseraConfig, CONFIG_FILE_NAME,
    DEFAULT_GC_INTERVAL, LOCK_FILE_NAME,
};
pub use notify::{ChangeListener, ListenerScope, ListenerToken};
pub use query::{
    Access, FieldRef, Predicate, Query, QueryPlan, QueryRow, ResultSet, SelectItem, ID_COLUMN,
    REVISION_COLUMN,
};
