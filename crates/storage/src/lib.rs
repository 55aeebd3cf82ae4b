//! Storage layer for Tessera
//!
//! This crate implements the in-memory document store:
//! - DocumentRecord: immutable committed state of one document
//! - VersionChain: newest-first MVCC history per document
//! - DocumentStore: DashMap of chains, published sequence, live count
//! - SnapshotRegistry / StoreSnapshot: point-in-time reads that pin GC
//!
//! Readers never block writers: every committed state is an `Arc` that a
//! reader can hold on to while newer states are appended behind it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod record;
pub mod snapshot;
pub mod store;

pub use chain::VersionChain;
pub use record::{DocumentRecord, RecordState};
pub use snapshot::{SnapshotRegistry, StoreSnapshot};
pub use store::{AppliedChange, DocumentStore};
