//! Concurrency layer for Tessera
//!
//! This crate provides the synchronization primitives the engine composes
//! into its commit protocol:
//! - DocumentLocks: per-document writer serialization with automatic cleanup
//! - RevisionLedger: conflict check and revision allocation under that lock
//! - LifecycleGate: Open → Closing → Closed state plus in-flight accounting
//! - DispatchTurnstile: hands out notification turns in commit order
//!
//! Nothing here knows about storage or listeners; each primitive is tested
//! on its own.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ledger;
pub mod lifecycle;
pub mod locks;
pub mod turnstile;

pub use ledger::{ConcurrencyControl, LedgerConflict, LedgerGuard, Lineage, RevisionLedger};
pub use lifecycle::{GateClosed, LifecycleGate, LifecycleState, OperationGuard};
pub use locks::{DocLockGuard, DocumentLocks};
pub use turnstile::{DispatchTurnstile, Turn};
