//! Durability layer for Tessera
//!
//! This crate handles everything that touches disk:
//!
//! - WAL: single-file write-ahead journal, one record per committed mutation
//! - Durability modes: Cache, Standard (default), Always
//! - Record framing: length + CRC32 + MessagePack payload
//! - Recovery reads: stop at the first torn or corrupt record
//! - The `Journal` seam the engine commits through

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod journal;
pub mod wal;

pub use error::{DurabilityError, DurabilityResult};
pub use journal::{Journal, NullJournal};
pub use wal::{
    DurabilityMode, ReadStopReason, TruncateInfo, WalCounters, WalReadResult, WalReader,
    WalRecord, WalWriter, WAL_FILE_NAME,
};
