//! Write-ahead journal
//!
//! - `mode`: durability modes (Cache, Standard, Always)
//! - `record`: journal record types and their framing
//! - `writer`: appends framed records to the journal file
//! - `reader`: reads records back for recovery

pub mod mode;
pub mod reader;
pub mod record;
pub mod writer;

pub use mode::DurabilityMode;
pub use reader::{ReadStopReason, TruncateInfo, WalReadResult, WalReader};
pub use record::WalRecord;
pub use writer::{WalCounters, WalWriter};

/// Journal file name inside a database directory
pub const WAL_FILE_NAME: &str = "journal.wal";
