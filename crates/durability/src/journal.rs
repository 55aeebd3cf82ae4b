//! Journal abstraction
//!
//! The engine commits through `dyn Journal` so an in-memory database can
//! skip disk entirely and tests can inject failures.

use crate::error::DurabilityResult;
use crate::wal::{DurabilityMode, WalRecord, WalWriter};

/// Destination for committed mutations
///
/// `append` is called under the engine's commit lock, once per mutation,
/// before the mutation becomes visible. An error aborts the mutation and
/// its sequence goes to the next commit. If the failed record still
/// reached the journal, recovery drops it in favour of that next record.
pub trait Journal: Send {
    /// Persist one record
    fn append(&mut self, record: &WalRecord) -> DurabilityResult<()>;

    /// Make every appended record durable
    fn sync(&mut self) -> DurabilityResult<()>;

    /// Sync and release resources; later appends fail
    fn close(&mut self) -> DurabilityResult<()> {
        self.sync()
    }

    /// Durability mode this journal provides
    fn durability(&self) -> DurabilityMode;
}

impl Journal for WalWriter {
    fn append(&mut self, record: &WalRecord) -> DurabilityResult<()> {
        WalWriter::append(self, record)
    }

    fn sync(&mut self) -> DurabilityResult<()> {
        WalWriter::sync(self)
    }

    fn close(&mut self) -> DurabilityResult<()> {
        WalWriter::close(self)
    }

    fn durability(&self) -> DurabilityMode {
        WalWriter::durability(self)
    }
}

/// Journal that keeps nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullJournal;

impl Journal for NullJournal {
    fn append(&mut self, _record: &WalRecord) -> DurabilityResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> DurabilityResult<()> {
        Ok(())
    }

    fn durability(&self) -> DurabilityMode {
        DurabilityMode::Cache
    }
}
