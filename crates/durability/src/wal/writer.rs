//! Journal writer with durability mode support
//!
//! Each append builds the whole frame in memory and hands it to the OS in a
//! single `write_all`. If the write or its fsync fails, the file is cut back
//! to the end of the last good frame, so a failed append never leaves bytes
//! that recovery would replay or that would hide later records. When the
//! cut itself fails the writer is poisoned and refuses further appends.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};

use super::reader::{TruncateInfo, WalReader};
use super::record::{file_header, WalRecord, WAL_HEADER_SIZE};
use super::DurabilityMode;
use crate::error::{DurabilityError, DurabilityResult};

/// Cumulative journal counters
///
/// These accumulate over the lifetime of the writer and are never reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalCounters {
    /// Records appended
    pub appends: u64,
    /// fsync calls
    pub sync_calls: u64,
    /// Bytes written, headers included
    pub bytes_written: u64,
    /// Nanoseconds spent in fsync
    pub sync_nanos: u64,
}

/// Appends framed records to a single journal file
#[derive(Debug)]
pub struct WalWriter {
    /// Open file (None in Cache mode or after close)
    file: Option<File>,
    path: PathBuf,
    durability: DurabilityMode,
    /// End of the last complete frame
    position: u64,
    has_unsynced_data: bool,
    /// Set when a failed append could not be rolled back
    poisoned: bool,
    counters: WalCounters,
    #[cfg(test)]
    faults: TestFaults,
}

/// Injected failures for unit tests
#[cfg(test)]
#[derive(Debug, Default)]
struct TestFaults {
    fail_next_sync: bool,
    fail_next_rollback: bool,
}

impl WalWriter {
    /// Open `path` for appending, cutting any invalid tail first
    pub fn open(path: &Path, durability: DurabilityMode) -> DurabilityResult<Self> {
        let truncate = if durability.requires_wal() {
            WalReader::new().read_all(path)?.truncate_info
        } else {
            None
        };
        Self::resume(path, durability, truncate)
    }

    /// Open `path` for appending after the caller has already read it
    ///
    /// `truncate` is the tail reported by [`WalReader::read_all`].
    pub fn resume(
        path: &Path,
        durability: DurabilityMode,
        truncate: Option<TruncateInfo>,
    ) -> DurabilityResult<Self> {
        let mut writer = WalWriter {
            file: None,
            path: path.to_path_buf(),
            durability,
            position: 0,
            has_unsynced_data: false,
            poisoned: false,
            counters: WalCounters::default(),
            #[cfg(test)]
            faults: TestFaults::default(),
        };
        if !durability.requires_wal() {
            return Ok(writer);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        if let Some(info) = truncate {
            file.set_len(info.valid_end)?;
            file.sync_all()?;
            info!(
                target: "tessera::wal",
                path = %path.display(),
                discarded = info.bytes_to_truncate(),
                "truncated journal tail"
            );
        }

        let mut len = file.metadata()?.len();
        if len == 0 {
            file.write_all(&file_header())?;
            file.sync_all()?;
            len = WAL_HEADER_SIZE as u64;
            writer.counters.bytes_written += len;
        }
        file.seek(SeekFrom::Start(len))?;

        writer.position = len;
        writer.file = Some(file);
        debug!(target: "tessera::wal", path = %path.display(), len, mode = %durability, "journal opened");
        Ok(writer)
    }

    /// Append one record
    ///
    /// - `Cache`: no-op
    /// - `Standard`: written to the OS before returning
    /// - `Always`: written and fsynced before returning
    pub fn append(&mut self, record: &WalRecord) -> DurabilityResult<()> {
        if !self.durability.requires_wal() {
            return Ok(());
        }
        if self.poisoned {
            return Err(DurabilityError::Poisoned);
        }
        let frame = record.to_frame()?;
        let had_unsynced = self.has_unsynced_data;

        if let Err(e) = self.write_frame(&frame) {
            self.has_unsynced_data = had_unsynced;
            self.rollback();
            return Err(e);
        }

        self.position += frame.len() as u64;
        self.counters.appends += 1;
        self.counters.bytes_written += frame.len() as u64;
        Ok(())
    }

    /// Write `frame` at `position`, syncing it in `Always` mode
    fn write_frame(&mut self, frame: &[u8]) -> DurabilityResult<()> {
        let file = self.file.as_mut().ok_or(DurabilityError::Closed)?;
        file.write_all(frame)?;
        self.has_unsynced_data = true;
        if self.durability.requires_immediate_fsync() {
            self.sync()?;
        }
        Ok(())
    }

    /// Cut the file back to the end of the last complete frame
    fn rollback(&mut self) {
        let position = self.position;
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let cut = file
            .set_len(position)
            .and_then(|()| file.seek(SeekFrom::Start(position)).map(|_| ()));
        #[cfg(test)]
        let cut = if std::mem::take(&mut self.faults.fail_next_rollback) {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "injected rollback failure"))
        } else {
            cut
        };

        if let Err(e) = cut {
            self.poisoned = true;
            error!(
                target: "tessera::wal",
                path = %self.path.display(),
                position,
                error = %e,
                "journal rollback failed, refusing further appends"
            );
        }
    }

    /// True once a failed append could not be rolled back
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// fsync any unsynced data
    pub fn sync(&mut self) -> DurabilityResult<()> {
        if !self.has_unsynced_data {
            return Ok(());
        }
        #[cfg(test)]
        let injected = std::mem::take(&mut self.faults.fail_next_sync);
        #[cfg(not(test))]
        let injected = false;
        if injected {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "injected sync failure").into());
        }
        let file = self.file.as_mut().ok_or(DurabilityError::Closed)?;
        let start = Instant::now();
        file.sync_data()?;
        self.counters.sync_calls += 1;
        self.counters.sync_nanos += start.elapsed().as_nanos() as u64;
        self.has_unsynced_data = false;
        Ok(())
    }

    /// Sync and release the file
    pub fn close(&mut self) -> DurabilityResult<()> {
        if self.file.is_some() {
            self.sync()?;
            self.file = None;
        }
        Ok(())
    }

    /// Journal path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durability mode
    pub fn durability(&self) -> DurabilityMode {
        self.durability
    }

    /// End of the last complete frame
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Lifetime counters
    pub fn counters(&self) -> &WalCounters {
        &self.counters
    }
}

impl Drop for WalWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(target: "tessera::wal", error = %e, "journal sync on drop failed");
        }
    }
}
