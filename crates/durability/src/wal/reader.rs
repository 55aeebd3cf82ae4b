//! Journal reader for recovery
//!
//! Reads frames front to back and stops at the first one that is torn,
//! corrupt or undecodable. Everything before that point is returned; the
//! byte offset where valid data ends is reported so the writer can cut the
//! tail off before appending again.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::warn;

use super::record::{check_header, decode_frame, Frame, WalRecord, WAL_HEADER_SIZE};
use crate::error::DurabilityResult;

/// Why reading stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStopReason {
    /// Every byte was consumed
    EndOfData,
    /// Last frame was cut short (expected after a crash mid-append)
    PartialRecord,
    /// A frame's CRC did not match
    ChecksumMismatch {
        /// Byte offset of the bad frame
        offset: u64,
    },
    /// CRC matched but the payload did not decode
    ParseError {
        /// Byte offset of the bad frame
        offset: u64,
        /// Decoder message
        detail: String,
    },
}

/// Tail that must be cut before appending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncateInfo {
    /// Position where valid data ends
    pub valid_end: u64,
    /// File size found on disk
    pub original_size: u64,
}

impl TruncateInfo {
    /// Number of bytes to discard
    pub fn bytes_to_truncate(&self) -> u64 {
        self.original_size - self.valid_end
    }
}

/// Everything recovered from one journal file
#[derive(Debug)]
pub struct WalReadResult {
    /// Valid records in append order
    pub records: Vec<WalRecord>,
    /// Set when the file has an invalid tail
    pub truncate_info: Option<TruncateInfo>,
    /// Why reading stopped
    pub stop_reason: ReadStopReason,
}

impl WalReadResult {
    fn empty() -> Self {
        WalReadResult {
            records: Vec::new(),
            truncate_info: None,
            stop_reason: ReadStopReason::EndOfData,
        }
    }

    /// Highest sequence recovered, or 0
    pub fn last_sequence(&self) -> u64 {
        self.records.last().map_or(0, |r| r.sequence())
    }
}

/// Stateless journal reader
#[derive(Debug, Default, Clone, Copy)]
pub struct WalReader;

impl WalReader {
    /// Create a reader
    pub fn new() -> Self {
        WalReader
    }

    /// Read every valid record from `path`
    ///
    /// A missing file reads as empty. A file too short to hold a header is
    /// treated as a torn creation and reported for truncation to zero.
    pub fn read_all(&self, path: &Path) -> DurabilityResult<WalReadResult> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(WalReadResult::empty()),
            Err(e) => return Err(e.into()),
        };
        let original_size = bytes.len() as u64;

        if bytes.len() < WAL_HEADER_SIZE {
            let mut result = WalReadResult::empty();
            if !bytes.is_empty() {
                result.stop_reason = ReadStopReason::PartialRecord;
                result.truncate_info = Some(TruncateInfo {
                    valid_end: 0,
                    original_size,
                });
            }
            return Ok(result);
        }
        check_header(&bytes)?;

        let mut records = Vec::new();
        let mut offset = WAL_HEADER_SIZE;
        let stop_reason = loop {
            if offset == bytes.len() {
                break ReadStopReason::EndOfData;
            }
            match decode_frame(&bytes[offset..]) {
                Frame::Complete { record, len } => {
                    records.push(record);
                    offset += len;
                }
                Frame::Partial => break ReadStopReason::PartialRecord,
                Frame::ChecksumMismatch => {
                    break ReadStopReason::ChecksumMismatch {
                        offset: offset as u64,
                    }
                }
                Frame::Invalid(detail) => {
                    break ReadStopReason::ParseError {
                        offset: offset as u64,
                        detail,
                    }
                }
            }
        };

        let valid_end = offset as u64;
        let truncate_info = (valid_end < original_size).then(|| TruncateInfo {
            valid_end,
            original_size,
        });
        if let Some(info) = &truncate_info {
            warn!(
                target: "tessera::wal",
                path = %path.display(),
                valid_end = info.valid_end,
                discarded = info.bytes_to_truncate(),
                reason = ?stop_reason,
                "journal has an invalid tail"
            );
        }

        Ok(WalReadResult {
            records,
            truncate_info,
            stop_reason,
        })
    }
}
