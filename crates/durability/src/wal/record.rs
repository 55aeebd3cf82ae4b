//! Journal file and record format
//!
//! # File Layout
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │ Header: magic "TSWL" + version u32 │
//! ├────────────────────────────────────┤
//! │ Frame 1                            │
//! ├────────────────────────────────────┤
//! │ ...                                │
//! └────────────────────────────────────┘
//! ```
//!
//! # Frame Layout
//!
//! ```text
//! ┌─────────────────┬─────────────────┬─────────────────────────┐
//! │ Length (4, LE)  │ CRC32 (4, LE)   │ MessagePack payload     │
//! └─────────────────┴─────────────────┴─────────────────────────┘
//! ```
//!
//! The CRC covers the payload only. A frame whose length runs past the end
//! of the file is a torn write; a frame whose CRC does not match is corrupt.
//! Either way nothing after it is trusted.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};
use tessera_core::{Body, DocId, Revision};

use crate::error::{DurabilityError, DurabilityResult};

/// Magic bytes at the start of a journal file
pub const WAL_MAGIC: [u8; 4] = *b"TSWL";

/// Current journal format version
pub const WAL_FORMAT_VERSION: u32 = 1;

/// Size of the file header in bytes
pub const WAL_HEADER_SIZE: usize = 8;

/// Size of a frame header (length + CRC) in bytes
pub const FRAME_HEADER_SIZE: usize = 8;

/// Largest payload a frame may declare
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// One committed mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalRecord {
    /// Create or update
    Save {
        /// Commit sequence
        sequence: u64,
        /// Document id
        id: DocId,
        /// Revision produced
        revision: Revision,
        /// Sequence that created the lineage
        lineage_start: u64,
        /// Full body of the new state
        body: Body,
    },
    /// Tombstone written
    Delete {
        /// Commit sequence
        sequence: u64,
        /// Document id
        id: DocId,
        /// Revision of the tombstone
        revision: Revision,
        /// Sequence that created the lineage
        lineage_start: u64,
    },
    /// Lineage erased
    Purge {
        /// Commit sequence
        sequence: u64,
        /// Document id
        id: DocId,
        /// Last revision before the purge
        last: Revision,
    },
}

impl WalRecord {
    /// Commit sequence of this record
    pub fn sequence(&self) -> u64 {
        match self {
            WalRecord::Save { sequence, .. }
            | WalRecord::Delete { sequence, .. }
            | WalRecord::Purge { sequence, .. } => *sequence,
        }
    }

    /// Document this record mutates
    pub fn id(&self) -> &DocId {
        match self {
            WalRecord::Save { id, .. } | WalRecord::Delete { id, .. } | WalRecord::Purge { id, .. } => {
                id
            }
        }
    }

    /// Encode as a complete frame
    pub fn to_frame(&self) -> DurabilityResult<Vec<u8>> {
        let payload =
            rmp_serde::to_vec(self).map_err(|e| DurabilityError::Encode(e.to_string()))?;
        if payload.len() > MAX_RECORD_SIZE {
            return Err(DurabilityError::Encode(format!(
                "record of {} bytes exceeds limit of {}",
                payload.len(),
                MAX_RECORD_SIZE
            )));
        }
        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.write_u32::<LittleEndian>(payload.len() as u32)?;
        frame.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
        frame.extend_from_slice(&payload);
        Ok(frame)
    }
}

/// Outcome of decoding the frame at the start of a buffer
#[derive(Debug)]
pub enum Frame {
    /// A valid record occupying `len` bytes
    Complete {
        /// Decoded record
        record: WalRecord,
        /// Total frame size
        len: usize,
    },
    /// Buffer ends inside the frame
    Partial,
    /// Payload does not match its CRC
    ChecksumMismatch,
    /// CRC matched but payload did not decode
    Invalid(String),
}

/// Decode the frame at the start of `buf`
pub fn decode_frame(buf: &[u8]) -> Frame {
    if buf.len() < FRAME_HEADER_SIZE {
        return Frame::Partial;
    }
    let len = LittleEndian::read_u32(&buf[0..4]) as usize;
    let crc = LittleEndian::read_u32(&buf[4..8]);
    if len > MAX_RECORD_SIZE {
        return Frame::ChecksumMismatch;
    }
    let end = FRAME_HEADER_SIZE + len;
    if buf.len() < end {
        return Frame::Partial;
    }
    let payload = &buf[FRAME_HEADER_SIZE..end];
    if crc32fast::hash(payload) != crc {
        return Frame::ChecksumMismatch;
    }
    match rmp_serde::from_slice::<WalRecord>(payload) {
        Ok(record) => Frame::Complete { record, len: end },
        Err(e) => Frame::Invalid(e.to_string()),
    }
}

/// File header bytes
pub fn file_header() -> [u8; WAL_HEADER_SIZE] {
    let mut header = [0u8; WAL_HEADER_SIZE];
    header[0..4].copy_from_slice(&WAL_MAGIC);
    LittleEndian::write_u32(&mut header[4..8], WAL_FORMAT_VERSION);
    header
}

/// Validate a file header
pub fn check_header(buf: &[u8]) -> DurabilityResult<()> {
    if buf.len() < WAL_HEADER_SIZE || buf[0..4] != WAL_MAGIC {
        return Err(DurabilityError::BadHeader("missing journal magic".into()));
    }
    let version = LittleEndian::read_u32(&buf[4..8]);
    if version != WAL_FORMAT_VERSION {
        return Err(DurabilityError::BadHeader(format!(
            "unsupported journal version {}",
            version
        )));
    }
    Ok(())
}
