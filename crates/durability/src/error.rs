//! Durability errors

use std::io;
use tessera_core::TesseraError;
use thiserror::Error;

/// Result alias for journal operations
pub type DurabilityResult<T> = std::result::Result<T, DurabilityError>;

/// Journal failure
#[derive(Debug, Error)]
pub enum DurabilityError {
    /// Underlying file operation failed
    #[error("journal I/O error: {0}")]
    Io(#[from] io::Error),

    /// Record could not be encoded
    #[error("journal encode error: {0}")]
    Encode(String),

    /// Record could not be decoded
    #[error("journal decode error at offset {offset}: {detail}")]
    Decode {
        /// Byte offset of the record
        offset: u64,
        /// What went wrong
        detail: String,
    },

    /// File is not a journal or has an unsupported version
    #[error("bad journal header: {0}")]
    BadHeader(String),

    /// Journal already closed
    #[error("journal is closed")]
    Closed,

    /// A failed append could not be rolled back
    #[error("journal is unusable after a failed rollback")]
    Poisoned,
}

impl From<DurabilityError> for TesseraError {
    fn from(e: DurabilityError) -> Self {
        match e {
            DurabilityError::Io(io) => TesseraError::storage_io("journal write failed", io),
            other => TesseraError::storage(other.to_string()),
        }
    }
}
