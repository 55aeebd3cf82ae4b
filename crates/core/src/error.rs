//! Error types for Tessera
//!
//! All public operations return [`TesseraResult`]. Each variant maps to a
//! stable numeric [`code`](TesseraError::code) modeled on HTTP status codes;
//! a missing document is always `404`.
//!
//! We use `thiserror` for `Display` and `Error` implementations.

use crate::contract::Revision;
use crate::document::DocId;
use std::io;
use thiserror::Error;

/// Result type alias for Tessera operations
pub type TesseraResult<T> = std::result::Result<T, TesseraError>;

/// Coarse classification of a [`TesseraError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Expected revision did not match
    Conflict,
    /// Document absent or purged
    NotFound,
    /// Database is closing or closed
    DatabaseClosed,
    /// A change listener panicked
    ListenerFailure,
    /// Journal or filesystem failure
    StorageFailure,
    /// Malformed caller input
    InvalidInput,
    /// Operation not allowed in the current context
    InvalidOperation,
    /// Bug or broken invariant
    Internal,
}

/// Error type for the document store
#[derive(Debug, Error)]
pub enum TesseraError {
    /// Write based on a stale revision
    #[error("conflict on document {id}: expected revision {}, found {}", fmt_rev(.expected), fmt_rev(.actual))]
    Conflict {
        /// Document being written
        id: DocId,
        /// Revision the caller based the write on
        expected: Option<Revision>,
        /// Current revision in the database
        actual: Option<Revision>,
    },

    /// Document does not exist
    #[error("document not found: {id}")]
    NotFound {
        /// Missing document id
        id: DocId,
    },

    /// Database no longer accepts operations
    #[error("database '{name}' is closed")]
    DatabaseClosed {
        /// Database name
        name: String,
    },

    /// Listener panicked while handling an event
    #[error("listener failed handling event #{sequence}: {message}")]
    ListenerFailure {
        /// Sequence of the event being delivered
        sequence: u64,
        /// Panic payload, if printable
        message: String,
    },

    /// Journal or filesystem failure
    #[error("storage failure: {message}")]
    StorageFailure {
        /// What failed
        message: String,
        /// Underlying I/O error
        #[source]
        source: Option<io::Error>,
    },

    /// Malformed input
    #[error("invalid input: {message}")]
    InvalidInput {
        /// What was wrong
        message: String,
    },

    /// Operation not allowed here
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// What was attempted
        message: String,
    },

    /// Internal error
    #[error("internal error: {message}")]
    Internal {
        /// Description
        message: String,
    },
}

fn fmt_rev(rev: &Option<Revision>) -> String {
    rev.map(|r| r.to_string())
        .unwrap_or_else(|| "<none>".to_string())
}

impl TesseraError {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Document not found
    pub fn not_found(id: impl Into<DocId>) -> Self {
        TesseraError::NotFound { id: id.into() }
    }

    /// Revision conflict
    pub fn conflict(
        id: impl Into<DocId>,
        expected: Option<Revision>,
        actual: Option<Revision>,
    ) -> Self {
        TesseraError::Conflict {
            id: id.into(),
            expected,
            actual,
        }
    }

    /// Database closed
    pub fn database_closed(name: impl Into<String>) -> Self {
        TesseraError::DatabaseClosed { name: name.into() }
    }

    /// Listener failure
    pub fn listener_failure(sequence: u64, message: impl Into<String>) -> Self {
        TesseraError::ListenerFailure {
            sequence,
            message: message.into(),
        }
    }

    /// Storage failure without an I/O source
    pub fn storage(message: impl Into<String>) -> Self {
        TesseraError::StorageFailure {
            message: message.into(),
            source: None,
        }
    }

    /// Storage failure caused by an I/O error
    pub fn storage_io(message: impl Into<String>, source: io::Error) -> Self {
        TesseraError::StorageFailure {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        TesseraError::InvalidInput {
            message: message.into(),
        }
    }

    /// Invalid operation
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        TesseraError::InvalidOperation {
            message: message.into(),
        }
    }

    /// Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        TesseraError::Internal {
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Coarse kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            TesseraError::Conflict { .. } => ErrorKind::Conflict,
            TesseraError::NotFound { .. } => ErrorKind::NotFound,
            TesseraError::DatabaseClosed { .. } => ErrorKind::DatabaseClosed,
            TesseraError::ListenerFailure { .. } => ErrorKind::ListenerFailure,
            TesseraError::StorageFailure { .. } => ErrorKind::StorageFailure,
            TesseraError::InvalidInput { .. } => ErrorKind::InvalidInput,
            TesseraError::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            TesseraError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Numeric status code
    ///
    /// | Kind | Code |
    /// |------|------|
    /// | InvalidInput, InvalidOperation | 400 |
    /// | NotFound | 404 |
    /// | Conflict | 409 |
    /// | StorageFailure, ListenerFailure, Internal | 500 |
    /// | DatabaseClosed | 503 |
    pub fn code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidInput | ErrorKind::InvalidOperation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::StorageFailure | ErrorKind::ListenerFailure | ErrorKind::Internal => 500,
            ErrorKind::DatabaseClosed => 503,
        }
    }

    /// Whether retrying the same call may succeed
    ///
    /// Conflicts succeed after re-reading; storage failures may be transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Conflict | ErrorKind::StorageFailure
        )
    }

    /// Check for [`ErrorKind::NotFound`]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check for [`ErrorKind::Conflict`]
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Check for [`ErrorKind::DatabaseClosed`]
    pub fn is_closed(&self) -> bool {
        self.kind() == ErrorKind::DatabaseClosed
    }
}

impl From<io::Error> for TesseraError {
    fn from(e: io::Error) -> Self {
        TesseraError::storage_io("I/O error", e)
    }
}
