//! Core types for Tessera
//!
//! This crate defines the foundational types shared by every layer:
//! - Value: recursive value model for document properties
//! - DocId / Document: document identity and copy-on-write bodies
//! - Revision: per-document generation stamped with its commit sequence
//! - Timestamp: microsecond-precision wall clock
//! - ChangeEvent: record of one committed mutation
//! - Error: the `TesseraError` taxonomy and its status codes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod change;
pub mod contract;
pub mod document;
pub mod error;
pub mod value;

pub use change::{ChangeEvent, ChangeKind};
pub use contract::{Revision, Timestamp};
pub use document::{resolve_path, Body, DocId, Document};
pub use error::{ErrorKind, TesseraError, TesseraResult};
pub use value::Value;
