//! Contract types
//!
//! Every committed document state carries a [`Revision`]; values that record
//! wall-clock time use [`Timestamp`].

pub mod revision;
pub mod timestamp;

pub use revision::Revision;
pub use timestamp::Timestamp;
