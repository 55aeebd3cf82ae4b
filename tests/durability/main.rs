//! Durability Integration Tests
//!
//! What survives a close and reopen:
//! - Journal replay of saves, deletes and purges
//! - Torn and corrupt journal tails
//! - Journal failures that must not corrupt committed state

#[path = "../common/mod.rs"]
mod common;

mod storage_failure;
