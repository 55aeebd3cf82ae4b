//! Engine Integration Tests
//!
//! One thread, one database, through the public API:
//! - Document lifecycle and revision rules
//! - Queries, projections and plans
//! - Listener registration and delivery
//! - Configuration and opening

#[path = "../common/mod.rs"]
mod common;

mod config;
mod listeners;
mod queries;
