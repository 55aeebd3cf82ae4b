//! Operation counters
//!
//! # Memory Ordering
//!
//! Every counter uses Relaxed ordering. They are observational only and do
//! not synchronize any other memory; a snapshot may mix values from
//! slightly different instants.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by a database
#[derive(Debug, Default)]
pub(crate) struct MetricsCounters {
    saves: AtomicU64,
    deletes: AtomicU64,
    purges: AtomicU64,
    conflicts: AtomicU64,
    storage_failures: AtomicU64,
    listener_failures: AtomicU64,
    events_dispatched: AtomicU64,
}

impl MetricsCounters {
    pub(crate) fn record_save(&self) {
        self.saves.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_purge(&self) {
        self.purges.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_storage_failure(&self) {
        self.storage_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch(&self, delivered: usize, failed: usize) {
        self.events_dispatched
            .fetch_add(delivered as u64, Ordering::Relaxed);
        if failed > 0 {
            self.listener_failures
                .fetch_add(failed as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(
        &self,
        active_operations: usize,
        last_sequence: u64,
        live_documents: usize,
    ) -> DatabaseMetrics {
        DatabaseMetrics {
            saves: self.saves.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            purges: self.purges.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            listener_failures: self.listener_failures.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            active_operations,
            last_sequence,
            live_documents,
        }
    }
}

/// Point-in-time view of a database's counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseMetrics {
    /// Successful saves
    pub saves: u64,
    /// Successful deletes that wrote a tombstone
    pub deletes: u64,
    /// Successful purges
    pub purges: u64,
    /// Writes rejected with `Conflict`
    pub conflicts: u64,
    /// Writes aborted by a journal failure
    pub storage_failures: u64,
    /// Listener invocations that panicked
    pub listener_failures: u64,
    /// Listener invocations that returned normally
    pub events_dispatched: u64,
    /// Operations inside the database right now
    pub active_operations: usize,
    /// Highest committed sequence
    pub last_sequence: u64,
    /// Live documents
    pub live_documents: usize,
}

impl DatabaseMetrics {
    /// Committed mutations of any kind
    pub fn total_commits(&self) -> u64 {
        self.saves + self.deletes + self.purges
    }

    /// Share of listener invocations that panicked
    pub fn listener_failure_rate(&self) -> f64 {
        let total = self.events_dispatched + self.listener_failures;
        if total > 0 {
            self.listener_failures as f64 / total as f64
        } else {
            0.0
        }
    }
}
