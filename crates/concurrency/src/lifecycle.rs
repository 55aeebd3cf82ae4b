//! Database lifecycle gate
//!
//! Every public operation enters the gate and holds an [`OperationGuard`]
//! until it returns. Closing is two-phase:
//!
//! ```text
//! Open ──begin_close()──▶ Closing ──wait_idle(); finish_close()──▶ Closed
//! ```
//!
//! Once `Closing` is set no new operation is admitted. `wait_idle` blocks
//! until every admitted operation has dropped its guard.
//!
//! Admission increments the in-flight counter before re-reading the state;
//! the closer sets the state before reading the counter. Both sides use
//! `SeqCst`, so either the operation sees `Closing` and backs out, or the
//! closer sees the operation and waits for it.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use thiserror::Error;

/// Lifecycle state of a database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    /// Accepting operations
    Open = 0,
    /// Draining in-flight operations
    Closing = 1,
    /// Fully shut down
    Closed = 2,
}

impl LifecycleState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LifecycleState::Open,
            1 => LifecycleState::Closing,
            _ => LifecycleState::Closed,
        }
    }
}

/// Operation refused because the gate is not open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("database is {0:?}")]
pub struct GateClosed(pub LifecycleState);

/// Admission control and drain for one database
#[derive(Debug)]
pub struct LifecycleGate {
    state: AtomicU8,
    active: AtomicUsize,
    drain_lock: Mutex<()>,
    drained: Condvar,
}

impl LifecycleGate {
    /// New gate in the `Open` state
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Open as u8),
            active: AtomicUsize::new(0),
            drain_lock: Mutex::new(()),
            drained: Condvar::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// True while accepting operations
    pub fn is_open(&self) -> bool {
        self.state() == LifecycleState::Open
    }

    /// Number of admitted operations that have not finished
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Admit one operation
    pub fn enter(&self) -> Result<OperationGuard<'_>, GateClosed> {
        self.active.fetch_add(1, Ordering::SeqCst);
        let guard = OperationGuard { gate: self };
        match self.state() {
            LifecycleState::Open => Ok(guard),
            other => Err(GateClosed(other)),
        }
    }

    /// Move `Open` to `Closing`
    ///
    /// Returns `false` if the gate was already closing or closed.
    pub fn begin_close(&self) -> bool {
        self.state
            .compare_exchange(
                LifecycleState::Open as u8,
                LifecycleState::Closing as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Block until no admitted operation remains
    pub fn wait_idle(&self) {
        let mut lock = self.drain_lock.lock();
        while self.active.load(Ordering::SeqCst) > 0 {
            self.drained.wait(&mut lock);
        }
    }

    /// Move to `Closed` and wake [`wait_closed`](Self::wait_closed) callers
    pub fn finish_close(&self) {
        let _lock = self.drain_lock.lock();
        self.state
            .store(LifecycleState::Closed as u8, Ordering::SeqCst);
        self.drained.notify_all();
    }

    /// Block until another caller's close has finished
    pub fn wait_closed(&self) {
        let mut lock = self.drain_lock.lock();
        while self.state() != LifecycleState::Closed {
            self.drained.wait(&mut lock);
        }
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        // While open nobody can be waiting: a closer reads the counter only
        // after publishing Closing.
        if self.is_open() {
            return;
        }
        // Take the lock before notifying: wait_idle checks the counter under
        // it, so the notification cannot fall between its check and its wait.
        let _lock = self.drain_lock.lock();
        self.drained.notify_all();
    }
}

impl Default for LifecycleGate {
    fn default() -> Self {
        Self::new()
    }
}

/// In-flight marker for one admitted operation
#[derive(Debug)]
pub struct OperationGuard<'a> {
    gate: &'a LifecycleGate,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.gate.exit();
    }
}
