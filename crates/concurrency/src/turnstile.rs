//! Ordered dispatch turns
//!
//! Commits are sequenced under a short global lock, but listener dispatch
//! runs outside it. The turnstile restores the order: the writer of
//! sequence `n` waits until sequence `n - 1` has finished dispatching. A
//! writer whose listener blocks therefore holds back every later writer's
//! return, which is the backpressure callers rely on.
//!
//! Sequences must be contiguous. A commit that fails before it is assigned
//! a sequence never takes a turn.

use parking_lot::{Condvar, Mutex};

/// Ticket-ordered turnstile keyed by commit sequence
#[derive(Debug)]
pub struct DispatchTurnstile {
    next: Mutex<u64>,
    advanced: Condvar,
}

impl DispatchTurnstile {
    /// Turnstile whose first turn is `first`
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: Mutex::new(first),
            advanced: Condvar::new(),
        }
    }

    /// Sequence whose turn it is
    pub fn current(&self) -> u64 {
        *self.next.lock()
    }

    /// Block until it is `sequence`'s turn
    ///
    /// The returned [`Turn`] passes the turnstile to `sequence + 1` when
    /// dropped, including during unwinding.
    pub fn wait_turn(&self, sequence: u64) -> Turn<'_> {
        let mut next = self.next.lock();
        while *next < sequence {
            self.advanced.wait(&mut next);
        }
        debug_assert_eq!(*next, sequence, "turn {} taken twice", sequence);
        Turn {
            turnstile: self,
            sequence,
        }
    }

    fn advance(&self, sequence: u64) {
        let mut next = self.next.lock();
        if *next == sequence {
            *next = sequence + 1;
        }
        self.advanced.notify_all();
    }
}

/// The right to dispatch one sequence
#[derive(Debug)]
pub struct Turn<'a> {
    turnstile: &'a DispatchTurnstile,
    sequence: u64,
}

impl Turn<'_> {
    /// Sequence this turn belongs to
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        self.turnstile.advance(self.sequence);
    }
}
