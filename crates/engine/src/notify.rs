//! Change notification bus
//!
//! Listeners run synchronously on the thread that committed the change,
//! after the commit and before the write call returns. Events reach
//! listeners in global sequence order; the database enforces that with a
//! dispatch turnstile, this module only handles registration, delivery and
//! panic isolation.
//!
//! # Writes From Listeners
//!
//! A listener may write to the database it is observing. The write commits
//! right away, but its event cannot be delivered yet: the thread is still
//! delivering an earlier sequence. Each dispatching thread keeps a stack of
//! [`DispatchFrame`]s, one per database it is delivering for, and such
//! events are queued on the matching frame and delivered right after the
//! current one.

use parking_lot::RwLock;
use smallvec::SmallVec;
use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tessera_core::{ChangeEvent, DocId, TesseraError};
use tracing::error;

// ============================================================================
// Listeners
// ============================================================================

/// Receives committed changes
///
/// Implemented for every `Fn(&ChangeEvent) + Send + Sync` closure.
pub trait ChangeListener: Send + Sync + 'static {
    /// Called once per matching committed change
    fn on_change(&self, event: &ChangeEvent);
}

impl<F> ChangeListener for F
where
    F: Fn(&ChangeEvent) + Send + Sync + 'static,
{
    fn on_change(&self, event: &ChangeEvent) {
        self(event)
    }
}

/// Which changes a listener receives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListenerScope {
    /// Every change in the database
    Database,
    /// Changes to one document id
    Document(DocId),
}

impl ListenerScope {
    /// Scope for one document
    pub fn document(id: impl Into<DocId>) -> Self {
        ListenerScope::Document(id.into())
    }

    /// Whether `event` falls in this scope
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            ListenerScope::Database => true,
            ListenerScope::Document(id) => *id == event.doc_id,
        }
    }
}

/// Handle returned by registration, used to remove the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerToken(u64);

impl fmt::Display for ListenerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

// ============================================================================
// Registry
// ============================================================================

struct Registration {
    token: ListenerToken,
    scope: ListenerScope,
    listener: Arc<dyn ChangeListener>,
}

/// Outcome of delivering one event
#[derive(Debug, Default)]
pub(crate) struct Delivery {
    /// Listeners that returned normally
    pub delivered: usize,
    /// One `ListenerFailure` per listener that panicked
    pub failures: Vec<TesseraError>,
}

/// Listeners of one database, in registration order
pub(crate) struct ListenerRegistry {
    entries: RwLock<Vec<Registration>>,
    next_token: AtomicU64,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }

    pub(crate) fn add(
        &self,
        scope: ListenerScope,
        listener: Arc<dyn ChangeListener>,
    ) -> ListenerToken {
        let token = ListenerToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push(Registration {
            token,
            scope,
            listener,
        });
        token
    }

    pub(crate) fn remove(&self, token: ListenerToken) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|r| r.token != token);
        entries.len() != before
    }

    /// Drop every registration, returning how many there were
    pub(crate) fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let n = entries.len();
        entries.clear();
        n
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Deliver `event` to every matching listener
    ///
    /// The matching set is captured before the first call, so listeners
    /// added or removed while delivering take effect from the next event.
    pub(crate) fn deliver(&self, event: &ChangeEvent) -> Delivery {
        let targets: SmallVec<[Arc<dyn ChangeListener>; 4]> = self
            .entries
            .read()
            .iter()
            .filter(|r| r.scope.matches(event))
            .map(|r| Arc::clone(&r.listener))
            .collect();

        let mut delivery = Delivery::default();
        for listener in targets {
            match catch_unwind(AssertUnwindSafe(|| listener.on_change(event))) {
                Ok(()) => delivery.delivered += 1,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(
                        target: "tessera::notify",
                        sequence = event.sequence,
                        id = %event.doc_id,
                        panic = %message,
                        "change listener panicked"
                    );
                    delivery
                        .failures
                        .push(TesseraError::listener_failure(event.sequence, message));
                }
            }
        }
        delivery
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "(non-string panic)".to_string()
    }
}

// ============================================================================
// Dispatch frames
// ============================================================================

struct Frame {
    database: u64,
    pending: VecDeque<ChangeEvent>,
}

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = RefCell::new(Vec::new());
}

/// Marks the current thread as delivering events for one database
///
/// Popped on drop. Not `Send`: it describes the thread that created it.
pub(crate) struct DispatchFrame {
    database: u64,
    _thread_bound: PhantomData<*const ()>,
}

impl DispatchFrame {
    pub(crate) fn push(database: u64) -> Self {
        FRAMES.with(|frames| {
            frames.borrow_mut().push(Frame {
                database,
                pending: VecDeque::new(),
            })
        });
        DispatchFrame {
            database,
            _thread_bound: PhantomData,
        }
    }

    /// Events committed by listeners since the frame was pushed
    pub(crate) fn take_pending(&self) -> VecDeque<ChangeEvent> {
        FRAMES.with(|frames| {
            frames
                .borrow_mut()
                .last_mut()
                .filter(|f| f.database == self.database)
                .map(|f| std::mem::take(&mut f.pending))
                .unwrap_or_default()
        })
    }
}

impl Drop for DispatchFrame {
    fn drop(&mut self) {
        FRAMES.with(|frames| {
            let popped = frames.borrow_mut().pop();
            debug_assert!(popped.map_or(false, |f| f.database == self.database));
        });
    }
}

/// Queue `event` if this thread is already delivering for `database`
///
/// Returns the event back when the caller must deliver it itself.
pub(crate) fn defer(database: u64, event: ChangeEvent) -> Option<ChangeEvent> {
    FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        match frames.iter_mut().rev().find(|f| f.database == database) {
            Some(frame) => {
                frame.pending.push_back(event);
                None
            }
            None => Some(event),
        }
    })
}

/// Whether this thread is inside a listener of `database`
pub(crate) fn is_dispatching(database: u64) -> bool {
    FRAMES.with(|frames| frames.borrow().iter().any(|f| f.database == database))
}
