//! Database handle
//!
//! A `Database` owns everything about one document collection: the store,
//! the revision ledger, the journal, listener registrations and the
//! lifecycle gate. There is no process-wide registry; two handles on the
//! same directory are prevented by an exclusive file lock instead.
//!
//! # Commit Path
//!
//! Every mutation runs the same steps:
//!
//! 1. Enter the lifecycle gate (fails with `DatabaseClosed` once closing)
//! 2. Take the document's ledger lock and check the expected revision
//! 3. Under the commit lock: allocate the next sequence, append to the
//!    journal, apply to the store
//! 4. Release the ledger lock
//! 5. Wait for the dispatch turn of the sequence, deliver the event
//!
//! A journal failure in step 3 returns before the sequence is consumed or
//! the store is touched.
//!
//! # Lifecycle
//!
//! `Open → Closing → Closed`. `close()` stops admitting operations, waits
//! for in-flight ones (event delivery included), syncs the journal and
//! drops every listener.

mod builder;
mod config;
mod documents;
mod metrics;
mod recovery;

pub use builder::DatabaseBuilder;
pub use config::{TesseraConfig, CONFIG_FILE_NAME, DEFAULT_GC_INTERVAL};
pub use metrics::DatabaseMetrics;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tessera_concurrency::{DispatchTurnstile, LifecycleGate, LifecycleState, OperationGuard, RevisionLedger};
use tessera_core::{ChangeEvent, DocId, TesseraError, TesseraResult};
use tessera_durability::{DurabilityMode, Journal, NullJournal, WalReader, WalWriter, WAL_FILE_NAME};
use tessera_storage::DocumentStore;
use tracing::{error, info, warn};

use crate::notify::{self, ChangeListener, DispatchFrame, ListenerRegistry, ListenerScope, ListenerToken};
use metrics::MetricsCounters;

/// Lock file placed in the data directory
pub const LOCK_FILE_NAME: &str = ".lock";

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// State guarded by the commit lock
struct CommitState {
    journal: Box<dyn Journal>,
    last_sequence: u64,
    commits_since_gc: u64,
}

/// An embedded document database
///
/// Share it between threads with the `Arc` the constructors return.
pub struct Database {
    /// Distinguishes this handle in per-thread dispatch bookkeeping
    instance: u64,
    config: TesseraConfig,
    data_dir: Option<PathBuf>,
    store: Arc<DocumentStore>,
    ledger: RevisionLedger,
    commit: Mutex<CommitState>,
    turnstile: DispatchTurnstile,
    listeners: ListenerRegistry,
    gate: LifecycleGate,
    metrics: MetricsCounters,
    /// Exclusive lock on the data directory, released on close
    lock_file: Mutex<Option<File>>,
}

impl Database {
    // ========================================================================
    // Opening
    // ========================================================================

    /// Open (or create) a persistent database in `path`
    ///
    /// Writes a default `tessera.toml` if the directory has none, then
    /// replays the journal.
    pub fn open<P: AsRef<Path>>(path: P) -> TesseraResult<Arc<Self>> {
        let data_dir = path.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let config_path = data_dir.join(CONFIG_FILE_NAME);
        TesseraConfig::write_default_if_missing(&config_path)?;
        let config = TesseraConfig::from_file(&config_path)?;
        Self::open_dir(data_dir, config)
    }

    /// Open `path` with `config`, replacing the stored `tessera.toml`
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: TesseraConfig) -> TesseraResult<Arc<Self>> {
        config.validate()?;
        let data_dir = path.as_ref();
        std::fs::create_dir_all(data_dir)?;
        config.write_to_file(&data_dir.join(CONFIG_FILE_NAME))?;
        Self::open_dir(data_dir, config)
    }

    /// In-memory database; contents are lost when it closes
    pub fn ephemeral(name: &str) -> TesseraResult<Arc<Self>> {
        Self::builder().name(name).open()
    }

    /// Builder for custom configuration
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    fn open_dir(data_dir: &Path, config: TesseraConfig) -> TesseraResult<Arc<Self>> {
        let durability = config.durability_mode()?;
        let lock_file = lock_directory(data_dir)?;

        let wal_path = data_dir.join(WAL_FILE_NAME);
        let read = WalReader::new().read_all(&wal_path)?;
        let store = DocumentStore::new();
        let stats = recovery::replay(&store, read.records)?;
        info!(
            target: "tessera::db",
            records = stats.records(),
            saves = stats.saves,
            deletes = stats.deletes,
            purges = stats.purges,
            superseded = stats.superseded,
            last_sequence = stats.last_sequence,
            "Recovery complete"
        );

        let journal: Box<dyn Journal> = if durability.requires_wal() {
            Box::new(WalWriter::resume(&wal_path, durability, read.truncate_info)?)
        } else {
            if read.truncate_info.is_some() {
                warn!(target: "tessera::db", "journal tail left in place: cache mode does not write");
            }
            Box::new(NullJournal)
        };

        Ok(Self::assemble(
            config,
            Some(data_dir.to_path_buf()),
            journal,
            store,
            stats.last_sequence,
            Some(lock_file),
        ))
    }

    pub(crate) fn in_memory(config: TesseraConfig, journal: Box<dyn Journal>) -> TesseraResult<Arc<Self>> {
        config.validate()?;
        Ok(Self::assemble(config, None, journal, DocumentStore::new(), 0, None))
    }

    fn assemble(
        config: TesseraConfig,
        data_dir: Option<PathBuf>,
        journal: Box<dyn Journal>,
        store: DocumentStore,
        last_sequence: u64,
        lock_file: Option<File>,
    ) -> Arc<Self> {
        info!(
            target: "tessera::db",
            name = %config.name,
            path = ?data_dir,
            durability = %journal.durability(),
            documents = store.live_count(),
            last_sequence,
            "Database opened"
        );
        Arc::new(Database {
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            config,
            data_dir,
            store: Arc::new(store),
            ledger: RevisionLedger::new(),
            commit: Mutex::new(CommitState {
                journal,
                last_sequence,
                commits_since_gc: 0,
            }),
            turnstile: DispatchTurnstile::starting_at(last_sequence + 1),
            listeners: ListenerRegistry::new(),
            gate: LifecycleGate::new(),
            metrics: MetricsCounters::default(),
            lock_file: Mutex::new(lock_file),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Database name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Data directory, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Active configuration
    pub fn config(&self) -> &TesseraConfig {
        &self.config
    }

    /// Durability the journal provides
    pub fn durability(&self) -> DurabilityMode {
        self.commit.lock().journal.durability()
    }

    /// Lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.gate.state()
    }

    /// True until `close()` starts
    pub fn is_open(&self) -> bool {
        self.gate.is_open()
    }

    /// Highest committed sequence
    pub fn last_sequence(&self) -> u64 {
        self.store.published_sequence()
    }

    /// Counter snapshot
    pub fn metrics(&self) -> DatabaseMetrics {
        self.metrics.snapshot(
            self.gate.active(),
            self.store.published_sequence(),
            self.store.live_count(),
        )
    }

    // ========================================================================
    // Change listeners
    // ========================================================================

    /// Register `listener` for changes in `scope`
    ///
    /// Listeners run on the writer's thread, in registration order, after
    /// the change commits and before the write returns.
    pub fn add_change_listener<L: ChangeListener>(
        &self,
        scope: ListenerScope,
        listener: L,
    ) -> TesseraResult<ListenerToken> {
        let _op = self.enter()?;
        Ok(self.listeners.add(scope, Arc::new(listener)))
    }

    /// Register `listener` for changes to one document
    pub fn add_document_change_listener<L: ChangeListener>(
        &self,
        id: impl Into<DocId>,
        listener: L,
    ) -> TesseraResult<ListenerToken> {
        self.add_change_listener(ListenerScope::document(id), listener)
    }

    /// Remove a listener; returns false if it was not registered
    ///
    /// Removal during delivery takes effect from the next event.
    pub fn remove_change_listener(&self, token: ListenerToken) -> bool {
        self.listeners.remove(token)
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Sync the journal
    pub fn flush(&self) -> TesseraResult<()> {
        let _op = self.enter()?;
        self.commit.lock().journal.sync()?;
        Ok(())
    }

    /// Close the database
    ///
    /// New operations fail with `DatabaseClosed` from the moment this is
    /// called. Returns once every in-flight operation has finished, the
    /// journal is synced and listeners are dropped. Calling it again is a
    /// no-op; calling it from inside a change listener is an
    /// `InvalidOperation`, since it would wait for itself.
    pub fn close(&self) -> TesseraResult<()> {
        if notify::is_dispatching(self.instance) {
            return Err(TesseraError::invalid_operation(
                "close() called from a change listener",
            ));
        }
        if !self.gate.begin_close() {
            self.gate.wait_closed();
            return Ok(());
        }

        info!(
            target: "tessera::db",
            name = %self.config.name,
            in_flight = self.gate.active(),
            "Closing database"
        );
        self.gate.wait_idle();

        let synced = self.commit.lock().journal.close();
        let dropped = self.listeners.clear();
        self.lock_file.lock().take();
        self.gate.finish_close();

        match &synced {
            Ok(()) => info!(
                target: "tessera::db",
                name = %self.config.name,
                last_sequence = self.store.published_sequence(),
                listeners_dropped = dropped,
                "Database closed"
            ),
            Err(e) => error!(
                target: "tessera::db",
                name = %self.config.name,
                error = %e,
                "Final journal sync failed"
            ),
        }
        synced.map_err(TesseraError::from)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn enter(&self) -> TesseraResult<OperationGuard<'_>> {
        self.gate
            .enter()
            .map_err(|_| TesseraError::database_closed(&self.config.name))
    }

    /// Deliver `event` and anything listeners commit while it is delivered
    ///
    /// Must be called exactly once for every committed sequence, or later
    /// dispatch turns never come.
    fn publish(&self, event: ChangeEvent) {
        let Some(event) = notify::defer(self.instance, event) else {
            return;
        };
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let _turn = self.turnstile.wait_turn(event.sequence);
            let frame = DispatchFrame::push(self.instance);
            let delivery = self.listeners.deliver(&event);
            self.metrics
                .record_dispatch(delivery.delivered, delivery.failures.len());
            queue.extend(frame.take_pending());
        }
    }
}

fn lock_directory(data_dir: &Path) -> TesseraResult<File> {
    let lock_path = data_dir.join(LOCK_FILE_NAME);
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&lock_path)
        .map_err(|e| TesseraError::storage_io("failed to open lock file", e))?;
    fs2::FileExt::try_lock_exclusive(&lock_file).map_err(|_| {
        TesseraError::storage(format!(
            "database at '{}' is already in use",
            data_dir.display()
        ))
    })?;
    Ok(lock_file)
}

impl Drop for Database {
    fn drop(&mut self) {
        if self.gate.is_open() {
            if let Err(e) = self.close() {
                warn!(target: "tessera::db", error = %e, "Close on drop failed");
            }
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.config.name)
            .field("path", &self.data_dir)
            .field("state", &self.gate.state())
            .field("documents", &self.store.live_count())
            .field("last_sequence", &self.store.published_sequence())
            .finish()
    }
}
