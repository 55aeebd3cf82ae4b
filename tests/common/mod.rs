//! Shared test utilities for all integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier, Once};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
pub use tesseradb::{
    ChangeEvent, ChangeKind, ConcurrencyControl, Database, DocId, Document, DurabilityMode,
    Journal, ListenerScope, NullJournal, Predicate, Query, SelectItem, TesseraConfig,
    TesseraError, Timestamp, Value, WalRecord,
};
use tessera_durability::{DurabilityError, DurabilityResult};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to warnings only.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Create a TesseraConfig with always durability mode.
pub fn always_config() -> TesseraConfig {
    TesseraConfig {
        durability: "always".to_string(),
        ..TesseraConfig::default()
    }
}

// ============================================================================
// TestDb
// ============================================================================

/// Persistent test database in a temporary directory.
pub struct TestDb {
    pub db: Arc<Database>,
    pub dir: TempDir,
}

impl TestDb {
    /// Standard durability.
    pub fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db = Database::open(dir.path()).expect("Failed to create test database");
        TestDb { db, dir }
    }

    /// Always durability.
    pub fn new_strict() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db = Database::open_with_config(dir.path(), always_config())
            .expect("Failed to create test database");
        TestDb { db, dir }
    }

    /// Close and open the same directory again.
    pub fn reopen(&mut self) {
        self.db.close().expect("close failed");
        self.db = Database::open(self.dir.path()).expect("Failed to reopen database");
    }

    /// Close without reopening.
    pub fn close(&self) {
        self.db.close().expect("close failed");
    }

    /// Path of the journal file.
    pub fn wal_path(&self) -> PathBuf {
        self.dir.path().join("journal.wal")
    }
}

/// In-memory database for tests that don't need files.
pub fn ephemeral(name: &str) -> Arc<Database> {
    init_tracing();
    Database::ephemeral(name).expect("Failed to create ephemeral database")
}

// ============================================================================
// Documents
// ============================================================================

/// A fully populated contact document with a `tag` property.
///
/// Strings, a nested object, an array and a timestamp.
pub fn tagged_doc(tag: &str) -> Document {
    let mut address = HashMap::new();
    address.insert("street".to_string(), Value::from("1 Main street"));
    address.insert("city".to_string(), Value::from("Mountain View"));
    address.insert("state".to_string(), Value::from("CA"));

    Document::new()
        .with("tag", tag)
        .with("firstName", "Daniel")
        .with("lastName", "Tiger")
        .with("address", Value::Object(address))
        .with("phones", vec!["650-123-0001", "650-123-0002"])
        .with("updated", Timestamp::now())
}

/// Save `n` tagged documents and return their ids.
pub fn create_docs(db: &Database, n: usize, tag: &str) -> Vec<DocId> {
    (0..n)
        .map(|_| {
            db.save(&tagged_doc(tag))
                .expect("save failed")
                .id()
                .cloned()
                .expect("saved document has an id")
        })
        .collect()
}

/// Re-save every document in `ids` with `tag`, `rounds` times.
///
/// Changes the nested street and first phone each round, like a real edit.
pub fn update_docs(db: &Database, ids: &[DocId], rounds: usize, tag: &str) {
    for round in 1..=rounds {
        for id in ids {
            let mut doc = db.get(id).expect("get failed").expect("document vanished");
            doc.set("tag", tag);

            let mut address = doc
                .get("address")
                .and_then(Value::as_object)
                .cloned()
                .expect("address missing");
            address.insert("street".into(), Value::from(format!("{} street.", round)));
            doc.set("address", Value::Object(address));

            let mut phones = doc
                .get("phones")
                .and_then(Value::as_array)
                .map(<[Value]>::to_vec)
                .expect("phones missing");
            assert_eq!(phones.len(), 2);
            phones[0] = Value::from(format!("650-000-{:04}", round));
            doc.set("phones", Value::Array(phones));
            doc.set("updated", Timestamp::now());

            db.save(&doc).expect("update failed");
        }
    }
}

/// Number of live documents with `tag`, via the query engine.
pub fn count_tagged(db: &Database, tag: &str) -> usize {
    let query = Query::select([SelectItem::Id]).filter(Predicate::eq("tag", tag));
    db.query(&query).expect("query failed").count()
}

// ============================================================================
// Threads
// ============================================================================

/// Run `f(i)` on `n` threads released together; panics propagate.
pub fn run_concurrent<F>(n: usize, f: F)
where
    F: Fn(usize) + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(n));
    let f = Arc::new(f);
    let handles: Vec<_> = (0..n)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            let f = Arc::clone(&f);
            thread::spawn(move || {
                barrier.wait();
                f(i)
            })
        })
        .collect();
    for h in handles {
        h.join().expect("worker thread panicked");
    }
}

/// One-shot gate: threads wait until it is opened.
#[derive(Default)]
pub struct Latch {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Latch {
    pub fn new() -> Arc<Self> {
        Arc::new(Latch::default())
    }

    pub fn open(&self) {
        *self.open.lock() = true;
        self.cond.notify_all();
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }

    /// Wait up to `timeout`; true if the latch opened.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut open = self.open.lock();
        while !*open {
            if self.cond.wait_until(&mut open, deadline).timed_out() {
                return *open;
            }
        }
        true
    }
}

// ============================================================================
// Fault injection
// ============================================================================

/// Journal that records appends and fails while its switch is on.
#[derive(Clone, Default)]
pub struct FlakyJournal {
    pub failing: Arc<AtomicBool>,
    pub records: Arc<Mutex<Vec<WalRecord>>>,
}

impl FlakyJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }
}

impl Journal for FlakyJournal {
    fn append(&mut self, record: &WalRecord) -> DurabilityResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DurabilityError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected disk failure",
            )));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn sync(&mut self) -> DurabilityResult<()> {
        Ok(())
    }

    fn durability(&self) -> DurabilityMode {
        DurabilityMode::Standard
    }
}

// ============================================================================
// Files
// ============================================================================

pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

pub fn truncate_file(path: &Path, len: u64) {
    let f = OpenOptions::new().write(true).open(path).expect("open for truncate");
    f.set_len(len).expect("truncate");
}

pub fn append_garbage(path: &Path, bytes: &[u8]) {
    use std::io::Write;
    let mut f = OpenOptions::new().append(true).open(path).expect("open for append");
    f.write_all(bytes).expect("append garbage");
}
