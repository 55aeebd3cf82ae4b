//! Journal failures.
//!
//! A failed append aborts that one mutation: nothing becomes visible, no
//! sequence is used, no listener hears of it, and earlier state stays.

use crate::common::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tessera_durability::{
    DurabilityError, DurabilityMode, DurabilityResult, Journal, WalRecord, WalWriter, WAL_FILE_NAME,
};
use tesseradb::ErrorKind;

fn flaky_db() -> (Arc<Database>, FlakyJournal, Arc<Mutex<Vec<u64>>>) {
    init_tracing();
    let journal = FlakyJournal::new();
    let db = Database::builder()
        .name("flaky")
        .journal(Box::new(journal.clone()))
        .open()
        .unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    db.add_change_listener(ListenerScope::Database, move |event: &ChangeEvent| {
        sink.lock().push(event.sequence)
    })
    .unwrap();
    (db, journal, events)
}

#[test]
fn failed_update_keeps_previous_revision() {
    let (db, journal, events) = flaky_db();
    let saved = db.save(&Document::with_id("doc1").with("n", 1)).unwrap();

    journal.fail(true);
    let err = db.save(&saved.clone().with("n", 2)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageFailure);
    assert_eq!(err.code(), 500);
    assert!(err.is_retryable());

    let current = db.get("doc1").unwrap().unwrap();
    assert_eq!(current, saved);
    assert_eq!(db.last_sequence(), 1);
    assert_eq!(*events.lock(), vec![1]);

    journal.fail(false);
    let retried = db.save(&saved.with("n", 2)).unwrap();
    assert_eq!(retried.sequence(), 2);
    assert_eq!(retried.revision().unwrap().generation(), 2);
    assert_eq!(*events.lock(), vec![1, 2]);
    assert_eq!(journal.records.lock().len(), 2);
}

#[test]
fn failed_create_delete_and_purge_leave_no_trace() {
    let (db, journal, events) = flaky_db();
    let doc = db.save(&Document::with_id("doc1")).unwrap();

    journal.fail(true);
    assert!(db.save(&Document::with_id("doc2")).is_err());
    assert!(db.delete(&doc).is_err());
    assert!(db.purge(&doc).is_err());

    assert!(db.get("doc2").unwrap().is_none());
    assert_eq!(db.get("doc1").unwrap().unwrap(), doc);
    assert_eq!(db.count(), 1);
    assert_eq!(*events.lock(), vec![1]);

    let m = db.metrics();
    assert_eq!(m.storage_failures, 3);
    assert_eq!(m.saves, 1);
    assert_eq!(m.deletes, 0);
    assert_eq!(m.purges, 0);
    assert_eq!(journal.records.lock().len(), 1);
}

#[test]
fn failures_under_concurrency_never_leave_gaps() {
    let (db, journal, events) = flaky_db();
    let shared = Arc::clone(&db);
    let switch = journal.clone();
    run_concurrent(4, move |i| {
        for n in 0..50 {
            if i == 0 && n % 10 == 0 {
                switch.fail(n % 20 == 0);
            }
            let _ = shared.save(&tagged_doc("Flaky").with("n", n as i64));
        }
    });
    journal.fail(false);

    let committed = journal.records.lock().len() as u64;
    assert_eq!(db.last_sequence(), committed);
    assert_eq!(db.count() as u64, committed);
    assert_eq!(*events.lock(), (1..=committed).collect::<Vec<_>>());
    assert_eq!(db.metrics().storage_failures + committed, 200);
}

/// Real journal file whose appends can report failure after the bytes land
struct LateFailingJournal {
    inner: WalWriter,
    failing: Arc<AtomicBool>,
}

impl Journal for LateFailingJournal {
    fn append(&mut self, record: &WalRecord) -> DurabilityResult<()> {
        self.inner.append(record)?;
        if self.failing.load(Ordering::SeqCst) {
            return Err(DurabilityError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "fsync failed",
            )));
        }
        Ok(())
    }

    fn sync(&mut self) -> DurabilityResult<()> {
        self.inner.sync()
    }

    fn close(&mut self) -> DurabilityResult<()> {
        self.inner.close()
    }

    fn durability(&self) -> DurabilityMode {
        self.inner.durability()
    }
}

#[test]
fn append_failing_after_write_still_reopens() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let failing = Arc::new(AtomicBool::new(false));
    let journal = LateFailingJournal {
        inner: WalWriter::open(&dir.path().join(WAL_FILE_NAME), DurabilityMode::Always).unwrap(),
        failing: Arc::clone(&failing),
    };
    let db = Database::builder()
        .name("late")
        .journal(Box::new(journal))
        .open()
        .unwrap();

    db.save(&Document::with_id("a")).unwrap();
    failing.store(true, Ordering::SeqCst);
    let err = db.save(&Document::with_id("b")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageFailure);
    failing.store(false, Ordering::SeqCst);
    let c = db.save(&Document::with_id("c")).unwrap();
    assert_eq!(c.sequence(), 2);
    db.close().unwrap();

    let db = Database::open(dir.path()).unwrap();
    assert!(db.get("a").unwrap().is_some());
    assert!(db.get("b").unwrap().is_none());
    assert_eq!(db.get("c").unwrap().unwrap().sequence(), 2);
    assert_eq!(db.last_sequence(), 2);
    assert_eq!(db.save(&Document::with_id("d")).unwrap().sequence(), 3);
}
