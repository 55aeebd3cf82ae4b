//! Close Tests
//!
//! close() refuses new work at once and returns only after in-flight
//! operations, listeners included, have finished.

use crate::common::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tesseradb::LifecycleState;

const TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn close_drains_in_flight_writers() {
    let mut test_db = TestDb::new();
    let committed = Arc::new(Mutex::new(Vec::new()));
    let started = Latch::new();

    let writer = {
        let db = Arc::clone(&test_db.db);
        let committed = Arc::clone(&committed);
        let started = Arc::clone(&started);
        thread::spawn(move || {
            for n in 0..2000 {
                match db.save(&tagged_doc("Drain").with("n", n as i64)) {
                    Ok(doc) => committed.lock().push(doc.id().cloned().unwrap()),
                    Err(e) => {
                        assert!(e.is_closed(), "unexpected error: {}", e);
                        return;
                    }
                }
                if n == 10 {
                    started.open();
                }
            }
        })
    };

    assert!(started.wait(TIMEOUT));
    test_db.close();
    assert_eq!(test_db.db.state(), LifecycleState::Closed);
    assert_eq!(test_db.db.metrics().active_operations, 0);
    writer.join().unwrap();

    test_db.reopen();
    let committed = committed.lock();
    assert!(committed.len() > 10);
    assert_eq!(test_db.db.count(), committed.len());
    for id in committed.iter() {
        assert!(test_db.db.get(id).unwrap().is_some(), "lost {}", id);
    }
}

#[test]
fn close_waits_for_a_blocked_listener() {
    let db = ephemeral("close-wait");
    let g1 = Latch::new();
    let entered = Latch::new();

    let (gate, inside) = (Arc::clone(&g1), Arc::clone(&entered));
    db.add_document_change_listener("doc1", move |_: &ChangeEvent| {
        inside.open();
        assert!(gate.wait(TIMEOUT), "G1 never opened");
    })
    .unwrap();

    let writer = {
        let db = Arc::clone(&db);
        thread::spawn(move || db.save(&Document::with_id("doc1")))
    };
    assert!(entered.wait(TIMEOUT));

    let closed = Arc::new(AtomicBool::new(false));
    let closer = {
        let db = Arc::clone(&db);
        let closed = Arc::clone(&closed);
        thread::spawn(move || {
            let result = db.close();
            closed.store(true, Ordering::SeqCst);
            result
        })
    };

    while db.state() == LifecycleState::Open {
        thread::yield_now();
    }
    assert_eq!(db.state(), LifecycleState::Closing);

    let err = db.save(&Document::with_id("doc2")).unwrap_err();
    assert!(err.is_closed());
    assert!(db.get("doc1").unwrap_err().is_closed());
    assert!(db.query(&Query::all()).unwrap_err().is_closed());

    thread::sleep(Duration::from_millis(50));
    assert!(!closed.load(Ordering::SeqCst));

    g1.open();
    let saved = writer.join().unwrap().unwrap();
    assert_eq!(saved.revision().unwrap().generation(), 1);
    closer.join().unwrap().unwrap();
    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(db.state(), LifecycleState::Closed);
    assert_eq!(db.listener_count(), 0);
}

#[test]
fn close_from_listener_is_invalid() {
    let db = ephemeral("close-in-listener");
    let outcome = Arc::new(Mutex::new(None));

    let weak = Arc::downgrade(&db);
    let sink = Arc::clone(&outcome);
    db.add_change_listener(ListenerScope::Database, move |_: &ChangeEvent| {
        if let Some(db) = weak.upgrade() {
            *sink.lock() = Some(db.close());
        }
    })
    .unwrap();

    db.save(&Document::with_id("doc1")).unwrap();

    let err = outcome.lock().take().unwrap().unwrap_err();
    assert_eq!(err.code(), 400);
    assert!(db.is_open());
    assert_eq!(db.count(), 1);
    db.close().unwrap();
}

#[test]
fn concurrent_close_calls_all_return_after_drain() {
    let db = ephemeral("close-many");
    create_docs(&db, 10, "Close");

    let shared = Arc::clone(&db);
    run_concurrent(4, move |_| {
        shared.close().unwrap();
        assert_eq!(shared.state(), LifecycleState::Closed);
    });
    assert_eq!(db.count(), 10);
}
