//! Listener registration and delivery on one thread.

use crate::common::*;
use parking_lot::Mutex;
use std::sync::Arc;
use tesseradb::{ChangeListener, ListenerToken};

fn recorder(db: &Database, scope: ListenerScope) -> (ListenerToken, Arc<Mutex<Vec<ChangeEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let token = db
        .add_change_listener(scope, move |event: &ChangeEvent| sink.lock().push(event.clone()))
        .unwrap();
    (token, events)
}

#[test]
fn every_mutation_emits_one_event() {
    let db = ephemeral("events");
    let (_, events) = recorder(&db, ListenerScope::Database);

    let doc = db.save(&Document::with_id("doc1")).unwrap();
    let doc = db.save(&doc).unwrap();
    db.delete(&doc).unwrap();
    db.delete(&doc).unwrap();
    db.purge(&doc).unwrap();
    let _ = db.purge(&doc);

    let events = events.lock();
    let summary: Vec<(u64, ChangeKind, u64)> = events
        .iter()
        .map(|e| (e.sequence, e.kind, e.revision.generation()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (1, ChangeKind::Created, 1),
            (2, ChangeKind::Updated, 2),
            (3, ChangeKind::Deleted, 3),
            (4, ChangeKind::Purged, 3),
        ]
    );
    assert!(events.iter().all(|e| e.doc_id.as_str() == "doc1"));
}

#[test]
fn document_scope_filters_by_id() {
    let db = ephemeral("scope");
    let (_, doc1) = recorder(&db, ListenerScope::document("doc1"));
    let (_, all) = recorder(&db, ListenerScope::Database);

    db.save(&Document::with_id("doc1")).unwrap();
    db.save(&Document::with_id("doc2")).unwrap();
    db.save(&Document::with_id("doc1")).unwrap();

    assert_eq!(doc1.lock().iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(all.lock().len(), 3);
}

#[test]
fn removed_listener_stops_receiving() {
    let db = ephemeral("remove");
    let (token, events) = recorder(&db, ListenerScope::Database);
    assert_eq!(db.listener_count(), 1);

    db.save(&Document::with_id("a")).unwrap();
    assert!(db.remove_change_listener(token));
    assert!(!db.remove_change_listener(token));
    db.save(&Document::with_id("b")).unwrap();

    assert_eq!(events.lock().len(), 1);
    assert_eq!(db.listener_count(), 0);
}

#[test]
fn listeners_run_in_registration_order() {
    let db = ephemeral("registration");
    let order = Arc::new(Mutex::new(Vec::new()));
    for n in 0..3 {
        let order = Arc::clone(&order);
        db.add_change_listener(ListenerScope::Database, move |_: &ChangeEvent| order.lock().push(n))
            .unwrap();
    }
    db.save(&Document::with_id("doc1")).unwrap();
    assert_eq!(*order.lock(), vec![0, 1, 2]);
}

#[test]
fn panicking_listener_does_not_fail_the_write() {
    let db = ephemeral("panic");
    db.add_change_listener(ListenerScope::Database, |_: &ChangeEvent| panic!("boom"))
        .unwrap();
    let (_, events) = recorder(&db, ListenerScope::Database);

    let saved = db.save(&Document::with_id("doc1")).unwrap();
    assert_eq!(saved.revision().unwrap().generation(), 1);
    assert_eq!(events.lock().len(), 1);

    let m = db.metrics();
    assert_eq!(m.listener_failures, 1);
    assert_eq!(m.events_dispatched, 1);
    assert!((m.listener_failure_rate() - 0.5).abs() < f64::EPSILON);
}

struct Counter(Mutex<usize>);

impl ChangeListener for Counter {
    fn on_change(&self, _event: &ChangeEvent) {
        *self.0.lock() += 1;
    }
}

#[test]
fn trait_objects_can_listen() {
    let db = ephemeral("trait");
    let counter = Arc::new(Counter(Mutex::new(0)));

    struct Shared(Arc<Counter>);
    impl ChangeListener for Shared {
        fn on_change(&self, event: &ChangeEvent) {
            self.0.on_change(event)
        }
    }

    db.add_document_change_listener("doc1", Shared(Arc::clone(&counter)))
        .unwrap();
    db.save(&Document::with_id("doc1")).unwrap();
    db.save(&Document::with_id("doc2")).unwrap();
    assert_eq!(*counter.0.lock(), 1);
}

#[test]
fn listener_write_is_delivered_after_the_current_event() {
    let db = ephemeral("nested");
    let (_, events) = recorder(&db, ListenerScope::Database);

    let weak = Arc::downgrade(&db);
    db.add_document_change_listener("trigger", move |event: &ChangeEvent| {
        if let Some(db) = weak.upgrade() {
            let audit = Document::with_id(format!("audit-{}", event.sequence))
                .with("kind", event.kind.to_string());
            db.save(&audit).unwrap();
        }
    })
    .unwrap();

    db.save(&Document::with_id("trigger")).unwrap();

    let seen: Vec<(u64, String)> = events
        .lock()
        .iter()
        .map(|e| (e.sequence, e.doc_id.to_string()))
        .collect();
    assert_eq!(
        seen,
        vec![(1, "trigger".to_string()), (2, "audit-1".to_string())]
    );
    let audit = db.get("audit-1").unwrap().unwrap();
    assert_eq!(audit.get_str("kind"), Some("created"));
}

#[test]
fn closed_database_refuses_listeners() {
    let db = ephemeral("closed");
    recorder(&db, ListenerScope::Database);
    db.close().unwrap();

    let err = db
        .add_change_listener(ListenerScope::Database, |_: &ChangeEvent| {})
        .unwrap_err();
    assert!(err.is_closed());
    assert_eq!(err.code(), 503);
    assert_eq!(db.listener_count(), 0);
}
