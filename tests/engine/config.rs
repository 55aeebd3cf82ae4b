//! Opening, configuration and lifecycle.

use crate::common::*;
use std::fs;
use tesseradb::{DatabaseBuilder, LifecycleState};

#[test]
fn open_writes_a_default_config() {
    let test_db = TestDb::new();
    let config_path = test_db.dir.path().join("tessera.toml");
    assert!(config_path.exists());
    assert_eq!(test_db.db.config(), &TesseraConfig::default());
    assert_eq!(test_db.db.durability(), DurabilityMode::Standard);
    assert_eq!(test_db.db.path(), Some(test_db.dir.path()));
}

#[test]
fn edited_config_is_honored_on_reopen() {
    let mut test_db = TestDb::new();
    test_db.db.save(&Document::with_id("doc1")).unwrap();
    test_db.close();

    let config_path = test_db.dir.path().join("tessera.toml");
    fs::write(&config_path, "name = \"contacts\"\ndurability = \"always\"\n").unwrap();
    test_db.db = Database::open(test_db.dir.path()).unwrap();

    assert_eq!(test_db.db.name(), "contacts");
    assert_eq!(test_db.db.durability(), DurabilityMode::Always);
    assert_eq!(test_db.db.config().gc_interval, 1024);
    assert!(test_db.db.get("doc1").unwrap().is_some());
}

#[test]
fn invalid_config_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("tessera.toml"), "durability = \"sometimes\"\n").unwrap();
    let err = Database::open(dir.path()).unwrap_err();
    assert_eq!(err.code(), 400);
    assert!(err.to_string().contains("sometimes"));
}

#[test]
fn builder_overrides_stored_settings() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = Database::builder()
            .path(dir.path())
            .name("first")
            .gc_interval(8)
            .open()
            .unwrap();
        assert_eq!(db.config().gc_interval, 8);
        db.close().unwrap();
    }

    let db = Database::builder()
        .path(dir.path())
        .durability(DurabilityMode::Always)
        .open()
        .unwrap();
    assert_eq!(db.name(), "first");
    assert_eq!(db.config().gc_interval, 8);
    assert_eq!(db.durability(), DurabilityMode::Always);
}

#[test]
fn builder_rejects_path_with_custom_journal() {
    let dir = tempfile::tempdir().unwrap();
    let err = DatabaseBuilder::new()
        .path(dir.path())
        .journal(Box::new(NullJournal))
        .open()
        .unwrap_err();
    assert_eq!(err.code(), 400);
}

#[test]
fn ephemeral_database_has_no_files() {
    let db = ephemeral("scratch");
    assert_eq!(db.name(), "scratch");
    assert!(db.path().is_none());
    db.save(&Document::with_id("doc1")).unwrap();
    db.flush().unwrap();
    db.close().unwrap();
    assert_eq!(db.state(), LifecycleState::Closed);
}

#[test]
fn directory_is_exclusive_while_open() {
    let test_db = TestDb::new();
    let err = Database::open(test_db.dir.path()).unwrap_err();
    assert_eq!(err.code(), 500);
    assert!(err.to_string().contains("already in use"));

    test_db.close();
    let again = Database::open(test_db.dir.path()).unwrap();
    assert!(again.is_open());
}

#[test]
fn closed_database_reports_closed_everywhere() {
    let db = ephemeral("closed");
    let doc = db.save(&Document::with_id("doc1")).unwrap();
    db.close().unwrap();
    db.close().unwrap();

    assert!(db.save(&doc).unwrap_err().is_closed());
    assert!(db.delete(&doc).unwrap_err().is_closed());
    assert!(db.purge(&doc).unwrap_err().is_closed());
    assert!(db.get("doc1").unwrap_err().is_closed());
    assert!(db.query(&Query::all()).unwrap_err().is_closed());
    assert!(db.explain(&Query::all()).unwrap_err().is_closed());
    assert!(db.flush().unwrap_err().is_closed());

    let err = db.save(&doc).unwrap_err();
    assert_eq!(err.code(), 503);
    assert_eq!(err.to_string(), "database 'closed' is closed");
    assert_eq!(db.count(), 1);
}
