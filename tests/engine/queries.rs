//! Queries, projections and plans.

use crate::common::*;
use tesseradb::{FieldRef, QueryRow};

fn ids(rows: impl Iterator<Item = QueryRow>) -> Vec<String> {
    rows.map(|r| r.id().to_string()).collect()
}

#[test]
fn equality_filter_selects_matching_live_documents() {
    let db = ephemeral("filter");
    let red = create_docs(&db, 3, "red");
    create_docs(&db, 2, "blue");
    db.delete(&Document::with_id(&red[0])).unwrap();

    let query = Query::select([SelectItem::Id]).filter(Predicate::eq("tag", "red"));
    let found = ids(db.query(&query).unwrap());
    assert_eq!(found, vec![red[1].to_string(), red[2].to_string()]);
}

#[test]
fn nested_paths_and_conjunctions() {
    let db = ephemeral("nested");
    db.save(&tagged_doc("a").with("n", 1)).unwrap();
    db.save(&tagged_doc("a").with("n", 2)).unwrap();
    db.save(&tagged_doc("b").with("n", 1)).unwrap();

    let query = Query::all()
        .filter(Predicate::eq("address.city", "Mountain View"))
        .filter(Predicate::eq("tag", "a"))
        .filter(Predicate::eq("n", 1));
    let rows: Vec<QueryRow> = db.query(&query).unwrap().collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("n").and_then(Value::as_int), Some(1));
}

#[test]
fn comparisons_are_strict() {
    let db = ephemeral("strict");
    db.save(&Document::with_id("int").with("v", 1)).unwrap();
    db.save(&Document::with_id("float").with("v", 1.0)).unwrap();
    db.save(&Document::with_id("null").with("v", Value::Null)).unwrap();
    db.save(&Document::with_id("none")).unwrap();

    let found = |value: Value| ids(db.query(&Query::all().filter(Predicate::eq("v", value))).unwrap());
    assert_eq!(found(Value::from(1)), vec!["int"]);
    assert_eq!(found(Value::from(1.0)), vec!["float"]);
    assert_eq!(found(Value::Null), vec!["null"]);
    assert!(found(Value::from("1")).is_empty());
}

#[test]
fn projection_shapes_rows() {
    let db = ephemeral("project");
    let saved = db.save(&Document::with_id("doc1").with("tag", "x").with("n", 7)).unwrap();

    let query = Query::select([
        SelectItem::Id,
        SelectItem::Revision,
        SelectItem::field("tag"),
        SelectItem::field("missing"),
    ]);
    let row = db.query(&query).unwrap().next().unwrap();
    assert_eq!(row.get_str("_id"), Some("doc1"));
    assert_eq!(row.get_str("_rev"), Some(saved.revision().unwrap().to_string().as_str()));
    assert_eq!(row.get_str("tag"), Some("x"));
    assert_eq!(row.get("missing"), Some(&Value::Null));
    assert_eq!(row.len(), 4);

    let all = db.query(&Query::all()).unwrap().next().unwrap();
    let names: Vec<&str> = all.columns().iter().map(|(c, _)| c.as_str()).collect();
    assert_eq!(names, vec!["n", "tag"]);
    assert_eq!(all.to_json(), serde_json::json!({"n": 7, "tag": "x"}));
}

#[test]
fn limit_stops_early() {
    let db = ephemeral("limit");
    create_docs(&db, 10, "many");
    let query = Query::select([SelectItem::Id])
        .filter(Predicate::eq("tag", "many"))
        .limit(3);
    let rows = db.query(&query).unwrap();
    assert_eq!(rows.size_hint().1, Some(3));
    assert_eq!(rows.count(), 3);
}

#[test]
fn result_set_is_lazy_and_pinned() {
    let db = ephemeral("pinned");
    let created = create_docs(&db, 3, "pin");
    let mut rows = db
        .query(&Query::select([SelectItem::Id]).filter(Predicate::eq("tag", "pin")))
        .unwrap();
    assert_eq!(rows.snapshot_sequence(), 3);

    let first = rows.next().unwrap();
    db.purge_id(&created[1]).unwrap();
    create_docs(&db, 2, "pin");

    let rest = ids(rows);
    assert_eq!(first.id(), &created[0]);
    assert_eq!(rest, vec![created[1].to_string(), created[2].to_string()]);
    assert_eq!(count_tagged(&db, "pin"), 4);
}

#[test]
fn id_lookup_uses_the_primary_key() {
    let db = ephemeral("pk");
    create_docs(&db, 5, "pk");
    db.save(&tagged_doc("pk").with("x", 1)).unwrap();
    db.save(&Document::with_id("doc1").with("tag", "pk")).unwrap();

    let query = Query::select([SelectItem::Id, SelectItem::field("tag")])
        .filter(Predicate::id_eq("doc1").and(Predicate::eq("tag", "pk")));
    let plan = db.explain(&query).unwrap();
    assert_eq!(
        plan,
        "SEARCH documents USING PRIMARY KEY (_id = 'doc1')\n\
         FILTER _id = 'doc1' AND tag = 'pk'\n\
         PROJECT _id, tag"
    );
    assert_eq!(ids(db.query(&query).unwrap()), vec!["doc1"]);

    let by_field = Query::all().filter(Predicate::eq(FieldRef::Id, "nope"));
    assert_eq!(db.query(&by_field).unwrap().count(), 0);
}

#[test]
fn scan_plan_lists_every_step() {
    let db = ephemeral("scan");
    let query = Query::select([SelectItem::Id])
        .filter(Predicate::eq("tag", "it's"))
        .limit(5);
    assert_eq!(
        db.explain(&query).unwrap(),
        "SCAN documents\nFILTER tag = 'it''s'\nPROJECT _id\nLIMIT 5"
    );
    assert_eq!(db.explain(&query).unwrap(), query.explain());
}
