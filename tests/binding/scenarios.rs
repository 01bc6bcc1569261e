//! End-to-end Scenarios
//!
//! Whole conversations with the in-memory driver, from connecting to reading
//! the last row.

use crate::common::*;
use xapi::{HasDiagnostic, MemoryDriver, OrderBy, Session, Status, Value};

#[test]
fn add_two_documents_in_a_transaction() {
    let driver = MemoryDriver::new().with_schema("test");
    let mut session = Session::connect(&driver, "localhost", 0, "root", Some(""), None);
    assert!(session.is_valid());

    let schema = session.get_schema("test", true).unwrap();
    assert!(schema.create_collection(&mut session, "c1"));
    let coll = schema.get_collection(&mut session, "c1", true).unwrap();

    assert!(session.transaction_begin());
    let id = session.collection_add_new(&coll).unwrap();
    let stmt = session.statement_mut(id).unwrap();
    assert_eq!(stmt.add_document(r#"{"a": 1}"#), Status::Ok);
    assert_eq!(stmt.add_document(r#"{"a": 2}"#), Status::Ok);
    let affected = session.execute(id).unwrap().affected_count();
    assert!(session.transaction_commit());

    assert_eq!(affected, 2);
    assert_eq!(driver.documents("test", "c1").unwrap().len(), 2);
}

#[test]
fn select_ordered_page_until_exhausted() {
    let driver = shop_driver(30);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let items = schema.get_table(&mut session, "items", true).unwrap();

    let id = session.table_select_new(&items).unwrap();
    let stmt = session.statement_mut(id).unwrap();
    assert_eq!(stmt.set_where("id > 5"), Status::Ok);
    assert_eq!(stmt.set_limit_and_offset(10, 0), Status::Ok);
    assert_eq!(stmt.set_order_by(&[OrderBy::asc("id")]), Status::Ok);

    let res = session.execute(id).unwrap();
    let ids = uints(res, 0);
    assert_eq!(ids, (6..=15).collect::<Vec<_>>());
    assert!(res.fetch_one().is_none());
    assert!(res.error().is_none());
}

#[test]
fn document_lifecycle() {
    let driver = shop_driver(0);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let orders = schema.get_collection(&mut session, "orders", true).unwrap();

    let res = orders
        .add(
            &mut session,
            &[
                r#"{"customer": "ann", "total": 12.5, "status": "open"}"#,
                r#"{"customer": "bob", "total": 99, "status": "open"}"#,
                r#"{"customer": "cid", "total": 3, "status": "open"}"#,
            ],
        )
        .unwrap();
    let ids = res.doc_ids().to_vec();
    assert_eq!(ids.len(), 3);

    orders
        .modify_set(
            &mut session,
            Some("total > 10"),
            &[("status", xapi::Param::Value(Value::from("paid")))],
        )
        .unwrap();

    let id = session.collection_find_new(&orders).unwrap();
    let stmt = session.statement_mut(id).unwrap();
    stmt.set_where("status = :s");
    stmt.bind_named(&[("s", Value::from("paid"))]);
    stmt.set_order_by(&[OrderBy::desc("total")]);
    stmt.set_find_projection("customer");
    let res = session.execute(id).unwrap();
    let mut customers = Vec::new();
    while let Some(doc) = res.fetch_json() {
        let doc: serde_json::Value = serde_json::from_str(&doc).unwrap();
        customers.push(doc["customer"].as_str().unwrap().to_string());
    }
    assert_eq!(customers, vec!["bob", "ann"]);

    let res = orders
        .remove(&mut session, Some(&format!("_id = '{}'", ids[2])))
        .unwrap();
    assert_eq!(res.affected_count(), 1);
    assert_eq!(driver.documents(SCHEMA, "orders").unwrap().len(), 2);
}

#[test]
fn failures_never_poison_the_session() {
    let driver = shop_driver(3);
    let mut session = open(&driver);

    assert!(session.sql("SELEKT 1").is_none());
    assert!(session.error().is_some());
    assert!(session.get_schema("missing", true).is_none());

    let res = session.sql("SELECT 2 AS two").unwrap();
    let mut v = 0u64;
    assert_eq!(res.fetch_one().unwrap().get_uint(0, &mut v), Status::Ok);
    assert_eq!(v, 2);
    assert!(session.error().is_none());
    assert!(session.is_valid());
}
