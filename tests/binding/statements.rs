//! Statement Tests
//!
//! Tests for building and executing statements through the session:
//! - Raw SQL with positional parameters
//! - Table CRUD with named parameters, ordering and paging
//! - Collection CRUD with projections and modify operations
//! - Refusal of clauses the driver does not support

use crate::common::*;
use xapi::{HasDiagnostic, OrderBy, Param, Status, Value};

// ============================================================================
// Raw SQL
// ============================================================================

#[test]
fn sql_statement_rebinds_between_runs() {
    let driver = shop_driver(0);
    let mut session = open(&driver);
    let id = session.sql_new("SELECT ? + 1 AS next").unwrap();

    for n in [1u64, 41] {
        let stmt = session.statement_mut(id).unwrap();
        assert_eq!(stmt.bind(&[Value::Uint(n)]), Status::Ok);
        let res = session.execute(id).unwrap();
        assert_eq!(res.column_name(0), Some("next"));
        assert_eq!(uints(res, 0), vec![n + 1]);
    }
}

#[test]
fn second_bind_replaces_the_first_before_execute() {
    let driver = shop_driver(0);
    let mut session = open(&driver);
    let id = session.sql_new("SELECT ?").unwrap();

    let stmt = session.statement_mut(id).unwrap();
    assert_eq!(stmt.bind(&[Value::Uint(1), Value::Uint(2)]), Status::Ok);
    assert_eq!(stmt.bind(&[Value::Uint(3)]), Status::Ok);

    let res = session.execute(id).unwrap();
    assert_eq!(res.column_count(), Some(1));
    assert_eq!(uints(res, 0), vec![3]);
}

#[test]
fn second_named_bind_drops_earlier_names() {
    let driver = shop_driver(4);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let items = schema.get_table(&mut session, "items", true).unwrap();

    let id = session.table_select_new(&items).unwrap();
    let stmt = session.statement_mut(id).unwrap();
    stmt.set_where("price > :floor");
    stmt.set_order_by(&[OrderBy::asc("id")]);
    assert_eq!(
        stmt.bind_named(&[("ceiling", Value::Double(100.0)), ("cap", Value::Sint(1))]),
        Status::Ok
    );
    assert_eq!(stmt.bind_named(&[("floor", Value::Double(4.0))]), Status::Ok);

    let params = &stmt.operation().criteria().unwrap().params;
    assert_eq!(params.keys().collect::<Vec<_>>(), vec!["floor"]);
    assert_eq!(params["floor"], Value::Double(4.0));

    let res = session.execute(id).unwrap();
    assert_eq!(uints(res, 0), vec![3, 4]);
}

#[test]
fn unbound_placeholder_fails_on_execute() {
    let driver = shop_driver(0);
    let mut session = open(&driver);
    let id = session.sql_new("SELECT ?, ?").unwrap();
    session.statement_mut(id).unwrap().bind(&[Value::Sint(1)]);
    assert!(session.execute(id).is_none());
    assert_eq!(session.statement(id).unwrap().error_num(), 5154);
}

// ============================================================================
// Tables
// ============================================================================

#[test]
fn insert_many_rows_in_one_statement() {
    let driver = shop_driver(0);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let items = schema.get_table(&mut session, "items", true).unwrap();

    let id = session.table_insert_new(&items).unwrap();
    let stmt = session.statement_mut(id).unwrap();
    assert_eq!(stmt.set_insert_columns(&["name", "price"]), Status::Ok);
    assert_eq!(stmt.set_insert_row(&[Value::from("x"), Value::Double(0.5)]), Status::Ok);
    // A second payload call replaces the first.
    let rows = vec![
        vec![Value::from("a"), Value::Double(1.0)],
        vec![Value::from("b"), Value::Double(2.0)],
    ];
    assert_eq!(stmt.set_insert_rows(rows), Status::Ok);

    let res = session.execute(id).unwrap();
    assert_eq!(res.affected_count(), 2);
    assert_eq!(res.auto_increment_value(), 1);
    assert_eq!(driver.rows(SCHEMA, "items").unwrap().len(), 2);
}

#[test]
fn insert_unknown_column_is_a_server_error() {
    let driver = shop_driver(0);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let items = schema.get_table(&mut session, "items", true).unwrap();

    assert!(items.insert(&mut session, &[("colour", Value::from("red"))]).is_none());
    assert_eq!(items.error_num(), 1054);
    assert!(driver.rows(SCHEMA, "items").unwrap().is_empty());
}

#[test]
fn update_with_named_parameters() {
    let driver = shop_driver(6);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let items = schema.get_table(&mut session, "items", true).unwrap();

    let id = session.table_update_new(&items).unwrap();
    let stmt = session.statement_mut(id).unwrap();
    stmt.set_where("price > :floor");
    stmt.bind_named(&[("floor", Value::Double(6.0))]);
    stmt.set_update_values(&[("price", Param::expr("price * 2")), ("note", Param::Value(Value::Null))]);
    assert!(!stmt.has_clause_error());

    assert_eq!(session.execute(id).unwrap().affected_count(), 2);

    let res = items
        .select_limit(&mut session, Some("price > 10"), 10, 0, &[OrderBy::asc("id")])
        .unwrap();
    assert_eq!(uints(res, 0), vec![5, 6]);
}

#[test]
fn select_projection_with_aliases() {
    let driver = shop_driver(3);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let items = schema.get_table(&mut session, "items", true).unwrap();

    let id = session.table_select_new(&items).unwrap();
    let stmt = session.statement_mut(id).unwrap();
    assert_eq!(stmt.set_items(&["name AS label", "price * 2 AS double_price"]), Status::Ok);
    assert_eq!(stmt.set_order_by(&[OrderBy::desc("id")]), Status::Ok);

    let res = session.execute(id).unwrap();
    assert_eq!(res.column_count(), Some(2));
    assert_eq!(res.column_name(0), Some("label"));
    assert_eq!(res.column_original_name(0), Some("name"));
    assert_eq!(res.column_name(1), Some("double_price"));

    let row = res.fetch_one().unwrap();
    assert_eq!(row.value(0).unwrap().as_str(), Some("item3"));
    let mut d = 0.0;
    assert_eq!(row.get_double(1, &mut d), Status::Ok);
    assert_eq!(d, 9.0);
}

#[test]
fn grouping_is_not_supported_by_memory_driver() {
    let driver = shop_driver(3);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let items = schema.get_table(&mut session, "items", true).unwrap();

    let id = session.table_select_new(&items).unwrap();
    let stmt = session.statement_mut(id).unwrap();
    assert_eq!(stmt.set_group_by(&["name"]), Status::Ok);
    assert_eq!(stmt.set_having("price > 1"), Status::Ok);
    assert!(session.execute(id).is_none());
    assert_eq!(session.statement(id).unwrap().error_num(), 1235);
}

// ============================================================================
// Collections
// ============================================================================

#[test]
fn find_with_projection_and_binds() {
    let driver = shop_driver(0);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let orders = schema.get_collection(&mut session, "orders", true).unwrap();
    orders
        .add(
            &mut session,
            &[
                r#"{"_id": "o1", "customer": {"name": "Ann"}, "total": 40}"#,
                r#"{"_id": "o2", "customer": {"name": "Bob"}, "total": 15}"#,
            ],
        )
        .unwrap();

    let id = session.collection_find_new(&orders).unwrap();
    let stmt = session.statement_mut(id).unwrap();
    stmt.set_where("total >= :min");
    stmt.bind_named(&[("min", Value::Sint(20))]);
    stmt.set_items(&["$.customer.name AS who", "total"]);

    let res = session.execute(id).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&res.fetch_json().unwrap()).unwrap();
    assert_eq!(doc, serde_json::json!({"who": "Ann", "total": 40}));
    assert!(res.fetch_json().is_none());
    assert!(res.error().is_none());
}

#[test]
fn modify_array_operations() {
    let driver = shop_driver(0);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let orders = schema.get_collection(&mut session, "orders", true).unwrap();
    orders
        .add(&mut session, &[r#"{"_id": "o1", "lines": ["a", "b"]}"#])
        .unwrap();

    let id = session.collection_modify_new(&orders).unwrap();
    let stmt = session.statement_mut(id).unwrap();
    stmt.set_where("_id = 'o1'");
    assert_eq!(
        stmt.modify_array_append(&[("lines", Param::Value(Value::from("c")))]),
        Status::Ok
    );
    assert_eq!(session.execute(id).unwrap().affected_count(), 1);

    let stmt = session.statement_mut(id).unwrap();
    assert_eq!(stmt.modify_array_delete(&["lines[0]"]), Status::Ok);
    session.execute(id).unwrap();

    let stmt = session.statement_mut(id).unwrap();
    assert_eq!(
        stmt.modify_array_insert(&[("lines[0]", Param::Value(Value::from("z")))]),
        Status::Ok
    );
    session.execute(id).unwrap();

    let docs = driver.documents(SCHEMA, "orders").unwrap();
    assert_eq!(docs[0].as_json()["lines"], serde_json::json!(["z", "b", "c"]));
}

#[test]
fn remove_honours_order_and_limit() {
    let driver = shop_driver(0);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let orders = schema.get_collection(&mut session, "orders", true).unwrap();
    orders
        .add(
            &mut session,
            &[r#"{"n": 3}"#, r#"{"n": 1}"#, r#"{"n": 2}"#],
        )
        .unwrap();

    let id = session.collection_remove_new(&orders).unwrap();
    let stmt = session.statement_mut(id).unwrap();
    stmt.set_order_by(&[OrderBy::desc("n")]);
    stmt.set_limit_and_offset(2, 0);
    assert_eq!(session.execute(id).unwrap().affected_count(), 2);

    let docs = driver.documents(SCHEMA, "orders").unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].as_json()["n"], 1);
}

#[test]
fn statements_are_independent() {
    let driver = shop_driver(4);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let items = schema.get_table(&mut session, "items", true).unwrap();

    let cheap = session.table_select_new(&items).unwrap();
    let dear = session.table_select_new(&items).unwrap();
    session.statement_mut(cheap).unwrap().set_where("price < 3");
    session.statement_mut(dear).unwrap().set_where("price >= 3");

    session.execute(cheap).unwrap();
    session.execute(dear).unwrap();
    session.free(dear);

    assert_eq!(uints(session.result_mut(cheap).unwrap(), 0), vec![1]);
    assert!(session.result_mut(dear).is_none());
    assert_eq!(session.statement_count(), 1);
}
