//! Session Tests
//!
//! Tests for connection handling and session-level operations:
//! - Connecting through parameters, URIs, option sets and config files
//! - Transactions against the in-memory driver
//! - Schema catalog operations

use crate::common::*;
use xapi::{
    get_session, get_session_from_url, ClientConfig, HasDiagnostic, MemoryDriver, Session, Value,
};

// ============================================================================
// Connecting
// ============================================================================

#[test]
fn every_constructor_reaches_the_same_server() {
    let driver = shop_driver(3).with_credentials("app", Some("pw"));

    let by_params = Session::connect(&driver, "db", 3307, "app", Some("pw"), Some(SCHEMA));
    let by_uri = Session::from_uri(&driver, "mysqlx://app:pw@db:3307/shop");
    let config = ClientConfig {
        user: "app".into(),
        password: Some("pw".into()),
        database: Some(SCHEMA.into()),
        ..ClientConfig::default()
    };
    let by_config = Session::from_options(&driver, &config.to_options().unwrap());

    for session in [&by_params, &by_uri, &by_config] {
        assert!(session.is_valid(), "{:?}", session.error_message());
        assert_eq!(session.default_schema(), Some(SCHEMA));
    }
    assert_eq!(driver.open_connections(), 3);
}

#[test]
fn get_session_reports_through_out_parameters() {
    let driver = MemoryDriver::new().with_credentials("app", None);
    let mut msg = [0u8; 128];
    let mut code = 0;

    assert!(get_session(&driver, None, 0, Some("eve"), None, None, &mut msg, &mut code).is_none());
    assert_eq!(code, 1045);
    let end = msg.iter().position(|b| *b == 0).unwrap();
    let text = std::str::from_utf8(&msg[..end]).unwrap();
    assert!(text.starts_with("Access denied for user 'eve'"), "{}", text);

    let mut code = 0;
    let session = get_session_from_url(&driver, "app@localhost", &mut msg, &mut code);
    assert!(session.is_some());
    assert_eq!(code, 0);
}

#[test]
fn offline_server_yields_invalid_session() {
    let driver = MemoryDriver::new().offline();
    let mut session = Session::from_uri(&driver, "root@nowhere:1");
    assert!(!session.is_valid());
    assert!(session.error_message().unwrap().contains("nowhere:1"));
    assert!(session.sql("SELECT 1").is_none());
    assert!(!session.transaction_begin());
}

// ============================================================================
// Transactions
// ============================================================================

#[test]
fn commit_makes_writes_visible_to_other_sessions() {
    let driver = shop_driver(0);
    let mut writer = open(&driver);
    let mut reader = open(&driver);

    let schema = writer.get_schema(SCHEMA, true).unwrap();
    let items = schema.get_table(&mut writer, "items", true).unwrap();

    assert!(writer.transaction_begin());
    items
        .insert(&mut writer, &[("name", Value::from("lamp")), ("price", Value::Double(9.5))])
        .unwrap();
    assert!(writer.transaction_commit());

    let res = items.select(&mut reader, Some("name = 'lamp'")).unwrap();
    assert_eq!(res.store_result(), Some(1));
}

#[test]
fn rollback_and_close_discard_writes() {
    let driver = shop_driver(2);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let items = schema.get_table(&mut session, "items", true).unwrap();

    assert!(session.transaction_begin());
    items.delete(&mut session, None).unwrap();
    assert!(driver.rows(SCHEMA, "items").unwrap().is_empty());
    assert!(session.transaction_rollback());
    assert_eq!(driver.rows(SCHEMA, "items").unwrap().len(), 2);

    assert!(session.transaction_begin());
    items.delete(&mut session, None).unwrap();
    drop(session);
    assert_eq!(driver.rows(SCHEMA, "items").unwrap().len(), 2);
}

#[test]
fn begin_inside_transaction_commits_first() {
    let driver = shop_driver(1);
    let mut session = open(&driver);

    assert!(session.transaction_begin());
    assert!(session.create_schema("archive"));
    assert!(session.transaction_begin());
    assert!(session.transaction_rollback());
    assert!(session.get_schema("archive", true).is_some());
}

// ============================================================================
// Catalog
// ============================================================================

#[test]
fn schema_listing_reuses_catalog_slot() {
    let driver = shop_driver(0);
    let mut session = open(&driver);
    session.create_schema("shop_archive");

    assert_eq!(session.get_schemas("shop%").unwrap().store_result(), Some(2));
    assert_eq!(session.get_schemas("").unwrap().store_result(), Some(2));
    assert_eq!(session.get_schemas("nothing%").unwrap().store_result(), Some(0));
}

#[test]
fn dropping_the_default_schema() {
    let driver = shop_driver(0);
    let mut session = open(&driver);
    assert!(session.drop_schema(SCHEMA));
    assert!(session.get_schema(SCHEMA, true).is_none());
    assert!(session.error_message().unwrap().contains("Unknown schema"));
    assert!(session.is_valid());
}
