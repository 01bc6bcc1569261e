//! Common test utilities for binding tests

use xapi::{ColumnType, MemoryDriver, Session, TableSpec, Value};

/// Schema used by every fixture.
pub const SCHEMA: &str = "shop";

/// Driver with schema `shop` holding `items(id, name, price, note)` with
/// `count` rows and an empty `orders` collection.
pub fn shop_driver(count: u64) -> MemoryDriver {
    let driver = MemoryDriver::new().with_schema(SCHEMA);
    driver
        .create_table(
            SCHEMA,
            "items",
            TableSpec::new()
                .column("id", ColumnType::Uint)
                .column("name", ColumnType::String)
                .column("price", ColumnType::Double)
                .column("note", ColumnType::Bytes)
                .auto_increment("id"),
        )
        .unwrap();
    let rows = (1..=count)
        .map(|i| {
            vec![
                Value::Null,
                Value::from(format!("item{}", i)),
                Value::Double(i as f64 * 1.5),
                if i % 2 == 0 { Value::Null } else { Value::from(vec![b'n'; i as usize]) },
            ]
        })
        .collect();
    driver.insert_rows(SCHEMA, "items", rows).unwrap();

    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    assert!(schema.create_collection(&mut session, "orders"));
    driver
}

/// Connected session with `shop` as default schema.
pub fn open(driver: &MemoryDriver) -> Session {
    let session = Session::connect(driver, "localhost", 0, "root", None, Some(SCHEMA));
    assert!(session.is_valid(), "connect failed");
    session
}

/// Drain the unsigned column `col` of every remaining row.
#[allow(dead_code)]
pub fn uints(res: &mut xapi::QueryResult, col: u32) -> Vec<u64> {
    let mut out = Vec::new();
    while let Some(row) = res.fetch_one() {
        let mut v = 0;
        assert_eq!(row.get_uint(col, &mut v), xapi::Status::Ok);
        out.push(v);
    }
    out
}
