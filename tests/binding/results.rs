//! Result and Row Tests
//!
//! Tests for reading replies:
//! - Column metadata and index errors
//! - Typed accessors and their conversions
//! - Chunked byte reads
//! - Multi-set replies and warnings

use crate::common::*;
use proptest::prelude::*;
use xapi::{
    ColumnDescriptor, ColumnType, Error, HasDiagnostic, Reply, RowSet, Status, Value, Warning,
    WarningLevel, ERROR_CODE_INDEX_OUT_OF_RANGE,
};

fn canned(driver: &xapi::MemoryDriver, query: &str, reply: Reply) {
    driver.on_sql(query, reply);
}

// ============================================================================
// Metadata
// ============================================================================

#[test]
fn table_columns_carry_table_metadata() {
    let driver = shop_driver(1);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let items = schema.get_table(&mut session, "items", true).unwrap();
    let res = items.select(&mut session, None).unwrap();

    assert_eq!(res.column_count(), Some(4));
    assert_eq!(res.column_type(0), ColumnType::Uint);
    assert_eq!(res.column_type(2), ColumnType::Double);
    assert_eq!(res.column_table(1), Some("items"));
    assert_eq!(res.column_schema(1), Some(SCHEMA));
    assert_eq!(res.column_catalog(1), None);
    assert!(res.error().is_none());
}

#[test]
fn column_index_out_of_range() {
    let driver = shop_driver(1);
    let mut session = open(&driver);
    let res = session.sql("SELECT 1").unwrap();

    assert_eq!(res.column_name(5), None);
    assert_eq!(res.error_num(), ERROR_CODE_INDEX_OUT_OF_RANGE);
    assert_eq!(res.column_type(5), ColumnType::Undefined);
    assert_eq!(res.column_length(5), 0);

    let row = res.fetch_one().unwrap();
    let mut v = 0i64;
    assert_eq!(row.get_sint(3, &mut v), Status::Error);
    assert_eq!(row.error_num(), ERROR_CODE_INDEX_OUT_OF_RANGE);
}

#[test]
fn write_results_have_no_data_set() {
    let driver = shop_driver(0);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let items = schema.get_table(&mut session, "items", true).unwrap();
    let res = items.insert(&mut session, &[("name", Value::from("x"))]).unwrap();

    assert!(!res.has_data());
    assert_eq!(res.column_count(), None);
    assert_eq!(res.error_message().unwrap(), Error::NoDataSet.to_string());
    assert_eq!(res.store_result(), None);
    assert!(res.fetch_json().is_none());
}

// ============================================================================
// Typed accessors
// ============================================================================

#[test]
fn null_fields_and_conversions() {
    let driver = shop_driver(2);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let items = schema.get_table(&mut session, "items", true).unwrap();
    let res = items
        .select_limit(&mut session, None, 1, 1, &[])
        .unwrap();
    let row = res.fetch_one().unwrap();

    // Row 2 has a NULL note.
    let mut buf = [0u8; 4];
    assert_eq!(row.get_bytes(3, 0, &mut buf), (Status::Null, 0));
    assert_eq!(row.try_uint(3).unwrap(), None);

    let mut f = 0.0f32;
    assert_eq!(row.get_float(2, &mut f), Status::Ok);
    assert_eq!(f, 3.0);

    let mut u = 0u64;
    assert_eq!(row.get_uint(1, &mut u), Status::Error);
    assert!(row.error().is_some());
    assert_eq!(row.get_uint(0, &mut u), Status::Ok);
    assert!(row.error().is_none());
    assert_eq!(u, 2);
}

#[test]
fn numeric_overflow_is_reported() {
    let driver = shop_driver(0);
    let mut session = open(&driver);
    let res = session
        .sql_param("SELECT ?, ?", &[Value::Sint(-1), Value::Double(1e300)])
        .unwrap();
    let row = res.fetch_one().unwrap();

    let mut u = 7u64;
    assert_eq!(row.get_uint(0, &mut u), Status::Error);
    assert_eq!(u, 7);
    let mut f = 0.0f32;
    assert_eq!(row.get_float(1, &mut f), Status::Error);
    assert_eq!(row.error_message().unwrap(), Error::Overflow.to_string());
}

proptest! {
    #[test]
    fn get_bytes_reassembles_any_chunking(
        data in proptest::collection::vec(any::<u8>(), 1..200),
        chunk in 1usize..64,
    ) {
        let driver = xapi::MemoryDriver::new();
        driver.on_sql(
            "SELECT blob",
            Reply::with_set(RowSet {
                columns: vec![ColumnDescriptor::new("blob", ColumnType::Bytes)],
                rows: vec![vec![Value::Bytes(data.clone())]],
            }),
        );
        let mut session = open_plain(&driver);
        let res = session.sql("SELECT blob").unwrap();
        let row = res.fetch_one().unwrap();

        let mut out = Vec::new();
        let mut buf = vec![0u8; chunk];
        loop {
            let (status, n) = row.get_bytes(0, out.len() as u64, &mut buf);
            out.extend_from_slice(&buf[..n]);
            match status {
                Status::MoreData => prop_assert_eq!(n, chunk),
                Status::Ok => break,
                other => prop_assert!(false, "unexpected status {:?}", other),
            }
        }
        prop_assert_eq!(out, data);
    }
}

fn open_plain(driver: &xapi::MemoryDriver) -> xapi::Session {
    let session = xapi::Session::connect(driver, "localhost", 0, "root", None, None);
    assert!(session.is_valid());
    session
}

#[test]
fn get_bytes_edge_cases() {
    let driver = shop_driver(1);
    let mut session = open(&driver);
    let schema = session.get_schema(SCHEMA, true).unwrap();
    let items = schema.get_table(&mut session, "items", true).unwrap();
    let res = items.select(&mut session, None).unwrap();
    let row = res.fetch_one().unwrap();

    // Row 1 has a one-byte note.
    let mut empty: [u8; 0] = [];
    assert_eq!(row.get_bytes(3, 0, &mut empty), (Status::Error, 0));
    let mut buf = [0u8; 1];
    assert_eq!(row.get_bytes(3, 0, &mut buf), (Status::MoreData, 1));
    assert_eq!(row.get_bytes(3, 1, &mut buf), (Status::Ok, 0));
    assert_eq!(row.get_bytes(3, 99, &mut buf), (Status::Ok, 0));

    let mut big = [0u8; 8];
    assert_eq!(row.get_bytes(1, 0, &mut big), (Status::Ok, 5));
    assert_eq!(&big[..5], b"item1");
}

// ============================================================================
// Multi-set replies and warnings
// ============================================================================

#[test]
fn next_result_walks_every_set() {
    let driver = shop_driver(0);
    let set = |name: &str, n: u64| RowSet {
        columns: vec![ColumnDescriptor::new(name, ColumnType::Uint)],
        rows: (0..n).map(|i| vec![Value::Uint(i)]).collect(),
    };
    canned(
        &driver,
        "CALL report()",
        Reply {
            sets: vec![set("a", 2), set("b", 0), set("c", 1)],
            ..Reply::default()
        },
    );
    let mut session = open(&driver);
    let res = session.sql("CALL report()").unwrap();

    let mut seen = Vec::new();
    loop {
        seen.push((res.column_name(0).unwrap().to_string(), uints(res, 0).len()));
        if res.next_result() == Status::Null {
            break;
        }
    }
    assert_eq!(
        seen,
        vec![("a".to_string(), 2), ("b".to_string(), 0), ("c".to_string(), 1)]
    );
    assert!(res.fetch_one().is_none());
    assert_eq!(res.next_result(), Status::Null);
}

#[test]
fn warnings_are_read_once() {
    let driver = shop_driver(0);
    canned(
        &driver,
        "DO SLEEP(0)",
        Reply {
            warnings: vec![
                Warning {
                    level: WarningLevel::Note,
                    code: 1003,
                    message: "first".into(),
                },
                Warning {
                    level: WarningLevel::Warning,
                    code: 1265,
                    message: "second".into(),
                },
            ],
            ..Reply::default()
        },
    );
    let mut session = open(&driver);
    let res = session.sql("DO SLEEP(0)").unwrap();

    assert_eq!(res.warning_count(), 2);
    assert_eq!(res.next_warning().unwrap().message, "first");
    assert_eq!(res.next_warning().unwrap().level, WarningLevel::Warning);
    assert!(res.next_warning().is_none());
    assert_eq!(res.warning_count(), 2);
}
