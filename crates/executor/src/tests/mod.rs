//! Test modules for the executor crate.

pub mod serialization;

use crate::{ColumnType, MemoryDriver, Session, TableSpec, Value};

/// Driver with schema `test` holding `users(id, name, age)` with ten rows,
/// ids 1 to 10.
pub(crate) fn users_driver() -> MemoryDriver {
    let driver = MemoryDriver::new().with_schema("test");
    driver
        .create_table(
            "test",
            "users",
            TableSpec::new()
                .column("id", ColumnType::Uint)
                .column("name", ColumnType::String)
                .column("age", ColumnType::Sint)
                .auto_increment("id"),
        )
        .unwrap();
    let rows = (1..=10)
        .map(|i| vec![Value::Null, Value::from(format!("user{}", i)), Value::Sint(20 + i)])
        .collect();
    driver.insert_rows("test", "users", rows).unwrap();
    driver
}

/// Connected session on `driver`.
pub(crate) fn connect(driver: &MemoryDriver) -> Session {
    let session = Session::connect(driver, "localhost", 0, "root", None, None);
    assert!(session.is_valid());
    session
}
