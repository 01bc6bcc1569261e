//! # xapi executor
//!
//! Client binding layer for a document/relational database server speaking
//! the X protocol. The binding assembles statements from typed clauses,
//! hands them to an external [`Driver`] and exposes the replies through
//! cursor-style result and row accessors.
//!
//! ## Quick Start
//!
//! ```text
//! use xapi_executor::{MemoryDriver, Session, Status};
//!
//! let driver = MemoryDriver::new().with_schema("test");
//! let mut session = Session::connect(&driver, "localhost", 0, "root", None, None);
//!
//! let schema = session.get_schema("test", true).unwrap();
//! schema.create_collection(&mut session, "people");
//! let people = schema.get_collection(&mut session, "people", true).unwrap();
//!
//! people.add(&mut session, &[r#"{"name": "Ann", "age": 31}"#]);
//! let res = people.find(&mut session, Some("age > 30")).unwrap();
//! while let Some(doc) = res.fetch_json() {
//!     println!("{}", doc);
//! }
//! ```
//!
//! ## Error Reporting
//!
//! Every handle carries a diagnostic slot (see [`HasDiagnostic`]). Calls
//! return a sentinel on failure (`None`, `false` or [`Status::Error`]) and
//! leave the error's code and message in the slot of the handle they were
//! called on. A successful call clears the slot.
//!
//! | Handle | Created by |
//! |--------|------------|
//! | [`SessionOptions`] | [`SessionOptions::new`], [`SessionOptions::from_uri`], [`ClientConfig::to_options`] |
//! | [`Session`] | [`Session::connect`], [`Session::from_uri`], [`Session::from_options`] |
//! | [`Schema`], [`Table`], [`Collection`] | [`Session::get_schema`], [`Schema::get_table`], [`Schema::get_collection`] |
//! | [`Statement`] | `Session::*_new` factories |
//! | [`QueryResult`] | [`Session::execute`] and the one-shot helpers |
//! | [`Row`] | [`QueryResult::fetch_one`] |

pub mod config;
mod convert;
pub mod diagnostic;
pub mod driver;
mod error;
mod executor;
pub mod memory;
pub mod operation;
pub mod options;
pub mod result;
pub mod row;
mod schema;
mod session;
pub mod statement;

#[cfg(test)]
mod tests;

// =============================================================================
// Public API
// =============================================================================

pub use config::ClientConfig;
pub use diagnostic::{ErrorInfo, HasDiagnostic, Status, MAX_ERROR_LEN};
pub use driver::{ConnectSettings, Connection, Driver, Reply, RowSet, Warning, WarningLevel};
pub use error::{Error, ERROR_CODE_INDEX_OUT_OF_RANGE, ERROR_CODE_UNKNOWN};
pub use memory::{MemoryDriver, TableSpec};
pub use operation::{
    Assignment, Clause, Criteria, ModifyOp, OpKind, Operation, OrderBy, Param, RowLock,
    SortDirection, Target,
};
pub use options::{OptionKey, OptionValue, SessionOptions, SslMode, DEFAULT_PORT};
pub use result::QueryResult;
pub use row::Row;
pub use schema::{Collection, Schema, Table};
pub use session::{get_session, get_session_from_options, get_session_from_url, Session};
pub use statement::{Statement, StatementId};

// Re-export the data model so users don't need xapi-core directly
pub use xapi_core::{ColumnDescriptor, ColumnType, DocPath, Document, Value};

/// Result type for binding operations
pub type Result<T> = std::result::Result<T, Error>;
