//! xapi - Exception-free binding layer for the X DevAPI
//!
//! xapi lets a program talk to a document/relational database server through
//! sessions, statements and cursor-style results, without any call ever
//! unwinding past the API. Failures are reported through sentinel returns and
//! a per-handle diagnostic slot.
//!
//! # Quick Start
//!
//! ```ignore
//! use xapi::{HasDiagnostic, MemoryDriver, Session};
//!
//! let driver = MemoryDriver::new().with_schema("test");
//! let mut session = Session::from_uri(&driver, "mysqlx://root@localhost/test");
//! if !session.is_valid() {
//!     eprintln!("{}", session.error_message().unwrap_or_default());
//!     return;
//! }
//!
//! let res = session.sql("SELECT 1 AS one").unwrap();
//! while let Some(row) = res.fetch_one() {
//!     println!("{:?}", row.values());
//! }
//! ```
//!
//! # Architecture
//!
//! The binding never talks to the network itself. A [`Driver`] opens
//! [`Connection`]s that execute [`Operation`]s; [`MemoryDriver`] is the
//! bundled in-process implementation. Only the binding API is public.

// Re-export the public API from xapi-executor
pub use xapi_executor::*;
