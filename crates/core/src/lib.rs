//! Core types for the X DevAPI binding
//!
//! This crate defines the data types shared between the binding layer and the
//! drivers it talks to:
//! - Value: typed scalar for parameters and row fields
//! - ColumnDescriptor / ColumnType: result column metadata
//! - Document / DocPath: JSON documents and paths into them
//! - Error: errors reported by drivers and value conversions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod column;
pub mod document;
pub mod error;
pub mod value;

pub use column::{ColumnDescriptor, ColumnType, COLLATION_UNDEFINED};
pub use document::{generate_id, DocPath, Document, PathSegment, ID_FIELD};
pub use error::{Error, Result};
pub use value::Value;
