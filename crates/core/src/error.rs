//! Error types reported below the binding layer
//!
//! This module defines the errors an external driver reports back to the
//! binding layer, plus the errors raised by value conversions.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for driver and conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the external driver or by value conversions
#[derive(Debug, Error)]
pub enum Error {
    /// Error reported by the server for a well-formed request
    #[error("{message}")]
    Server {
        /// Server error number
        code: u32,
        /// Server error text
        message: String,
    },

    /// Connection could not be established or was lost
    #[error("Connection error: {0}")]
    Connection(String),

    /// Malformed or unexpected server response
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Stored value cannot be read as the requested type
    #[error("Cannot convert {from} value to {to}")]
    Conversion {
        /// Type name of the stored value
        from: &'static str,
        /// Requested target type
        to: &'static str,
    },

    /// Stored value does not fit the requested type
    #[error("Numeric overflow: {0}")]
    Overflow(String),

    /// Text is not a JSON object
    #[error("Invalid JSON document: {0}")]
    InvalidDocument(String),

    /// Document path cannot be parsed or does not fit the document
    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    /// I/O error on the underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Build a server error.
    pub fn server(code: u32, message: impl Into<String>) -> Self {
        Error::Server {
            code,
            message: message.into(),
        }
    }

    /// Numeric code of this error.
    ///
    /// Server errors carry the server's own number; everything else that
    /// originates on the client side reports `0`.
    pub fn code(&self) -> u32 {
        match self {
            Error::Server { code, .. } => *code,
            _ => 0,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Protocol(e.to_string())
    }
}
