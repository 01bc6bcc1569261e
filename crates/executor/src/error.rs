//! Error types for the binding layer.
//!
//! Every failure inside the binding is represented by the [`Error`] enum.
//! These errors are:
//! - **Structured**: Each variant has typed fields for error details
//! - **Serializable**: Can be converted to/from JSON
//! - **Numbered**: [`Error::code`] yields the code stored in a diagnostic slot

use serde::{Deserialize, Serialize};

/// Code reported for failures the binding does not classify.
pub const ERROR_CODE_UNKNOWN: u32 = 0xFFFF;

/// Code reported for column and result-set indexes outside their range.
pub const ERROR_CODE_INDEX_OUT_OF_RANGE: u32 = 100;

/// Binding layer errors.
///
/// # Categories
///
/// | Category | Variants | Description |
/// |----------|----------|-------------|
/// | Driver | `Driver` | Reported by the driver or server, passed on verbatim |
/// | Validation | `InvalidInput`, `ClauseNotAllowed`, `IndexOutOfRange`, etc. | Detected locally, no round trip |
/// | Representation | `Overflow` | Value does not fit the requested type |
/// | Unclassified | `Unknown` | Anything else, including panics below the boundary |
///
/// # Example
///
/// ```ignore
/// use xapi_executor::{Error, SessionOptions};
///
/// match SessionOptions::from_uri("root@localhost?colour=blue") {
///     Err(Error::UnknownOption) => println!("unsupported query parameter"),
///     Err(e) => println!("{} (code {})", e, e.code()),
///     Ok(opts) => { /* ... */ }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    // ==================== Driver ====================
    /// Error reported by the driver or the server
    #[error("{message}")]
    Driver { code: u32, message: String },

    // ==================== Validation ====================
    /// Malformed argument
    #[error("{reason}")]
    InvalidInput { reason: String },

    /// Clause is not used by this statement kind
    #[error("{clause} is not allowed for {kind} statements")]
    ClauseNotAllowed { clause: String, kind: String },

    /// Column or row index past the end
    #[error("Index {index} is out of range (count {count})")]
    IndexOutOfRange { index: u32, count: u32 },

    /// Data access on a result of a pure write operation
    #[error("Attempt to read data from a result without a data set")]
    NoDataSet,

    /// Required name was missing or empty
    #[error("Missing {what} name")]
    MissingName { what: String },

    /// Option key outside the known enumeration
    #[error("Unrecognized connection option")]
    UnknownOption,

    /// Option has no value
    #[error("Option {option} is not set")]
    OptionNotSet { option: String },

    /// Option value rejected by the option table
    #[error("{reason}")]
    InvalidOptionValue { reason: String },

    /// The session is not connected
    #[error("Session is not connected")]
    SessionInvalid,

    /// Feature that exists in the protocol but is not supported here
    #[error("Not implemented")]
    NotImplemented,

    // ==================== Representation ====================
    /// Numeric conversion out of range
    #[error("Numeric overflow")]
    Overflow,

    // ==================== Unclassified ====================
    /// Unclassified failure
    #[error("Unknown error!")]
    Unknown,
}

impl Error {
    /// Build an [`Error::InvalidInput`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Build an [`Error::MissingName`].
    pub fn missing_name(what: impl Into<String>) -> Self {
        Error::MissingName { what: what.into() }
    }

    /// Numeric code stored in a diagnostic slot.
    ///
    /// Driver errors keep the driver's number. Locally detected errors use
    /// `0` except for index errors; unclassified failures use
    /// [`ERROR_CODE_UNKNOWN`].
    pub fn code(&self) -> u32 {
        match self {
            Error::Driver { code, .. } => *code,
            Error::IndexOutOfRange { .. } => ERROR_CODE_INDEX_OUT_OF_RANGE,
            Error::Unknown => ERROR_CODE_UNKNOWN,
            _ => 0,
        }
    }

    /// True for errors detected without contacting the driver.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Error::Driver { .. } | Error::Overflow | Error::Unknown)
    }
}
