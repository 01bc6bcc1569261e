//! Error conversion from driver error types.
//!
//! This module provides conversions from [`xapi_core::Error`] to the
//! binding's [`Error`] type.

use crate::Error;

/// Convert a driver or value error to a binding error.
///
/// Server and transport failures keep their text and number so that the
/// caller sees them verbatim.
impl From<xapi_core::Error> for Error {
    fn from(err: xapi_core::Error) -> Self {
        match err {
            xapi_core::Error::Server { code, message } => Error::Driver { code, message },

            e @ (xapi_core::Error::Connection(_)
            | xapi_core::Error::Protocol(_)
            | xapi_core::Error::Io(_)) => Error::Driver {
                code: 0,
                message: e.to_string(),
            },

            xapi_core::Error::Overflow(_) => Error::Overflow,

            e @ (xapi_core::Error::Conversion { .. }
            | xapi_core::Error::InvalidDocument(_)
            | xapi_core::Error::InvalidPath(_)) => Error::InvalidInput {
                reason: e.to_string(),
            },
        }
    }
}
