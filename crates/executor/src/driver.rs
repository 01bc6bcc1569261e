//! The driver contract.
//!
//! The binding does not speak the wire protocol itself. A [`Driver`] opens
//! [`Connection`]s, and a connection executes one [`Operation`] per call,
//! synchronously, answering with a [`Reply`]. Failures are reported as
//! [`xapi_core::Error`] and reach the caller verbatim.

use serde::{Deserialize, Serialize};
use xapi_core::{ColumnDescriptor, Value};

use crate::operation::Operation;
use crate::options::{OptionKey, OptionValue, SessionOptions, SslMode, DEFAULT_PORT};
use crate::{Error, Result};

/// Opens connections.
pub trait Driver: Send + Sync {
    /// Establish a connection. Exactly one attempt is made.
    fn connect(&self, settings: &ConnectSettings) -> xapi_core::Result<Box<dyn Connection>>;
}

/// An established connection.
pub trait Connection: Send {
    /// Execute one operation and wait for its complete reply.
    fn execute(&mut self, op: &Operation) -> xapi_core::Result<Reply>;

    /// Close the connection.
    fn close(&mut self) -> xapi_core::Result<()>;
}

/// Resolved connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectSettings {
    pub host: String,
    pub port: u16,
    pub socket: Option<String>,
    pub user: String,
    pub password: Option<String>,
    pub database: Option<String>,
    pub ssl_mode: Option<SslMode>,
    pub ssl_ca: Option<String>,
    pub priority: Option<u8>,
    pub connect_timeout_ms: Option<u64>,
}

impl ConnectSettings {
    /// Resolve an option set. A user is required; the host defaults to
    /// `localhost` and port `0` (or no port) means the default port.
    pub fn from_options(opts: &SessionOptions) -> Result<Self> {
        let text = |key| opts.peek(key).and_then(OptionValue::as_str).map(str::to_string);
        let number = |key| opts.peek(key).and_then(OptionValue::as_uint);

        let user = text(OptionKey::User).ok_or_else(|| Error::InvalidOptionValue {
            reason: "Empty user name".into(),
        })?;
        let port = match number(OptionKey::Port) {
            None | Some(0) => DEFAULT_PORT,
            Some(p) => u16::try_from(p).map_err(|_| Error::Overflow)?,
        };
        let priority = number(OptionKey::Priority)
            .map(u8::try_from)
            .transpose()
            .map_err(|_| Error::Overflow)?;

        Ok(Self {
            host: text(OptionKey::Host).unwrap_or_else(|| "localhost".to_string()),
            port,
            socket: text(OptionKey::Socket),
            user,
            password: text(OptionKey::Pwd),
            database: text(OptionKey::Db),
            ssl_mode: number(OptionKey::SslMode).and_then(SslMode::from_code),
            ssl_ca: text(OptionKey::SslCa),
            priority,
            connect_timeout_ms: number(OptionKey::ConnectTimeout),
        })
    }
}

/// Severity of a server warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningLevel {
    Note,
    Warning,
    Error,
}

/// A warning attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub level: WarningLevel,
    pub code: u32,
    pub message: String,
}

/// One data set of a reply.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<Vec<Value>>,
}

/// Complete reply to an operation.
///
/// A reply with no data sets is the result of a pure write.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reply {
    pub sets: Vec<RowSet>,
    pub affected_rows: u64,
    pub auto_increment: u64,
    pub warnings: Vec<Warning>,
}

impl Reply {
    /// Reply to a write that touched `affected_rows` rows.
    pub fn affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            ..Self::default()
        }
    }

    /// Reply carrying a single data set.
    pub fn with_set(set: RowSet) -> Self {
        Self {
            sets: vec![set],
            ..Self::default()
        }
    }
}
