//! Connection options.
//!
//! All option handling goes through one static table, [`OPTION_TABLE`], which
//! records each key's value kind and validation rule. `set`, `get`, the
//! connection-string decoder and the TOML configuration loader all consult the
//! same table, so a value accepted by one path is accepted by every other and
//! reads back unchanged.
//!
//! | Key | Kind | Absent | Empty | Range |
//! |-----|------|--------|-------|-------|
//! | `Host` | string | rejected | rejected | |
//! | `Port` | uint | | | `0..=65535` |
//! | `User` | string | rejected | rejected | |
//! | `Pwd` | string | clears | rejected | |
//! | `Db` | string | clears | rejected | |
//! | `SslMode` | uint | | | `1..=4` |
//! | `SslCa` | string | clears | rejected | |
//! | `Socket` | string | rejected | rejected | |
//! | `Priority` | uint | | | `0..=100` |
//! | `ConnectTimeout` | uint | | | milliseconds |

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnostic::{guarded, Diagnostic, HasDiagnostic, Status};
use crate::{Error, Result};

/// Port used when none is given.
pub const DEFAULT_PORT: u16 = 33060;

/// Connection option key. Codes are part of the stable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum OptionKey {
    /// Server host name
    Host = 1,
    /// Server port
    Port = 2,
    /// User name
    User = 3,
    /// Password
    Pwd = 4,
    /// Default schema
    Db = 5,
    /// TLS mode, see [`SslMode`]
    SslMode = 6,
    /// Path to the CA certificate
    SslCa = 7,
    /// Unix socket path
    Socket = 8,
    /// Host priority in multi-host setups
    Priority = 9,
    /// Connect timeout in milliseconds
    ConnectTimeout = 10,
}

impl OptionKey {
    /// Every key, in code order.
    pub const ALL: [OptionKey; 10] = [
        OptionKey::Host,
        OptionKey::Port,
        OptionKey::User,
        OptionKey::Pwd,
        OptionKey::Db,
        OptionKey::SslMode,
        OptionKey::SslCa,
        OptionKey::Socket,
        OptionKey::Priority,
        OptionKey::ConnectTimeout,
    ];

    /// Numeric code of this key.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Look up a key by its numeric code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }

    /// Upper-case option name used in messages.
    pub fn name(self) -> &'static str {
        spec_for(self).name
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// TLS mode stored under [`OptionKey::SslMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SslMode {
    /// Plain connection
    Disabled = 1,
    /// TLS without certificate checks
    Required = 2,
    /// TLS, server certificate checked against the CA
    VerifyCa = 3,
    /// As `VerifyCa`, plus the host name check
    VerifyIdentity = 4,
}

impl SslMode {
    /// Numeric code of this mode.
    pub fn code(self) -> u64 {
        self as u64
    }

    /// Look up a mode by its numeric code.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(SslMode::Disabled),
            2 => Some(SslMode::Required),
            3 => Some(SslMode::VerifyCa),
            4 => Some(SslMode::VerifyIdentity),
            _ => None,
        }
    }

    /// Parse the connection-string spelling (`disabled`, `required`,
    /// `verify_ca`, `verify_identity`; dashes accepted, case ignored).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace('-', "_").as_str() {
            "disabled" => Some(SslMode::Disabled),
            "required" => Some(SslMode::Required),
            "verify_ca" => Some(SslMode::VerifyCa),
            "verify_identity" => Some(SslMode::VerifyIdentity),
            _ => None,
        }
    }
}

/// Value stored for an option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionValue {
    /// String option value
    Str(String),
    /// Unsigned integer option value
    Uint(u64),
}

impl OptionValue {
    /// String content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            OptionValue::Uint(_) => None,
        }
    }

    /// Integer content, if this is an integer value.
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            OptionValue::Uint(v) => Some(*v),
            OptionValue::Str(_) => None,
        }
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Str(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Str(s)
    }
}

impl From<u64> for OptionValue {
    fn from(v: u64) -> Self {
        OptionValue::Uint(v)
    }
}

impl From<u32> for OptionValue {
    fn from(v: u32) -> Self {
        OptionValue::Uint(u64::from(v))
    }
}

impl From<u16> for OptionValue {
    fn from(v: u16) -> Self {
        OptionValue::Uint(u64::from(v))
    }
}

impl From<SslMode> for OptionValue {
    fn from(mode: SslMode) -> Self {
        OptionValue::Uint(mode.code())
    }
}

/// Value kind of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// String value
    Str,
    /// Unsigned integer value
    Uint,
}

/// Validation rule of an option.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// String that may be cleared by an absent value; empty is rejected
    Clearable,
    /// String that must be present and non-empty; the text is the error
    Required(&'static str),
    /// Integer within an inclusive range
    Range(u64, u64),
}

/// One row of the option table.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    /// Option key
    pub key: OptionKey,
    /// Name used in messages
    pub name: &'static str,
    /// Value kind
    pub kind: ValueKind,
    /// Validation rule
    pub rule: Rule,
}

/// The authoritative option table, in key order.
pub static OPTION_TABLE: [OptionSpec; 10] = [
    OptionSpec {
        key: OptionKey::Host,
        name: "HOST",
        kind: ValueKind::Str,
        rule: Rule::Required("Missing host name"),
    },
    OptionSpec {
        key: OptionKey::Port,
        name: "PORT",
        kind: ValueKind::Uint,
        rule: Rule::Range(0, 65535),
    },
    OptionSpec {
        key: OptionKey::User,
        name: "USER",
        kind: ValueKind::Str,
        rule: Rule::Required("Empty user name"),
    },
    OptionSpec {
        key: OptionKey::Pwd,
        name: "PWD",
        kind: ValueKind::Str,
        rule: Rule::Clearable,
    },
    OptionSpec {
        key: OptionKey::Db,
        name: "DB",
        kind: ValueKind::Str,
        rule: Rule::Clearable,
    },
    OptionSpec {
        key: OptionKey::SslMode,
        name: "SSL_MODE",
        kind: ValueKind::Uint,
        rule: Rule::Range(1, 4),
    },
    OptionSpec {
        key: OptionKey::SslCa,
        name: "SSL_CA",
        kind: ValueKind::Str,
        rule: Rule::Clearable,
    },
    OptionSpec {
        key: OptionKey::Socket,
        name: "SOCKET",
        kind: ValueKind::Str,
        rule: Rule::Required("Missing socket name"),
    },
    OptionSpec {
        key: OptionKey::Priority,
        name: "PRIORITY",
        kind: ValueKind::Uint,
        rule: Rule::Range(0, 100),
    },
    OptionSpec {
        key: OptionKey::ConnectTimeout,
        name: "CONNECT_TIMEOUT",
        kind: ValueKind::Uint,
        rule: Rule::Range(0, u64::MAX),
    },
];

/// Table row of `key`.
pub fn spec_for(key: OptionKey) -> &'static OptionSpec {
    // The table is indexed by code - 1.
    &OPTION_TABLE[key.code() as usize - 1]
}

impl OptionSpec {
    /// Validate `value` for this option.
    ///
    /// `Ok(None)` means the value clears the option.
    pub fn validate(&self, value: Option<OptionValue>) -> Result<Option<OptionValue>> {
        match (self.rule, value) {
            (Rule::Required(msg), None) => Err(invalid_value(msg)),
            (Rule::Clearable, None) => Ok(None),
            (Rule::Range(..), None) => Err(invalid_value(format!(
                "Missing value of option {}",
                self.name
            ))),

            (Rule::Required(msg), Some(OptionValue::Str(s))) => {
                if s.is_empty() {
                    Err(invalid_value(msg))
                } else {
                    Ok(Some(OptionValue::Str(s)))
                }
            }
            (Rule::Clearable, Some(OptionValue::Str(s))) => {
                if s.is_empty() {
                    Err(invalid_value(format!(
                        "Invalid empty string as value of option {}",
                        self.name
                    )))
                } else {
                    Ok(Some(OptionValue::Str(s)))
                }
            }
            (Rule::Range(lo, hi), Some(OptionValue::Uint(v))) => {
                if v < lo || v > hi {
                    Err(invalid_value(format!(
                        "Value {} of option {} is outside {}..={}",
                        v, self.name, lo, hi
                    )))
                } else {
                    Ok(Some(OptionValue::Uint(v)))
                }
            }

            (_, Some(other)) => Err(invalid_value(format!(
                "Option {} expects {} value, got {:?}",
                self.name,
                match self.kind {
                    ValueKind::Str => "a string",
                    ValueKind::Uint => "an unsigned integer",
                },
                other
            ))),
        }
    }
}

fn invalid_value(reason: impl Into<String>) -> Error {
    Error::InvalidOptionValue {
        reason: reason.into(),
    }
}

/// A set of connection options.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    values: BTreeMap<OptionKey, OptionValue>,
    diag: Diagnostic,
}

impl SessionOptions {
    /// Create an empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a batch of `(key, value)` entries.
    ///
    /// A `None` value clears a clearable option. Either every entry is applied
    /// or, when one is rejected, none is.
    pub fn set<V: Into<OptionValue>>(&mut self, entries: Vec<(OptionKey, Option<V>)>) -> Status {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.code(), v.map(Into::into)))
            .collect();
        self.set_raw(entries)
    }

    /// Apply a batch addressed by numeric key codes.
    ///
    /// Unknown codes are rejected with the whole batch.
    pub fn set_raw(&mut self, entries: Vec<(u32, Option<OptionValue>)>) -> Status {
        self.diag.clear();
        let result = guarded(|| {
            let mut staged = self.values.clone();
            for (code, value) in entries {
                let key = OptionKey::from_code(code).ok_or(Error::UnknownOption)?;
                apply(&mut staged, key, value)?;
            }
            self.values = staged;
            Ok(Status::Ok)
        });
        self.diag.status(result)
    }

    /// Apply a batch of entries, reporting failure as an error instead of
    /// through the diagnostic slot. Atomic like [`SessionOptions::set`].
    pub fn try_set(&mut self, entries: Vec<(OptionKey, Option<OptionValue>)>) -> Result<()> {
        let mut staged = self.values.clone();
        for (key, value) in entries {
            apply(&mut staged, key, value)?;
        }
        self.values = staged;
        Ok(())
    }

    /// Set a single option.
    pub fn set_one(&mut self, key: OptionKey, value: impl Into<OptionValue>) -> Status {
        self.set(vec![(key, Some(value.into()))])
    }

    /// Clear a single clearable option.
    pub fn clear(&mut self, key: OptionKey) -> Status {
        self.set::<OptionValue>(vec![(key, None)])
    }

    /// Value of `key`.
    ///
    /// Returns `None` and records [`Error::OptionNotSet`] when the option has
    /// no value.
    pub fn get(&self, key: OptionKey) -> Option<OptionValue> {
        let result = guarded(|| self.try_get(key).cloned());
        self.diag.record(result)
    }

    /// String value of `key`; a kind mismatch is an error.
    pub fn get_str(&self, key: OptionKey) -> Option<String> {
        let result = guarded(|| match self.try_get(key)? {
            OptionValue::Str(s) => Ok(s.clone()),
            OptionValue::Uint(_) => Err(Error::invalid(format!(
                "Option {} is not a string option",
                key
            ))),
        });
        self.diag.record(result)
    }

    /// Integer value of `key`; a kind mismatch is an error.
    pub fn get_uint(&self, key: OptionKey) -> Option<u64> {
        let result = guarded(|| match self.try_get(key)? {
            OptionValue::Uint(v) => Ok(*v),
            OptionValue::Str(_) => Err(Error::invalid(format!(
                "Option {} is not an integer option",
                key
            ))),
        });
        self.diag.record(result)
    }

    /// Value of `key` as a result.
    pub fn try_get(&self, key: OptionKey) -> Result<&OptionValue> {
        self.values.get(&key).ok_or_else(|| Error::OptionNotSet {
            option: key.name().to_string(),
        })
    }

    /// Value of `key` without touching the diagnostic.
    pub fn peek(&self, key: OptionKey) -> Option<&OptionValue> {
        self.values.get(&key)
    }

    /// True when `key` has a value.
    pub fn contains(&self, key: OptionKey) -> bool {
        self.values.contains_key(&key)
    }

    /// Iterate over the set options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (OptionKey, &OptionValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// Decode a connection string into an option set.
    ///
    /// Accepted form:
    /// `[mysqlx://]user[:password]@(host[:port]|(socket))[/schema][?key=value&...]`
    /// with query keys `ssl-mode`, `ssl-ca`, `priority` and `connect-timeout`.
    /// User and password may be percent-encoded.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let mut staged = BTreeMap::new();
        for (key, value) in parse_uri(uri)? {
            apply(&mut staged, key, Some(value))?;
        }
        Ok(Self {
            values: staged,
            diag: Diagnostic::new(),
        })
    }
}

impl PartialEq for SessionOptions {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl HasDiagnostic for SessionOptions {
    fn diagnostic(&self) -> &Diagnostic {
        &self.diag
    }
}

fn apply(
    staged: &mut BTreeMap<OptionKey, OptionValue>,
    key: OptionKey,
    value: Option<OptionValue>,
) -> Result<()> {
    match spec_for(key).validate(value)? {
        Some(v) => {
            staged.insert(key, v);
        }
        None => {
            staged.remove(&key);
        }
    }
    Ok(())
}

fn parse_uri(uri: &str) -> Result<Vec<(OptionKey, OptionValue)>> {
    let bad = |what: &str| Error::invalid(format!("Invalid connection string '{}': {}", uri, what));

    let rest = uri
        .strip_prefix("mysqlx://")
        .unwrap_or(uri);
    let (rest, query) = match rest.split_once('?') {
        Some((r, q)) => (r, Some(q)),
        None => (rest, None),
    };
    let (userinfo, rest) = rest.rsplit_once('@').ok_or_else(|| bad("missing user"))?;
    let (user, pwd) = match userinfo.split_once(':') {
        Some((u, p)) => (u, Some(p)),
        None => (userinfo, None),
    };

    let mut out = vec![(OptionKey::User, OptionValue::Str(percent_decode(user)?))];
    if let Some(pwd) = pwd {
        let pwd = percent_decode(pwd)?;
        // An empty password in a URI means "no password".
        if !pwd.is_empty() {
            out.push((OptionKey::Pwd, OptionValue::Str(pwd)));
        }
    }

    let (location, db) = if let Some(after) = rest.strip_prefix('(') {
        let (socket, tail) = after.split_once(')').ok_or_else(|| bad("unclosed socket path"))?;
        out.push((OptionKey::Socket, OptionValue::Str(percent_decode(socket)?)));
        (None, tail.strip_prefix('/'))
    } else {
        match rest.split_once('/') {
            Some((loc, db)) => (Some(loc), Some(db)),
            None => (Some(rest), None),
        }
    };

    if let Some(location) = location {
        let (host, port) = match location.rsplit_once(':') {
            Some((h, p)) => {
                let port = p.parse::<u64>().map_err(|_| bad("invalid port"))?;
                (h, Some(port))
            }
            None => (location, None),
        };
        out.push((OptionKey::Host, OptionValue::Str(host.to_string())));
        if let Some(port) = port {
            out.push((OptionKey::Port, OptionValue::Uint(port)));
        }
    }

    if let Some(db) = db.filter(|d| !d.is_empty()) {
        out.push((OptionKey::Db, OptionValue::Str(percent_decode(db)?)));
    }

    for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = percent_decode(value)?;
        match name.to_ascii_lowercase().as_str() {
            "ssl-mode" | "ssl_mode" | "sslmode" => {
                let mode = SslMode::from_name(&value).ok_or_else(|| bad("unknown ssl-mode"))?;
                out.push((OptionKey::SslMode, mode.into()));
            }
            "ssl-ca" | "ssl_ca" => out.push((OptionKey::SslCa, OptionValue::Str(value))),
            "priority" => {
                let v = value.parse::<u64>().map_err(|_| bad("invalid priority"))?;
                out.push((OptionKey::Priority, OptionValue::Uint(v)));
            }
            "connect-timeout" | "connect_timeout" => {
                let v = value.parse::<u64>().map_err(|_| bad("invalid connect-timeout"))?;
                out.push((OptionKey::ConnectTimeout, OptionValue::Uint(v)));
            }
            _ => return Err(Error::UnknownOption),
        }
    }

    Ok(out)
}

fn percent_decode(s: &str) -> Result<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| Error::invalid(format!("Invalid percent escape in '{}'", s)))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| Error::invalid(format!("'{}' is not valid UTF-8", s)))
}
