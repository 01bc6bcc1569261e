//! Value types for the binding layer
//!
//! [`Value`] is the typed scalar that flows in both directions: parameters
//! bound into statements and field values read back from rows.
//!
//! ## Type Rules
//!
//! - Signed and unsigned integers are distinct variants; reading one as the
//!   other succeeds only when the value is representable.
//! - `Float` is single precision, `Double` is double precision. Reading a
//!   double as a float fails with an overflow when it is outside the `f32`
//!   range.
//! - `Bytes` are not `String`, but both expose their raw bytes.
//! - Float equality follows IEEE-754 semantics: `NaN != NaN`, `-0.0 == 0.0`

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::error::{Error, Result};

/// A typed scalar value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// SQL / document NULL
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Sint(i64),
    /// 64-bit unsigned integer
    Uint(u64),
    /// Single precision float
    Float(f32),
    /// Double precision float
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Sint(a), Value::Sint(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Sint(_) => "Sint",
            Value::Uint(_) => "Uint",
            Value::Float(_) => "Float",
            Value::Double(_) => "Double",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Read as an unsigned integer.
    pub fn get_uint(&self) -> Result<u64> {
        match self {
            Value::Uint(v) => Ok(*v),
            Value::Sint(v) => u64::try_from(*v)
                .map_err(|_| Error::Overflow(format!("{} is not an unsigned value", v))),
            Value::Bool(b) => Ok(u64::from(*b)),
            other => Err(Error::Conversion {
                from: other.type_name(),
                to: "unsigned integer",
            }),
        }
    }

    /// Read as a signed integer.
    pub fn get_sint(&self) -> Result<i64> {
        match self {
            Value::Sint(v) => Ok(*v),
            Value::Uint(v) => i64::try_from(*v)
                .map_err(|_| Error::Overflow(format!("{} does not fit a signed value", v))),
            Value::Bool(b) => Ok(i64::from(*b)),
            other => Err(Error::Conversion {
                from: other.type_name(),
                to: "signed integer",
            }),
        }
    }

    /// Read as a double.
    pub fn get_double(&self) -> Result<f64> {
        match self {
            Value::Double(v) => Ok(*v),
            Value::Float(v) => Ok(f64::from(*v)),
            Value::Sint(v) => Ok(*v as f64),
            Value::Uint(v) => Ok(*v as f64),
            other => Err(Error::Conversion {
                from: other.type_name(),
                to: "double",
            }),
        }
    }

    /// Read as a single precision float.
    ///
    /// Stored floats are returned unchanged; any other numeric value is read
    /// as a double first and must lie within `[f32::MIN, f32::MAX]`.
    pub fn get_float(&self) -> Result<f32> {
        if let Value::Float(v) = self {
            return Ok(*v);
        }
        let v = self.get_double()?;
        if v > f64::from(f32::MAX) || v < f64::from(f32::MIN) {
            return Err(Error::Overflow(format!("{} does not fit a float", v)));
        }
        Ok(v as f32)
    }

    /// Get as &str if this is a String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Raw byte representation of the value.
    ///
    /// Strings and byte arrays are returned as-is, NULL is empty, and
    /// numbers use their textual form.
    pub fn raw_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            Value::Null => Cow::Borrowed(&[]),
            Value::String(s) => Cow::Borrowed(s.as_bytes()),
            Value::Bytes(b) => Cow::Borrowed(b),
            other => Cow::Owned(other.to_string().into_bytes()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", u8::from(*b)),
            Value::Sint(v) => write!(f, "{}", v),
            Value::Uint(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}

// ============================================================================
// From implementations for ergonomic API usage
// ============================================================================

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Sint(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Sint(i64::from(i))
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::Uint(u)
    }
}

impl From<u32> for Value {
    fn from(u: u32) -> Self {
        Value::Uint(u64::from(u))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Double(f)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// serde_json interop for document fields
// ============================================================================

impl From<&serde_json::Value> for Value {
    fn from(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Value::Uint(u)
                } else if let Some(i) = n.as_i64() {
                    Value::Sint(i)
                } else {
                    Value::Double(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            nested => Value::String(nested.to_string()),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Sint(i) => serde_json::Value::Number(i.into()),
            Value::Uint(u) => serde_json::Value::Number(u.into()),
            Value::Float(f) => serde_json::Number::from_f64(f64::from(f))
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Double(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Bytes(b) => serde_json::Value::String(String::from_utf8_lossy(&b).into_owned()),
        }
    }
}
