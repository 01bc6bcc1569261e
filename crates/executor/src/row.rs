//! Field access on fetched rows.
//!
//! Typed getters share one protocol:
//!
//! | Outcome | Status | Output |
//! |---------|--------|--------|
//! | column index `>= column count` | `Error` (index error) | untouched |
//! | stored value is NULL | `Null` | untouched |
//! | narrowing overflow | `Error` (overflow) | untouched |
//! | success | `Ok` | written |
//!
//! [`Row::get_bytes`] adds partial reads, see its docs.

use xapi_core::Value;

use crate::diagnostic::{guarded, Diagnostic, HasDiagnostic, Status};
use crate::{Error, Result};

/// One row of a result.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    diag: Diagnostic,
}

impl Row {
    pub(crate) fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            diag: Diagnostic::new(),
        }
    }

    /// Number of fields.
    pub fn column_count(&self) -> u32 {
        self.values.len() as u32
    }

    /// Field at `col`; an index error when out of range.
    pub fn value(&self, col: u32) -> Result<&Value> {
        self.values
            .get(col as usize)
            .ok_or(Error::IndexOutOfRange {
                index: col,
                count: self.column_count(),
            })
    }

    /// All fields in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Field at `col` as an unsigned integer, `None` for NULL.
    pub fn try_uint(&self, col: u32) -> Result<Option<u64>> {
        self.non_null(col)?
            .map(|v| v.get_uint().map_err(Error::from))
            .transpose()
    }

    /// Field at `col` as a signed integer, `None` for NULL.
    pub fn try_sint(&self, col: u32) -> Result<Option<i64>> {
        self.non_null(col)?
            .map(|v| v.get_sint().map_err(Error::from))
            .transpose()
    }

    /// Field at `col` as a single precision float, `None` for NULL.
    pub fn try_float(&self, col: u32) -> Result<Option<f32>> {
        self.non_null(col)?
            .map(|v| v.get_float().map_err(Error::from))
            .transpose()
    }

    /// Field at `col` as a double, `None` for NULL.
    pub fn try_double(&self, col: u32) -> Result<Option<f64>> {
        self.non_null(col)?
            .map(|v| v.get_double().map_err(Error::from))
            .transpose()
    }

    /// Read an unsigned integer into `out`.
    pub fn get_uint(&self, col: u32, out: &mut u64) -> Status {
        self.store(col, out, Self::try_uint)
    }

    /// Read a signed integer into `out`.
    pub fn get_sint(&self, col: u32, out: &mut i64) -> Status {
        self.store(col, out, Self::try_sint)
    }

    /// Read a single precision float into `out`.
    ///
    /// Doubles outside the `f32` range fail with an overflow.
    pub fn get_float(&self, col: u32, out: &mut f32) -> Status {
        self.store(col, out, Self::try_float)
    }

    /// Read a double into `out`.
    pub fn get_double(&self, col: u32, out: &mut f64) -> Status {
        self.store(col, out, Self::try_double)
    }

    /// Copy the raw bytes of field `col`, starting at `offset`, into `buf`.
    ///
    /// Returns the status and the number of bytes copied:
    /// - `(Ok, n)`: the rest of the value fit in `buf`
    /// - `(MoreData, buf.len())`: `buf` was filled; read again from
    ///   `offset + buf.len()`
    /// - `(Null, 0)`: the value is NULL or empty
    /// - `(Ok, 0)`: `offset` is at or past the end of the value
    /// - `(Error, 0)`: `buf` is empty or `col` is out of range
    pub fn get_bytes(&self, col: u32, offset: u64, buf: &mut [u8]) -> (Status, usize) {
        let result = guarded(|| {
            if buf.is_empty() {
                return Err(Error::invalid("Output buffer cannot have zero length"));
            }
            let data = self.value(col)?.raw_bytes();
            if data.is_empty() {
                return Ok((Status::Null, 0));
            }
            let Some(remaining) = usize::try_from(offset)
                .ok()
                .and_then(|off| data.get(off..))
                .filter(|rest| !rest.is_empty())
            else {
                return Ok((Status::Ok, 0));
            };

            let (status, n) = if remaining.len() < buf.len() {
                (Status::Ok, remaining.len())
            } else {
                (Status::MoreData, buf.len())
            };
            buf[..n].copy_from_slice(&remaining[..n]);
            Ok((status, n))
        });
        self.diag.record(result).unwrap_or((Status::Error, 0))
    }

    fn non_null(&self, col: u32) -> Result<Option<&Value>> {
        let v = self.value(col)?;
        Ok(if v.is_null() { None } else { Some(v) })
    }

    fn store<T>(&self, col: u32, out: &mut T, read: fn(&Self, u32) -> Result<Option<T>>) -> Status {
        let result = guarded(|| {
            Ok(match read(self, col)? {
                Some(v) => {
                    *out = v;
                    Status::Ok
                }
                None => Status::Null,
            })
        });
        self.diag.status(result)
    }
}

impl HasDiagnostic for Row {
    fn diagnostic(&self) -> &Diagnostic {
        &self.diag
    }
}
