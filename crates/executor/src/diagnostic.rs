//! Per-handle diagnostic slots and the call boundary.
//!
//! Every handle (session, statement, result, row, options, schema objects)
//! carries a [`Diagnostic`]. Public handle methods run their body through
//! [`guarded`] and record the outcome:
//!
//! - on failure the slot is overwritten with the error's code and message and
//!   the method returns its failure sentinel (`None`, `false` or
//!   [`Status::Error`]);
//! - on success the slot is cleared, so a stale error never outlives the next
//!   successful call on the same handle.
//!
//! A panic below the boundary is caught and reported as [`Error::Unknown`].

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Capacity of caller-supplied error text buffers, excluding the terminator.
pub const MAX_ERROR_LEN: usize = 255;

/// Outcome code of a status-returning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Status {
    /// Call succeeded
    Ok = 0,
    /// Output buffer was filled before the value was exhausted
    MoreData = 8,
    /// Value is NULL, or there is nothing more to return
    Null = 16,
    /// Call failed; see the handle's diagnostic
    Error = 128,
}

impl Status {
    /// Numeric code of this status.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// True for [`Status::Error`].
    pub fn is_error(self) -> bool {
        self == Status::Error
    }
}

/// Code and message of the most recent failure on a handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    code: u32,
    message: String,
}

impl ErrorInfo {
    /// Create an error record.
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Numeric error code.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Error text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Copy the message into `buf` as NUL-terminated text.
    ///
    /// At most `min(buf.len() - 1, MAX_ERROR_LEN)` bytes are copied, cut at a
    /// character boundary. Returns the number of message bytes written (the
    /// terminator is not counted). An empty buffer receives nothing.
    pub fn copy_message_into(&self, buf: &mut [u8]) -> usize {
        let Some(room) = buf.len().checked_sub(1) else {
            return 0;
        };
        let limit = room.min(MAX_ERROR_LEN);
        let mut len = self.message.len().min(limit);
        while !self.message.is_char_boundary(len) {
            len -= 1;
        }
        buf[..len].copy_from_slice(&self.message.as_bytes()[..len]);
        buf[len] = 0;
        len
    }
}

impl From<&Error> for ErrorInfo {
    fn from(err: &Error) -> Self {
        ErrorInfo::new(err.code(), err.to_string())
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// A last-error slot.
///
/// Interior mutability lets read-only accessors (`&self`) report failures.
/// Handles are therefore not `Sync`, matching the one-call-per-handle model.
#[derive(Debug, Default)]
pub struct Diagnostic {
    slot: RefCell<Option<ErrorInfo>>,
}

impl Diagnostic {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot.
    pub fn set(&self, info: ErrorInfo) {
        *self.slot.borrow_mut() = Some(info);
    }

    /// Overwrite the slot from an error.
    pub fn set_error(&self, err: &Error) {
        self.set(ErrorInfo::from(err));
    }

    /// Empty the slot.
    pub fn clear(&self) {
        *self.slot.borrow_mut() = None;
    }

    /// Current content of the slot.
    pub fn get(&self) -> Option<ErrorInfo> {
        self.slot.borrow().clone()
    }

    /// True when the last call on the handle failed.
    pub fn is_set(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Record the outcome of a call; the value on success, `None` on failure.
    pub fn record<T>(&self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => {
                self.clear();
                Some(value)
            }
            Err(err) => {
                self.set_error(&err);
                None
            }
        }
    }

    /// Record the outcome of a status-returning call.
    pub fn status(&self, result: Result<Status>) -> Status {
        self.record(result).unwrap_or(Status::Error)
    }

    /// Record the outcome of a call returning nothing; `true` on success.
    pub fn check(&self, result: Result<()>) -> bool {
        self.record(result).is_some()
    }
}

impl Clone for Diagnostic {
    fn clone(&self) -> Self {
        Self {
            slot: RefCell::new(self.get()),
        }
    }
}

/// Run `f`, turning a panic into [`Error::Unknown`].
pub fn guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(target: "xapi::boundary", "panic caught at the call boundary");
            Err(Error::Unknown)
        }
    }
}

/// Access to the diagnostic slot of a handle.
pub trait HasDiagnostic {
    /// The handle's slot.
    fn diagnostic(&self) -> &Diagnostic;

    /// Most recent error, if the last call failed.
    fn error(&self) -> Option<ErrorInfo> {
        self.diagnostic().get()
    }

    /// Message of the most recent error.
    fn error_message(&self) -> Option<String> {
        self.error().map(|info| info.message)
    }

    /// Code of the most recent error, `0` when there is none.
    fn error_num(&self) -> u32 {
        self.error().map_or(0, |info| info.code)
    }
}
