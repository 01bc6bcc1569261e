//! The Executor - single path from the binding to the driver.
//!
//! Every operation a session ships goes through [`Executor::execute`], which
//! logs it, performs the round trip and converts driver errors.

use crate::driver::{Connection, Reply};
use crate::operation::Operation;
use crate::Result;

/// Owner of an open connection.
///
/// Dropping the executor closes the connection. A failing close is logged,
/// since there is no handle left to report it on.
pub struct Executor {
    conn: Box<dyn Connection>,
    closed: bool,
}

impl Executor {
    /// Wrap an established connection.
    pub fn new(conn: Box<dyn Connection>) -> Self {
        Self {
            conn,
            closed: false,
        }
    }

    /// Execute one operation synchronously.
    pub fn execute(&mut self, op: &Operation) -> Result<Reply> {
        tracing::debug!(
            target: "xapi::exec",
            op = op.name(),
            target_object = ?op.target(),
            "executing operation"
        );
        match self.conn.execute(op) {
            Ok(reply) => {
                tracing::debug!(
                    target: "xapi::exec",
                    op = op.name(),
                    sets = reply.sets.len(),
                    affected = reply.affected_rows,
                    warnings = reply.warnings.len(),
                    "operation completed"
                );
                Ok(reply)
            }
            Err(e) => {
                tracing::debug!(target: "xapi::exec", op = op.name(), error = %e, "operation failed");
                Err(e.into())
            }
        }
    }

    /// Close the connection. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.conn.close()?;
        Ok(())
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(target: "xapi::session", error = %e, "failed to close connection");
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("closed", &self.closed)
            .finish()
    }
}
