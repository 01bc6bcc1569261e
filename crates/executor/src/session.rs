//! Connection lifecycle and statement ownership.
//!
//! The [`Session`] owns its connection (through an [`Executor`]), every
//! [`Statement`] created from it and, transitively, their results. Freeing a
//! statement or closing the session drops everything below it.
//!
//! # Usage
//!
//! ```ignore
//! use xapi_executor::{MemoryDriver, OrderBy, Session, Status};
//!
//! let driver = MemoryDriver::new();
//! let mut session = Session::connect(&driver, "localhost", 0, "root", None, None);
//! assert!(session.is_valid());
//!
//! let schema = session.get_schema("test", true).unwrap();
//! let table = schema.get_table(&mut session, "users", true).unwrap();
//!
//! let id = session.table_select_new(&table).unwrap();
//! let stmt = session.statement_mut(id).unwrap();
//! stmt.set_where("id > 5");
//! stmt.set_order_by(&[OrderBy::asc("id")]);
//!
//! let res = session.execute(id).unwrap();
//! while let Some(row) = res.fetch_one() {
//!     // ...
//! }
//! ```

use std::collections::BTreeMap;

use xapi_core::Value;

use crate::diagnostic::{guarded, Diagnostic, ErrorInfo, HasDiagnostic, Status};
use crate::driver::{ConnectSettings, Driver, Reply};
use crate::executor::Executor;
use crate::operation::{OpKind, Operation, Target};
use crate::options::{OptionKey, OptionValue, SessionOptions, DEFAULT_PORT};
use crate::result::QueryResult;
use crate::schema::{Collection, Schema, Table};
use crate::statement::{Statement, StatementId};
use crate::{Error, Result};

/// A connection to the server and everything created from it.
#[derive(Debug)]
pub struct Session {
    // Field order is drop order: statements and results go before the
    // connection.
    statements: BTreeMap<StatementId, Statement>,
    catalog: Option<QueryResult>,
    next_id: u64,
    executor: Option<Executor>,
    default_schema: Option<String>,
    in_transaction: bool,
    diag: Diagnostic,
}

impl Session {
    fn invalid(err: &Error) -> Self {
        let session = Self {
            statements: BTreeMap::new(),
            catalog: None,
            next_id: 0,
            executor: None,
            default_schema: None,
            in_transaction: false,
            diag: Diagnostic::new(),
        };
        session.diag.set_error(err);
        session
    }

    /// Connect with discrete parameters.
    ///
    /// Port `0` selects the default port. An empty password or schema is
    /// treated as absent. Failure yields an invalid session whose
    /// diagnostic explains why.
    pub fn connect(
        driver: &dyn Driver,
        host: &str,
        port: u16,
        user: &str,
        password: Option<&str>,
        database: Option<&str>,
    ) -> Self {
        let opts = guarded(|| {
            let port = if port == 0 { DEFAULT_PORT } else { port };
            let mut opts = SessionOptions::new();
            opts.try_set(vec![
                (OptionKey::Host, Some(OptionValue::from(host))),
                (OptionKey::Port, Some(OptionValue::from(port))),
                (OptionKey::User, Some(OptionValue::from(user))),
                (
                    OptionKey::Pwd,
                    password.filter(|p| !p.is_empty()).map(OptionValue::from),
                ),
                (
                    OptionKey::Db,
                    database.filter(|d| !d.is_empty()).map(OptionValue::from),
                ),
            ])?;
            Ok(opts)
        });
        match opts {
            Ok(opts) => Self::from_options(driver, &opts),
            Err(e) => Self::invalid(&e),
        }
    }

    /// Connect with a connection string, see [`SessionOptions::from_uri`].
    pub fn from_uri(driver: &dyn Driver, uri: &str) -> Self {
        match guarded(|| SessionOptions::from_uri(uri)) {
            Ok(opts) => Self::from_options(driver, &opts),
            Err(e) => Self::invalid(&e),
        }
    }

    /// Connect with a prepared option set.
    pub fn from_options(driver: &dyn Driver, opts: &SessionOptions) -> Self {
        let connected = guarded(|| {
            let settings = ConnectSettings::from_options(opts)?;
            tracing::debug!(
                target: "xapi::session",
                host = %settings.host,
                port = settings.port,
                user = %settings.user,
                "connecting"
            );
            let conn = driver.connect(&settings)?;
            Ok((Executor::new(conn), settings.database))
        });
        match connected {
            Ok((executor, default_schema)) => Self {
                statements: BTreeMap::new(),
                catalog: None,
                next_id: 0,
                executor: Some(executor),
                default_schema,
                in_transaction: false,
                diag: Diagnostic::new(),
            },
            Err(e) => {
                tracing::debug!(target: "xapi::session", error = %e, "connect failed");
                Self::invalid(&e)
            }
        }
    }

    /// True while the session holds an open connection.
    pub fn is_valid(&self) -> bool {
        self.executor.is_some()
    }

    /// Default schema given at connect time.
    pub fn default_schema(&self) -> Option<&str> {
        self.default_schema.as_deref()
    }

    /// True between a successful begin and the matching commit or rollback.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Close the connection, dropping every statement and result.
    ///
    /// Closing an already closed session is a no-op.
    pub fn close(&mut self) {
        self.statements.clear();
        self.catalog = None;
        self.in_transaction = false;
        if let Some(mut executor) = self.executor.take() {
            tracing::debug!(target: "xapi::session", "closing session");
            let closed = guarded(|| executor.close());
            self.diag.check(closed);
        }
    }

    // =========================================================================
    // Internal request path
    // =========================================================================

    fn executor(&mut self) -> Result<&mut Executor> {
        self.executor.as_mut().ok_or(Error::SessionInvalid)
    }

    /// Ship a session-level operation.
    pub(crate) fn request(&mut self, op: &Operation) -> Result<Reply> {
        guarded(|| self.executor()?.execute(op))
    }

    /// Names listed in the first column of a listing reply.
    pub(crate) fn list_names(&mut self, op: &Operation) -> Result<Vec<String>> {
        let reply = self.request(op)?;
        Ok(reply
            .sets
            .first()
            .map(|set| {
                set.rows
                    .iter()
                    .filter_map(|row| row.first().and_then(Value::as_str).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Run a listing and keep its result in the catalog slot.
    pub(crate) fn list_into_catalog(&mut self, op: &Operation) -> Result<&mut QueryResult> {
        let reply = self.request(op)?;
        Ok(self.catalog.insert(QueryResult::new(None, reply, Vec::new())))
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn register(&mut self, build: impl FnOnce(StatementId) -> Result<Statement>) -> Result<StatementId> {
        if !self.is_valid() {
            return Err(Error::SessionInvalid);
        }
        self.next_id += 1;
        let id = StatementId(self.next_id);
        let stmt = build(id)?;
        self.statements.insert(id, stmt);
        Ok(id)
    }

    pub(crate) fn new_statement_on(&mut self, kind: OpKind, target: &Target) -> Option<StatementId> {
        let result = guarded(|| self.register(|id| Statement::new(id, kind, target.clone())));
        self.diag.record(result)
    }

    /// Create a raw SQL statement.
    pub fn sql_new(&mut self, query: &str) -> Option<StatementId> {
        let result = guarded(|| {
            if query.trim().is_empty() {
                return Err(Error::invalid("Missing SQL query"));
            }
            self.register(|id| Ok(Statement::sql(id, query)))
        });
        self.diag.record(result)
    }

    /// Create a select on `table`.
    pub fn table_select_new(&mut self, table: &Table) -> Option<StatementId> {
        self.new_statement_on(OpKind::Select, table.target())
    }

    /// Create an insert into `table`.
    pub fn table_insert_new(&mut self, table: &Table) -> Option<StatementId> {
        self.new_statement_on(OpKind::Insert, table.target())
    }

    /// Create an update of `table`.
    pub fn table_update_new(&mut self, table: &Table) -> Option<StatementId> {
        self.new_statement_on(OpKind::Update, table.target())
    }

    /// Create a delete from `table`.
    pub fn table_delete_new(&mut self, table: &Table) -> Option<StatementId> {
        self.new_statement_on(OpKind::Delete, table.target())
    }

    /// Create an add to `collection`.
    pub fn collection_add_new(&mut self, collection: &Collection) -> Option<StatementId> {
        self.new_statement_on(OpKind::Add, collection.target())
    }

    /// Create a find on `collection`.
    pub fn collection_find_new(&mut self, collection: &Collection) -> Option<StatementId> {
        self.new_statement_on(OpKind::Find, collection.target())
    }

    /// Create a modify of `collection`.
    pub fn collection_modify_new(&mut self, collection: &Collection) -> Option<StatementId> {
        self.new_statement_on(OpKind::Modify, collection.target())
    }

    /// Create a remove from `collection`.
    pub fn collection_remove_new(&mut self, collection: &Collection) -> Option<StatementId> {
        self.new_statement_on(OpKind::Remove, collection.target())
    }

    /// Statement `id`, if it is still alive.
    pub fn statement(&self, id: StatementId) -> Option<&Statement> {
        let stmt = self.statements.get(&id);
        match stmt {
            Some(_) => self.diag.clear(),
            None => self.diag.set_error(&unknown_statement(id)),
        }
        stmt
    }

    /// Mutable statement `id`, for setting clauses.
    pub fn statement_mut(&mut self, id: StatementId) -> Option<&mut Statement> {
        let stmt = self.statements.get_mut(&id);
        match stmt {
            Some(_) => self.diag.clear(),
            None => self.diag.set_error(&unknown_statement(id)),
        }
        stmt
    }

    /// Number of live statements.
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    /// Execute statement `id`, replacing its previous result.
    ///
    /// Refused without a round trip when the last clause setter on the
    /// statement failed or the session is not connected. Errors are recorded
    /// on the statement.
    pub fn execute(&mut self, id: StatementId) -> Option<&mut QueryResult> {
        if self.run_statement(id) {
            self.statements.get_mut(&id).and_then(Statement::result_mut)
        } else {
            None
        }
    }

    fn run_statement(&mut self, id: StatementId) -> bool {
        let Some(stmt) = self.statements.get_mut(&id) else {
            self.diag.set_error(&unknown_statement(id));
            return false;
        };
        if let Some(info) = stmt.clause_error() {
            stmt.diagnostic().set(info.clone());
            return false;
        }
        stmt.replace_result(None);

        let executor = &mut self.executor;
        let result = guarded(|| {
            let executor = executor.as_mut().ok_or(Error::SessionInvalid)?;
            stmt.check_executable()?;
            let reply = executor.execute(stmt.operation())?;
            Ok(QueryResult::new(Some(id), reply, stmt.doc_ids()))
        });
        match stmt.diagnostic().record(result) {
            Some(res) => {
                stmt.replace_result(Some(res));
                true
            }
            None => false,
        }
    }

    /// Execute statement `id`; on failure return the statement's error.
    pub(crate) fn run_for(&mut self, id: StatementId) -> std::result::Result<(), ErrorInfo> {
        if self.run_statement(id) {
            return Ok(());
        }
        Err(self.error_of(id))
    }

    /// Error recorded on statement `id`, or on the session if it is gone.
    pub(crate) fn error_of(&self, id: StatementId) -> ErrorInfo {
        self.statements
            .get(&id)
            .and_then(Statement::error)
            .or_else(|| self.diag.get())
            .unwrap_or_else(|| ErrorInfo::from(&Error::Unknown))
    }

    /// Current result of statement `id`.
    pub fn result_mut(&mut self, id: StatementId) -> Option<&mut QueryResult> {
        self.statements.get_mut(&id).and_then(Statement::result_mut)
    }

    /// Drop statement `id` and its result. Idempotent.
    pub fn free(&mut self, id: StatementId) {
        self.statements.remove(&id);
    }

    /// Drop the current result of statement `id`. Idempotent.
    pub fn free_result(&mut self, id: StatementId) {
        if let Some(stmt) = self.statements.get_mut(&id) {
            stmt.replace_result(None);
        }
    }

    /// Execute a raw query in one call.
    pub fn sql(&mut self, query: &str) -> Option<&mut QueryResult> {
        self.sql_param(query, &[])
    }

    /// Execute a raw query with positional parameters in one call.
    pub fn sql_param(&mut self, query: &str, params: &[Value]) -> Option<&mut QueryResult> {
        let id = self.sql_new(query)?;
        let bound = self
            .statements
            .get_mut(&id)
            .map_or(Status::Error, |stmt| stmt.bind(params));
        let outcome = if bound.is_error() {
            Err(self.error_of(id))
        } else {
            self.run_for(id)
        };
        match outcome {
            Ok(()) => {
                self.diag.clear();
                self.result_mut(id)
            }
            Err(info) => {
                self.diag.set(info);
                None
            }
        }
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    fn txn(&mut self, op: Operation, active_after: bool) -> bool {
        let result = self.request(&op);
        let ok = self.diag.check(result.map(|_| ()));
        if ok {
            self.in_transaction = active_after;
        }
        ok
    }

    /// Start a transaction.
    pub fn transaction_begin(&mut self) -> bool {
        self.txn(Operation::TxnBegin, true)
    }

    /// Commit the open transaction.
    pub fn transaction_commit(&mut self) -> bool {
        self.txn(Operation::TxnCommit, false)
    }

    /// Roll back the open transaction.
    pub fn transaction_rollback(&mut self) -> bool {
        self.txn(Operation::TxnRollback, false)
    }

    // =========================================================================
    // Schemas
    // =========================================================================

    /// Create schema `name`.
    pub fn create_schema(&mut self, name: &str) -> bool {
        let result = guarded(|| {
            let name = required_name(name, "schema")?;
            self.request(&Operation::CreateSchema { name }).map(|_| ())
        });
        self.diag.check(result)
    }

    /// Drop schema `name`.
    pub fn drop_schema(&mut self, name: &str) -> bool {
        let result = guarded(|| {
            let name = required_name(name, "schema")?;
            self.request(&Operation::DropSchema { name }).map(|_| ())
        });
        self.diag.check(result)
    }

    /// Handle for schema `name`; with `check`, the schema must exist.
    pub fn get_schema(&mut self, name: &str, check: bool) -> Option<Schema> {
        let result = guarded(|| {
            let name = required_name(name, "schema")?;
            if check {
                let found = self.list_names(&Operation::ListSchemas {
                    pattern: name.clone(),
                })?;
                if !found.iter().any(|n| *n == name) {
                    return Err(Error::invalid(format!("Unknown schema '{}'", name)));
                }
            }
            Ok(Schema::new(name))
        });
        self.diag.record(result)
    }

    /// List schemas whose names match `pattern` (`%` and `_` wildcards).
    ///
    /// The result lives in the session's catalog slot until the next listing.
    pub fn get_schemas(&mut self, pattern: &str) -> Option<&mut QueryResult> {
        let pattern = if pattern.is_empty() { "%" } else { pattern }.to_string();
        let ok = {
            let result = guarded(|| {
                self.list_into_catalog(&Operation::ListSchemas { pattern })
                    .map(|_| ())
            });
            self.diag.check(result)
        };
        if ok {
            self.catalog.as_mut()
        } else {
            None
        }
    }

    pub(crate) fn catalog_mut(&mut self) -> Option<&mut QueryResult> {
        self.catalog.as_mut()
    }
}

impl HasDiagnostic for Session {
    fn diagnostic(&self) -> &Diagnostic {
        &self.diag
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

fn unknown_statement(id: StatementId) -> Error {
    Error::invalid(format!("Unknown statement {}", id))
}

pub(crate) fn required_name(name: &str, what: &str) -> Result<String> {
    if name.is_empty() {
        Err(Error::missing_name(what))
    } else {
        Ok(name.to_string())
    }
}

// =============================================================================
// Session factories with error out-parameters
// =============================================================================

fn finish(session: Session, err_msg: &mut [u8], err_code: &mut u32) -> Option<Session> {
    if session.is_valid() {
        return Some(session);
    }
    let info = session
        .error()
        .unwrap_or_else(|| ErrorInfo::from(&Error::Unknown));
    info.copy_message_into(err_msg);
    *err_code = info.code();
    // The partially built session is torn down here.
    drop(session);
    None
}

/// Connect with discrete parameters, reporting failure through `err_msg`
/// (NUL-terminated, truncated) and `err_code`.
///
/// `None` host or user default to `localhost` and `root`; port `0` is the
/// default port.
#[allow(clippy::too_many_arguments)]
pub fn get_session(
    driver: &dyn Driver,
    host: Option<&str>,
    port: u16,
    user: Option<&str>,
    password: Option<&str>,
    database: Option<&str>,
    err_msg: &mut [u8],
    err_code: &mut u32,
) -> Option<Session> {
    let session = Session::connect(
        driver,
        host.unwrap_or("localhost"),
        port,
        user.unwrap_or("root"),
        password,
        database,
    );
    finish(session, err_msg, err_code)
}

/// Connect with a connection string, reporting failure like [`get_session`].
pub fn get_session_from_url(
    driver: &dyn Driver,
    url: &str,
    err_msg: &mut [u8],
    err_code: &mut u32,
) -> Option<Session> {
    finish(Session::from_uri(driver, url), err_msg, err_code)
}

/// Connect with an option set, reporting failure like [`get_session`].
pub fn get_session_from_options(
    driver: &dyn Driver,
    opts: &SessionOptions,
    err_msg: &mut [u8],
    err_code: &mut u32,
) -> Option<Session> {
    finish(Session::from_options(driver, opts), err_msg, err_code)
}
