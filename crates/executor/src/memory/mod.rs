//! In-process reference driver.
//!
//! [`MemoryDriver`] implements the driver contract against an in-memory
//! catalog of schemas, tables and collections. It evaluates simple filter
//! expressions (comparisons joined by `AND`/`OR`, `LIKE`, `IS NULL`,
//! arithmetic, `:name` placeholders), ordering, limits and projections, and
//! answers raw queries from registered replies. It is a test double, not a
//! query engine.
//!
//! Connections created from one driver share its catalog. A transaction
//! snapshots the whole catalog on begin; rollback, or closing the connection
//! with the transaction still open, restores the snapshot. Transactions are
//! not isolated from other connections.
//!
//! # Example
//!
//! ```ignore
//! use xapi_executor::{ColumnType, MemoryDriver, Session, TableSpec};
//!
//! let driver = MemoryDriver::new().with_schema("test");
//! driver.create_table(
//!     "test",
//!     "users",
//!     TableSpec::new()
//!         .column("id", ColumnType::Uint)
//!         .column("name", ColumnType::String)
//!         .auto_increment("id"),
//! )?;
//! let session = Session::connect(&driver, "localhost", 0, "root", None, Some("test"));
//! ```

mod catalog;
mod expr;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use xapi_core::{ColumnDescriptor, ColumnType, Document, Value};

use crate::driver::{ConnectSettings, Connection, Driver, Reply, RowSet};
use crate::operation::{Operation, Target};

use catalog::{column_type_of, Catalog, NoFields, TableData};
use expr::{split_alias, split_list, Bindings, Expr};

type Result<T> = xapi_core::Result<T>;

/// Server-style error numbers reported by the in-memory driver.
pub mod codes {
    /// Wrong user name or password
    pub const ACCESS_DENIED: u32 = 1045;
    /// Schema does not exist
    pub const BAD_DB: u32 = 1049;
    /// Schema already exists
    pub const DB_CREATE_EXISTS: u32 = 1007;
    /// Dropping a schema that does not exist
    pub const DB_DROP_EXISTS: u32 = 1008;
    /// Table or collection name already taken
    pub const TABLE_EXISTS: u32 = 1050;
    /// Dropping a table or collection that does not exist
    pub const BAD_TABLE: u32 = 1051;
    /// Unknown column
    pub const BAD_FIELD: u32 = 1054;
    /// Duplicate index name
    pub const DUP_KEYNAME: u32 = 1061;
    /// Duplicate primary key or document id
    pub const DUP_ENTRY: u32 = 1062;
    /// Malformed query or expression
    pub const PARSE_ERROR: u32 = 1064;
    /// Dropping an index that does not exist
    pub const CANT_DROP_KEY: u32 = 1091;
    /// Row width does not match the column list
    pub const WRONG_VALUE_COUNT: u32 = 1136;
    /// Table or collection does not exist
    pub const NO_SUCH_TABLE: u32 = 1146;
    /// Insert into a view
    pub const NON_INSERTABLE: u32 = 1471;
    /// Clause the driver does not evaluate
    pub const NOT_SUPPORTED: u32 = 1235;
    /// Placeholder used in an expression without a bound value
    pub const UNBOUND_PLACEHOLDER: u32 = 5154;
    /// Document path does not fit the document
    pub const BAD_DOC_PATH: u32 = 5052;
    /// Modification of the document id
    pub const FORBIDDEN_ID_UPDATE: u32 = 5053;
}

// =============================================================================
// Table definitions
// =============================================================================

/// Definition of a table created with [`MemoryDriver::create_table`].
#[derive(Debug, Clone, Default)]
pub struct TableSpec {
    columns: Vec<(String, ColumnType)>,
    auto_increment: Option<String>,
    view: bool,
}

impl TableSpec {
    /// Empty definition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column.
    pub fn column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.push((name.into(), column_type));
        self
    }

    /// Fill `name` with increasing numbers when an insert leaves it NULL.
    pub fn auto_increment(mut self, name: impl Into<String>) -> Self {
        self.auto_increment = Some(name.into());
        self
    }

    /// Make this a view: listed as `VIEW` and not insertable.
    pub fn view(mut self) -> Self {
        self.view = true;
        self
    }
}

// =============================================================================
// Driver
// =============================================================================

#[derive(Debug, Default)]
struct State {
    catalog: Catalog,
    sql_replies: HashMap<String, Reply>,
    credentials: Option<(String, Option<String>)>,
    offline: bool,
    open_connections: usize,
}

/// In-memory implementation of [`Driver`].
///
/// Cloning yields another handle on the same catalog.
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    state: Arc<Mutex<State>>,
}

impl MemoryDriver {
    /// Driver with an empty catalog that accepts any credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add schema `name`, ignoring it if it exists.
    pub fn with_schema(self, name: &str) -> Self {
        {
            let mut state = self.state.lock();
            if !state.catalog.has_schema(name) {
                // Checked above, cannot collide.
                let _ = state.catalog.create_schema(name);
            }
        }
        self
    }

    /// Only accept `user` with `password`.
    pub fn with_credentials(self, user: &str, password: Option<&str>) -> Self {
        self.state.lock().credentials = Some((user.to_string(), password.map(str::to_string)));
        self
    }

    /// Refuse every connection attempt.
    pub fn offline(self) -> Self {
        self.state.lock().offline = true;
        self
    }

    /// Create a schema.
    pub fn create_schema(&self, name: &str) -> Result<()> {
        self.state.lock().catalog.create_schema(name)
    }

    /// Create a table (or view) from `spec`.
    pub fn create_table(&self, schema: &str, name: &str, spec: TableSpec) -> Result<()> {
        let columns: Vec<ColumnDescriptor> = spec
            .columns
            .iter()
            .map(|(col, ty)| ColumnDescriptor::new(col.as_str(), *ty).with_table(schema, name))
            .collect();
        let auto_increment = match &spec.auto_increment {
            Some(col) => Some(spec.columns.iter().position(|(c, _)| c == col).ok_or_else(|| {
                xapi_core::Error::server(codes::BAD_FIELD, format!("Unknown column '{}'", col))
            })?),
            None => None,
        };
        let target = Target::new(schema, name);
        self.state
            .lock()
            .catalog
            .create_table(&target, TableData::new(columns, auto_increment, spec.view))
    }

    /// Insert full-width rows directly, bypassing any session.
    pub fn insert_rows(&self, schema: &str, table: &str, rows: Vec<Vec<Value>>) -> Result<u64> {
        let op = Operation::Insert {
            target: Target::new(schema, table),
            columns: Vec::new(),
            rows,
        };
        Ok(self.state.lock().catalog.apply(&op)?.affected_rows)
    }

    /// Answer the raw query `query` with `reply`.
    pub fn on_sql(&self, query: &str, reply: Reply) {
        self.state
            .lock()
            .sql_replies
            .insert(query.trim().to_string(), reply);
    }

    /// Current rows of a table.
    pub fn rows(&self, schema: &str, table: &str) -> Result<Vec<Vec<Value>>> {
        self.state.lock().catalog.rows(&Target::new(schema, table))
    }

    /// Current documents of a collection.
    pub fn documents(&self, schema: &str, collection: &str) -> Result<Vec<Document>> {
        self.state
            .lock()
            .catalog
            .documents(&Target::new(schema, collection))
    }

    /// Number of connections that have not been closed.
    pub fn open_connections(&self) -> usize {
        self.state.lock().open_connections
    }
}

impl Driver for MemoryDriver {
    fn connect(&self, settings: &ConnectSettings) -> Result<Box<dyn Connection>> {
        let mut state = self.state.lock();
        if state.offline {
            return Err(xapi_core::Error::Connection(format!(
                "Can't connect to server on '{}:{}'",
                settings.host, settings.port
            )));
        }
        if let Some((user, password)) = &state.credentials {
            if *user != settings.user || *password != settings.password {
                return Err(xapi_core::Error::server(
                    codes::ACCESS_DENIED,
                    format!(
                        "Access denied for user '{}'@'{}' (using password: {})",
                        settings.user,
                        settings.host,
                        if settings.password.is_some() { "YES" } else { "NO" }
                    ),
                ));
            }
        }
        if let Some(db) = &settings.database {
            if !state.catalog.has_schema(db) {
                return Err(xapi_core::Error::server(
                    codes::BAD_DB,
                    format!("Unknown database '{}'", db),
                ));
            }
        }
        state.open_connections += 1;
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
            snapshot: None,
            closed: false,
        }))
    }
}

// =============================================================================
// Connection
// =============================================================================

struct MemoryConnection {
    state: Arc<Mutex<State>>,
    snapshot: Option<Catalog>,
    closed: bool,
}

impl Connection for MemoryConnection {
    fn execute(&mut self, op: &Operation) -> Result<Reply> {
        if self.closed {
            return Err(xapi_core::Error::Connection("connection is closed".into()));
        }
        let mut state = self.state.lock();
        match op {
            // A begin inside a transaction commits the open one first.
            Operation::TxnBegin => {
                self.snapshot = Some(state.catalog.clone());
                Ok(Reply::default())
            }
            Operation::TxnCommit => {
                self.snapshot = None;
                Ok(Reply::default())
            }
            Operation::TxnRollback => {
                if let Some(saved) = self.snapshot.take() {
                    state.catalog = saved;
                }
                Ok(Reply::default())
            }
            Operation::Sql { query, params } => raw_query(&state, query, params),
            other => {
                // Work on a copy so a failing statement leaves no trace.
                let mut next = state.catalog.clone();
                let reply = next.apply(other)?;
                state.catalog = next;
                Ok(reply)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut state = self.state.lock();
        if let Some(saved) = self.snapshot.take() {
            state.catalog = saved;
        }
        state.open_connections = state.open_connections.saturating_sub(1);
        Ok(())
    }
}

/// Registered replies first; otherwise `SELECT <expr>[, <expr>...]` over
/// literals and `?` placeholders.
fn raw_query(state: &State, query: &str, params: &[Value]) -> Result<Reply> {
    let query = query.trim().trim_end_matches(';').trim();
    if let Some(reply) = state.sql_replies.get(query) {
        return Ok(reply.clone());
    }
    let list = query
        .get(..7)
        .filter(|head| head.eq_ignore_ascii_case("SELECT "))
        .map(|_| &query[7..])
        .ok_or_else(|| {
            xapi_core::Error::server(
                codes::PARSE_ERROR,
                format!("You have an error in your SQL syntax near '{}'", query),
            )
        })?;

    let mut columns = Vec::new();
    let mut row = Vec::new();
    let mut consumed = 0;
    for item in split_list(list) {
        let (text, alias) = split_alias(item);
        let expr = Expr::parse(text)?;
        // Each item numbers its placeholders from one; shift past earlier items.
        let shifted = Bindings {
            named: None,
            positional: params.get(consumed..).unwrap_or(&[]),
        };
        consumed += text.matches('?').count();
        let value = Value::from(&expr.eval(&NoFields, &shifted)?);
        columns.push(ColumnDescriptor::new(alias.unwrap_or(text), column_type_of(&value)));
        row.push(value);
    }
    Ok(Reply::with_set(RowSet {
        columns,
        rows: vec![row],
    }))
}
