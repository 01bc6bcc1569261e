//! Operation descriptors shipped to the driver.
//!
//! An [`Operation`] is the fully assembled form of a statement or a session
//! request. Operations are:
//! - **Self-contained**: All clause state needed for execution is in the variant
//! - **Serializable**: Can be converted to/from JSON for logging or shipping
//! - **Uninterpreted**: Filter, ordering and projection expressions are carried
//!   as the caller wrote them; the driver parses them

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use xapi_core::{DocPath, Document, Value};

/// Statement kind. Codes are part of the stable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpKind {
    /// Raw SQL query
    Sql = 1,
    /// Table select
    Select = 2,
    /// Table insert
    Insert = 3,
    /// Table update
    Update = 4,
    /// Table delete
    Delete = 5,
    /// Collection add
    Add = 6,
    /// Collection find
    Find = 7,
    /// Collection modify
    Modify = 8,
    /// Collection remove
    Remove = 9,
}

impl OpKind {
    /// Numeric code of this kind.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up a kind by its numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        let kind = match code {
            1 => OpKind::Sql,
            2 => OpKind::Select,
            3 => OpKind::Insert,
            4 => OpKind::Update,
            5 => OpKind::Delete,
            6 => OpKind::Add,
            7 => OpKind::Find,
            8 => OpKind::Modify,
            9 => OpKind::Remove,
            _ => return None,
        };
        Some(kind)
    }

    /// Human readable name used in messages.
    pub fn name(self) -> &'static str {
        match self {
            OpKind::Sql => "SQL",
            OpKind::Select => "table select",
            OpKind::Insert => "table insert",
            OpKind::Update => "table update",
            OpKind::Delete => "table delete",
            OpKind::Add => "collection add",
            OpKind::Find => "collection find",
            OpKind::Modify => "collection modify",
            OpKind::Remove => "collection remove",
        }
    }

}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Statement clause, used to report misuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Clause {
    Where,
    Having,
    GroupBy,
    OrderBy,
    Limit,
    Projection,
    Bind,
    NamedBind,
    InsertColumns,
    InsertRows,
    AddDocument,
    UpdateValues,
    ModifyOps,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Clause::Where => "WHERE",
            Clause::Having => "HAVING",
            Clause::GroupBy => "GROUP BY",
            Clause::OrderBy => "ORDER BY",
            Clause::Limit => "LIMIT",
            Clause::Projection => "Projection",
            Clause::Bind => "Positional parameter binding",
            Clause::NamedBind => "Named parameter binding",
            Clause::InsertColumns => "Insert column list",
            Clause::InsertRows => "Insert rows",
            Clause::AddDocument => "Adding documents",
            Clause::UpdateValues => "Update values",
            Clause::ModifyOps => "Modify operations",
        })
    }
}

/// Schema-qualified name of a table or collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Target {
    pub schema: String,
    pub name: String,
}

impl Target {
    /// Create a target.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`.`{}`", self.schema, self.name)
    }
}

/// Sort direction. Codes are part of the stable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SortDirection {
    Asc = 1,
    Desc = 2,
}

/// One ORDER BY item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub expr: String,
    pub direction: SortDirection,
}

impl OrderBy {
    /// Ascending on `expr`.
    pub fn asc(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Descending on `expr`.
    pub fn desc(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Row locking mode. Accepted by the API but never supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowLock {
    Shared,
    Exclusive,
}

/// A value assigned by an update or modify: a literal or an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Param {
    Value(Value),
    Expr(String),
}

impl Param {
    /// Expression parameter.
    pub fn expr(text: impl Into<String>) -> Self {
        Param::Expr(text.into())
    }
}

impl From<Value> for Param {
    fn from(v: Value) -> Self {
        Param::Value(v)
    }
}

/// Column assignment of a table update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: String,
    pub value: Param,
}

/// One change applied by a collection modify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModifyOp {
    /// Set a document member
    Set { path: DocPath, value: Param },
    /// Remove a document member
    Unset { path: DocPath },
    /// Insert before an array element
    ArrayInsert { path: DocPath, value: Param },
    /// Append to an array
    ArrayAppend { path: DocPath, value: Param },
    /// Delete an array element
    ArrayDelete { path: DocPath },
}

impl ModifyOp {
    /// Path the operation applies to.
    pub fn path(&self) -> &DocPath {
        match self {
            ModifyOp::Set { path, .. }
            | ModifyOp::Unset { path }
            | ModifyOp::ArrayInsert { path, .. }
            | ModifyOp::ArrayAppend { path, .. }
            | ModifyOp::ArrayDelete { path } => path,
        }
    }
}

/// Filtering, grouping, ordering and paging clauses, plus the named
/// parameters their expressions refer to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Criteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub having: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
}

/// An operation to be executed by the driver.
///
/// # Categories
///
/// | Category | Variants |
/// |----------|----------|
/// | Statement | `Sql`, `Select`, `Insert`, `Update`, `Delete`, `Add`, `Find`, `Modify`, `Remove` |
/// | Transaction | `TxnBegin`, `TxnCommit`, `TxnRollback` |
/// | Catalog | `CreateSchema`, `DropSchema`, `CreateCollection`, `DropCollection`, `CreateIndex`, `DropIndex` |
/// | Listing | `ListSchemas`, `ListTables`, `ListCollections` |
///
/// Listings produce one data set with a single `name` column (plus a `type`
/// column for tables).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub enum Operation {
    // ==================== Statements ====================
    Sql {
        query: String,
        #[serde(default)]
        params: Vec<Value>,
    },
    Select {
        target: Target,
        #[serde(default)]
        criteria: Criteria,
        #[serde(default)]
        projection: Vec<String>,
    },
    Insert {
        target: Target,
        #[serde(default)]
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    Update {
        target: Target,
        #[serde(default)]
        criteria: Criteria,
        assignments: Vec<Assignment>,
    },
    Delete {
        target: Target,
        #[serde(default)]
        criteria: Criteria,
    },
    Add {
        target: Target,
        documents: Vec<Document>,
    },
    Find {
        target: Target,
        #[serde(default)]
        criteria: Criteria,
        #[serde(default)]
        projection: Vec<String>,
    },
    Modify {
        target: Target,
        #[serde(default)]
        criteria: Criteria,
        operations: Vec<ModifyOp>,
    },
    Remove {
        target: Target,
        #[serde(default)]
        criteria: Criteria,
    },

    // ==================== Transactions ====================
    TxnBegin,
    TxnCommit,
    TxnRollback,

    // ==================== Catalog ====================
    CreateSchema {
        name: String,
    },
    DropSchema {
        name: String,
    },
    CreateCollection {
        target: Target,
    },
    DropCollection {
        target: Target,
    },
    CreateIndex {
        target: Target,
        name: String,
        definition: String,
    },
    DropIndex {
        target: Target,
        name: String,
    },

    // ==================== Listings ====================
    ListSchemas {
        pattern: String,
    },
    ListTables {
        schema: String,
        pattern: String,
        include_views: bool,
    },
    ListCollections {
        schema: String,
        pattern: String,
    },
}

impl Operation {
    /// Raw query with no parameters bound.
    pub fn sql(query: impl Into<String>) -> Self {
        Operation::Sql {
            query: query.into(),
            params: Vec::new(),
        }
    }

    /// Empty CRUD statement of `kind` on `target`. Returns `None` for
    /// [`OpKind::Sql`], which has no target; use [`Operation::sql`].
    pub fn statement(kind: OpKind, target: Target) -> Option<Self> {
        let op = match kind {
            OpKind::Sql => return None,
            OpKind::Select => Operation::Select {
                target,
                criteria: Criteria::default(),
                projection: Vec::new(),
            },
            OpKind::Insert => Operation::Insert {
                target,
                columns: Vec::new(),
                rows: Vec::new(),
            },
            OpKind::Update => Operation::Update {
                target,
                criteria: Criteria::default(),
                assignments: Vec::new(),
            },
            OpKind::Delete => Operation::Delete {
                target,
                criteria: Criteria::default(),
            },
            OpKind::Add => Operation::Add {
                target,
                documents: Vec::new(),
            },
            OpKind::Find => Operation::Find {
                target,
                criteria: Criteria::default(),
                projection: Vec::new(),
            },
            OpKind::Modify => Operation::Modify {
                target,
                criteria: Criteria::default(),
                operations: Vec::new(),
            },
            OpKind::Remove => Operation::Remove {
                target,
                criteria: Criteria::default(),
            },
        };
        Some(op)
    }

    /// Statement kind, `None` for session requests.
    pub fn kind(&self) -> Option<OpKind> {
        let kind = match self {
            Operation::Sql { .. } => OpKind::Sql,
            Operation::Select { .. } => OpKind::Select,
            Operation::Insert { .. } => OpKind::Insert,
            Operation::Update { .. } => OpKind::Update,
            Operation::Delete { .. } => OpKind::Delete,
            Operation::Add { .. } => OpKind::Add,
            Operation::Find { .. } => OpKind::Find,
            Operation::Modify { .. } => OpKind::Modify,
            Operation::Remove { .. } => OpKind::Remove,
            _ => return None,
        };
        Some(kind)
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Sql { .. } => "Sql",
            Operation::Select { .. } => "Select",
            Operation::Insert { .. } => "Insert",
            Operation::Update { .. } => "Update",
            Operation::Delete { .. } => "Delete",
            Operation::Add { .. } => "Add",
            Operation::Find { .. } => "Find",
            Operation::Modify { .. } => "Modify",
            Operation::Remove { .. } => "Remove",
            Operation::TxnBegin => "TxnBegin",
            Operation::TxnCommit => "TxnCommit",
            Operation::TxnRollback => "TxnRollback",
            Operation::CreateSchema { .. } => "CreateSchema",
            Operation::DropSchema { .. } => "DropSchema",
            Operation::CreateCollection { .. } => "CreateCollection",
            Operation::DropCollection { .. } => "DropCollection",
            Operation::CreateIndex { .. } => "CreateIndex",
            Operation::DropIndex { .. } => "DropIndex",
            Operation::ListSchemas { .. } => "ListSchemas",
            Operation::ListTables { .. } => "ListTables",
            Operation::ListCollections { .. } => "ListCollections",
        }
    }

    /// Table or collection the operation works on.
    pub fn target(&self) -> Option<&Target> {
        match self {
            Operation::Select { target, .. }
            | Operation::Insert { target, .. }
            | Operation::Update { target, .. }
            | Operation::Delete { target, .. }
            | Operation::Add { target, .. }
            | Operation::Find { target, .. }
            | Operation::Modify { target, .. }
            | Operation::Remove { target, .. }
            | Operation::CreateCollection { target }
            | Operation::DropCollection { target }
            | Operation::CreateIndex { target, .. }
            | Operation::DropIndex { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Filtering clauses, for the kinds that have them.
    pub fn criteria(&self) -> Option<&Criteria> {
        match self {
            Operation::Select { criteria, .. }
            | Operation::Update { criteria, .. }
            | Operation::Delete { criteria, .. }
            | Operation::Find { criteria, .. }
            | Operation::Modify { criteria, .. }
            | Operation::Remove { criteria, .. } => Some(criteria),
            _ => None,
        }
    }

    pub(crate) fn criteria_mut(&mut self) -> Option<&mut Criteria> {
        match self {
            Operation::Select { criteria, .. }
            | Operation::Update { criteria, .. }
            | Operation::Delete { criteria, .. }
            | Operation::Find { criteria, .. }
            | Operation::Modify { criteria, .. }
            | Operation::Remove { criteria, .. } => Some(criteria),
            _ => None,
        }
    }
}
