//! Statement construction.
//!
//! A [`Statement`] holds the clause state of one operation kind as an
//! [`Operation`] value; the variant is fixed when the statement is created
//! and the setters fill in its fields. Setters follow three rules:
//!
//! - a clause is accepted only by the kinds that use it, anything else is a
//!   [`Error::ClauseNotAllowed`];
//! - arguments are validated completely before anything is assigned, so a
//!   rejected call leaves the statement exactly as it was;
//! - every setter replaces the clause it sets, except
//!   [`Statement::add_document`], which appends.
//!
//! Once any setter has been rejected the statement stays unexecutable.
//!
//! | Clause | Kinds |
//! |--------|-------|
//! | where, order by, limit, named parameters | select, update, delete, find, modify, remove |
//! | having, group by, projection | select, find |
//! | positional parameters | SQL |
//! | insert columns / rows / values | insert |
//! | documents | add |
//! | update values | update |
//! | modify operations | modify |
//! | row locking | none |

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use xapi_core::{DocPath, Document, Value};

use crate::diagnostic::{guarded, Diagnostic, ErrorInfo, HasDiagnostic, Status};
use crate::operation::{
    Assignment, Clause, Criteria, ModifyOp, OpKind, Operation, OrderBy, Param, RowLock, Target,
};
use crate::result::QueryResult;
use crate::{Error, Result};

/// Identity of a statement within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StatementId(pub u64);

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stmt#{}", self.0)
    }
}

const FILTERED: &[OpKind] = &[
    OpKind::Select,
    OpKind::Update,
    OpKind::Delete,
    OpKind::Find,
    OpKind::Modify,
    OpKind::Remove,
];

const GROUPED: &[OpKind] = &[OpKind::Select, OpKind::Find];

/// A statement under construction, plus its current result.
#[derive(Debug)]
pub struct Statement {
    id: StatementId,
    kind: OpKind,
    op: Operation,
    result: Option<QueryResult>,
    clause_error: Option<ErrorInfo>,
    diag: Diagnostic,
}

fn not_allowed(kind: OpKind, clause: Clause) -> Error {
    Error::ClauseNotAllowed {
        clause: clause.to_string(),
        kind: kind.name().to_string(),
    }
}

fn non_empty(text: &str, what: &str) -> Result<String> {
    if text.trim().is_empty() {
        Err(Error::invalid(format!("Empty {}", what)))
    } else {
        Ok(text.to_string())
    }
}

fn names(items: &[&str], what: &str) -> Result<Vec<String>> {
    items.iter().map(|s| non_empty(s, what)).collect()
}

fn parse_path(path: &str) -> Result<DocPath> {
    let parsed: DocPath = path.parse()?;
    if parsed.is_root() {
        return Err(Error::invalid("Document path must name a member"));
    }
    Ok(parsed)
}

impl Statement {
    pub(crate) fn new(id: StatementId, kind: OpKind, target: Target) -> Result<Self> {
        let op = Operation::statement(kind, target)
            .ok_or_else(|| Error::invalid("SQL statements are created from a query"))?;
        Ok(Self::from_operation(id, kind, op))
    }

    pub(crate) fn sql(id: StatementId, query: &str) -> Self {
        Self::from_operation(id, OpKind::Sql, Operation::sql(query))
    }

    fn from_operation(id: StatementId, kind: OpKind, op: Operation) -> Self {
        Self {
            id,
            kind,
            op,
            result: None,
            clause_error: None,
            diag: Diagnostic::new(),
        }
    }

    /// Identity within the owning session.
    pub fn id(&self) -> StatementId {
        self.id
    }

    /// Operation kind, fixed at creation.
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// The assembled operation.
    pub fn operation(&self) -> &Operation {
        &self.op
    }

    /// Result of the last successful execution.
    pub fn result(&self) -> Option<&QueryResult> {
        self.result.as_ref()
    }

    /// Mutable access to the current result, for fetching.
    pub fn result_mut(&mut self) -> Option<&mut QueryResult> {
        self.result.as_mut()
    }

    pub(crate) fn replace_result(&mut self, result: Option<QueryResult>) {
        self.result = result;
    }

    /// Run a setter body at the boundary.
    fn apply(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Status {
        let result = guarded(|| f(self));
        if let Err(err) = &result {
            self.clause_error.get_or_insert_with(|| ErrorInfo::from(err));
        }
        self.diag.status(result.map(|()| Status::Ok))
    }

    /// True once any clause setter has failed. The rejected clause is not
    /// applied, so the statement is never executed; build a new one.
    pub fn has_clause_error(&self) -> bool {
        self.clause_error.is_some()
    }

    /// The first rejected clause, reported again on every execute attempt.
    pub(crate) fn clause_error(&self) -> Option<&ErrorInfo> {
        self.clause_error.as_ref()
    }

    fn criteria_for(&mut self, clause: Clause, kinds: &[OpKind]) -> Result<&mut Criteria> {
        let kind = self.kind;
        if !kinds.contains(&kind) {
            return Err(not_allowed(kind, clause));
        }
        self.op
            .criteria_mut()
            .ok_or_else(|| not_allowed(kind, clause))
    }

    // =========================================================================
    // Filtering and ordering
    // =========================================================================

    /// Set the filter expression.
    pub fn set_where(&mut self, expr: &str) -> Status {
        self.apply(|s| {
            let criteria = s.criteria_for(Clause::Where, FILTERED)?;
            criteria.filter = Some(non_empty(expr, "filter expression")?);
            Ok(())
        })
    }

    /// Set the HAVING expression.
    pub fn set_having(&mut self, expr: &str) -> Status {
        self.apply(|s| {
            let criteria = s.criteria_for(Clause::Having, GROUPED)?;
            criteria.having = Some(non_empty(expr, "HAVING expression")?);
            Ok(())
        })
    }

    /// Set the GROUP BY list.
    pub fn set_group_by(&mut self, exprs: &[&str]) -> Status {
        self.apply(|s| {
            let criteria = s.criteria_for(Clause::GroupBy, GROUPED)?;
            criteria.group_by = names(exprs, "GROUP BY expression")?;
            Ok(())
        })
    }

    /// Set the ORDER BY list.
    pub fn set_order_by(&mut self, items: &[OrderBy]) -> Status {
        self.apply(|s| {
            let criteria = s.criteria_for(Clause::OrderBy, FILTERED)?;
            for item in items {
                non_empty(&item.expr, "ORDER BY expression")?;
            }
            criteria.order_by = items.to_vec();
            Ok(())
        })
    }

    /// Set row limit and offset.
    ///
    /// Update, delete, modify and remove accept a limit only; their offset
    /// must be `0`.
    pub fn set_limit_and_offset(&mut self, limit: u64, offset: u64) -> Status {
        self.apply(|s| {
            let kind = s.kind;
            let criteria = s.criteria_for(Clause::Limit, FILTERED)?;
            if offset != 0 && !GROUPED.contains(&kind) {
                return Err(Error::invalid(format!(
                    "Offset is not supported for {} statements",
                    kind
                )));
            }
            criteria.limit = Some(limit);
            criteria.offset = offset;
            Ok(())
        })
    }

    /// Bind named placeholders (`:name`) used by the filter expressions.
    pub fn bind_named(&mut self, params: &[(&str, Value)]) -> Status {
        self.apply(|s| {
            let criteria = s.criteria_for(Clause::NamedBind, FILTERED)?;
            let mut bound = BTreeMap::new();
            for (name, value) in params {
                let name = non_empty(name, "parameter name")?;
                if bound.insert(name.clone(), value.clone()).is_some() {
                    return Err(Error::invalid(format!("Parameter '{}' bound twice", name)));
                }
            }
            criteria.params = bound;
            Ok(())
        })
    }

    // =========================================================================
    // Projection
    // =========================================================================

    /// Set the projection list of a select or find.
    pub fn set_items(&mut self, items: &[&str]) -> Status {
        self.apply(|s| {
            let kind = s.kind;
            let items = names(items, "projection item")?;
            match &mut s.op {
                Operation::Select { projection, .. } | Operation::Find { projection, .. } => {
                    *projection = items;
                    Ok(())
                }
                _ => Err(not_allowed(kind, Clause::Projection)),
            }
        })
    }

    /// Set the document projection of a find.
    pub fn set_find_projection(&mut self, expr: &str) -> Status {
        self.apply(|s| {
            let kind = s.kind;
            let Operation::Find { projection, .. } = &mut s.op else {
                return Err(not_allowed(kind, Clause::Projection));
            };
            *projection = vec![non_empty(expr, "projection")?];
            Ok(())
        })
    }

    // =========================================================================
    // Raw queries
    // =========================================================================

    /// Bind positional placeholders (`?`) of a raw query.
    pub fn bind(&mut self, values: &[Value]) -> Status {
        self.apply(|s| {
            let kind = s.kind;
            let Operation::Sql { params, .. } = &mut s.op else {
                return Err(not_allowed(kind, Clause::Bind));
            };
            *params = values.to_vec();
            Ok(())
        })
    }

    // =========================================================================
    // Table writes
    // =========================================================================

    fn insert_parts(&mut self, clause: Clause) -> Result<(&mut Vec<String>, &mut Vec<Vec<Value>>)> {
        let kind = self.kind;
        match &mut self.op {
            Operation::Insert { columns, rows, .. } => Ok((columns, rows)),
            _ => Err(not_allowed(kind, clause)),
        }
    }

    /// Set the column list of an insert.
    pub fn set_insert_columns(&mut self, cols: &[&str]) -> Status {
        self.apply(|s| {
            let (columns, _) = s.insert_parts(Clause::InsertColumns)?;
            *columns = names(cols, "column name")?;
            Ok(())
        })
    }

    /// Replace the insert payload with a single row.
    pub fn set_insert_row(&mut self, row: &[Value]) -> Status {
        self.set_insert_rows(vec![row.to_vec()])
    }

    /// Replace the insert payload with `new_rows`.
    pub fn set_insert_rows(&mut self, new_rows: Vec<Vec<Value>>) -> Status {
        self.apply(|s| {
            let (columns, rows) = s.insert_parts(Clause::InsertRows)?;
            if new_rows.is_empty() {
                return Err(Error::invalid("Insert has no rows"));
            }
            let width = if columns.is_empty() {
                new_rows.first().map_or(0, Vec::len)
            } else {
                columns.len()
            };
            if let Some((i, row)) = new_rows.iter().enumerate().find(|(_, r)| r.len() != width) {
                return Err(Error::invalid(format!(
                    "Row {} has {} values, expected {}",
                    i,
                    row.len(),
                    width
                )));
            }
            if width == 0 {
                return Err(Error::invalid("Empty row"));
            }
            *rows = new_rows;
            Ok(())
        })
    }

    /// Replace columns and payload with one row given as (column, value)
    /// pairs.
    pub fn set_insert_values(&mut self, values: &[(&str, Value)]) -> Status {
        self.apply(|s| {
            if values.is_empty() {
                return Err(Error::invalid("Empty row"));
            }
            let (columns, rows) = s.insert_parts(Clause::InsertRows)?;
            let names = values
                .iter()
                .map(|(name, _)| non_empty(name, "column name"))
                .collect::<Result<Vec<_>>>()?;
            *columns = names;
            *rows = vec![values.iter().map(|(_, v)| v.clone()).collect()];
            Ok(())
        })
    }

    /// Replace the assignments of an update.
    pub fn set_update_values(&mut self, values: &[(&str, Param)]) -> Status {
        self.apply(|s| {
            let kind = s.kind;
            let Operation::Update { assignments, .. } = &mut s.op else {
                return Err(not_allowed(kind, Clause::UpdateValues));
            };
            *assignments = values
                .iter()
                .map(|(column, value)| {
                    Ok(Assignment {
                        column: non_empty(column, "column name")?,
                        value: value.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(())
        })
    }

    // =========================================================================
    // Collection writes
    // =========================================================================

    /// Append a JSON document to an add. Unlike every other setter this does
    /// not replace earlier documents. A document without `_id` gets a
    /// generated one.
    pub fn add_document(&mut self, json: &str) -> Status {
        self.apply(|s| {
            let kind = s.kind;
            let Operation::Add { documents, .. } = &mut s.op else {
                return Err(not_allowed(kind, Clause::AddDocument));
            };
            if json.trim().is_empty() {
                return Err(Error::invalid("Missing JSON data"));
            }
            let mut doc = Document::parse(json)?;
            doc.ensure_id();
            documents.push(doc);
            Ok(())
        })
    }

    /// Replace the modify operations.
    pub fn set_modify_operations(&mut self, ops: Vec<ModifyOp>) -> Status {
        self.apply(|s| s.replace_modify_ops(ops))
    }

    /// Replace the modify operations with member assignments.
    pub fn modify_set(&mut self, items: &[(&str, Param)]) -> Status {
        self.apply(|s| {
            let ops = items
                .iter()
                .map(|(path, value)| {
                    Ok(ModifyOp::Set {
                        path: parse_path(path)?,
                        value: value.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            s.replace_modify_ops(ops)
        })
    }

    /// Replace the modify operations with member removals.
    pub fn modify_unset(&mut self, paths: &[&str]) -> Status {
        self.apply(|s| {
            let ops = paths
                .iter()
                .map(|path| Ok(ModifyOp::Unset { path: parse_path(path)? }))
                .collect::<Result<Vec<_>>>()?;
            s.replace_modify_ops(ops)
        })
    }

    /// Replace the modify operations with array insertions.
    pub fn modify_array_insert(&mut self, items: &[(&str, Param)]) -> Status {
        self.apply(|s| {
            let ops = items
                .iter()
                .map(|(path, value)| {
                    Ok(ModifyOp::ArrayInsert {
                        path: parse_path(path)?,
                        value: value.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            s.replace_modify_ops(ops)
        })
    }

    /// Replace the modify operations with array appends.
    pub fn modify_array_append(&mut self, items: &[(&str, Param)]) -> Status {
        self.apply(|s| {
            let ops = items
                .iter()
                .map(|(path, value)| {
                    Ok(ModifyOp::ArrayAppend {
                        path: parse_path(path)?,
                        value: value.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            s.replace_modify_ops(ops)
        })
    }

    /// Replace the modify operations with array element deletions.
    pub fn modify_array_delete(&mut self, paths: &[&str]) -> Status {
        self.apply(|s| {
            let ops = paths
                .iter()
                .map(|path| Ok(ModifyOp::ArrayDelete { path: parse_path(path)? }))
                .collect::<Result<Vec<_>>>()?;
            s.replace_modify_ops(ops)
        })
    }

    fn replace_modify_ops(&mut self, ops: Vec<ModifyOp>) -> Result<()> {
        let kind = self.kind;
        let Operation::Modify { operations, .. } = &mut self.op else {
            return Err(not_allowed(kind, Clause::ModifyOps));
        };
        if let Some(op) = ops.iter().find(|op| op.path().is_root()) {
            return Err(Error::invalid(format!(
                "Document path {} must name a member",
                op.path()
            )));
        }
        *operations = ops;
        Ok(())
    }

    // =========================================================================
    // Unsupported
    // =========================================================================

    /// Row locking is not supported by this binding; always fails.
    pub fn set_row_locking(&mut self, _mode: RowLock) -> Status {
        self.apply(|_| Err(Error::NotImplemented))
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Check that the assembled operation can be shipped.
    pub(crate) fn check_executable(&self) -> Result<()> {
        match &self.op {
            Operation::Sql { query, .. } if query.trim().is_empty() => {
                Err(Error::invalid("Empty query"))
            }
            Operation::Insert { columns, rows, .. } => {
                if rows.is_empty() {
                    return Err(Error::invalid("Insert has no rows"));
                }
                if !columns.is_empty() && rows.iter().any(|r| r.len() != columns.len()) {
                    return Err(Error::invalid(format!(
                        "Insert rows must have {} values",
                        columns.len()
                    )));
                }
                Ok(())
            }
            Operation::Add { documents, .. } if documents.is_empty() => {
                Err(Error::invalid("No documents to add"))
            }
            Operation::Update { assignments, .. } if assignments.is_empty() => {
                Err(Error::invalid("Update has no values"))
            }
            Operation::Modify { operations, .. } if operations.is_empty() => {
                Err(Error::invalid("Modify has no operations"))
            }
            _ => Ok(()),
        }
    }

    /// Document ids of an add, in insertion order.
    pub(crate) fn doc_ids(&self) -> Vec<String> {
        match &self.op {
            Operation::Add { documents, .. } => documents.iter().filter_map(Document::id).collect(),
            _ => Vec::new(),
        }
    }
}

impl HasDiagnostic for Statement {
    fn diagnostic(&self) -> &Diagnostic {
        &self.diag
    }
}
