//! Schema, table and collection handles.
//!
//! Handles are plain names; every call that talks to the server takes the
//! owning [`Session`]. The one-shot helpers (`select`, `insert`, `find`,
//! `add`, ...) build a statement, execute it and return its result. When they
//! fail, the statement's error is copied to the handle.

use xapi_core::Value;

use crate::diagnostic::{guarded, Diagnostic, HasDiagnostic, Status};
use crate::operation::{OpKind, Operation, OrderBy, Param, Target};
use crate::result::QueryResult;
use crate::session::{required_name, Session};
use crate::statement::Statement;
use crate::{Error, Result};

/// Filter used by collection helpers when none is given.
const MATCH_ALL: &str = "true";

fn ok(status: Status) -> bool {
    !status.is_error()
}

/// Build, configure and run a statement in one call.
fn one_shot<'s>(
    diag: &Diagnostic,
    session: &'s mut Session,
    kind: OpKind,
    target: &Target,
    configure: impl FnOnce(&mut Statement) -> bool,
) -> Option<&'s mut QueryResult> {
    let Some(id) = session.new_statement_on(kind, target) else {
        if let Some(info) = session.error() {
            diag.set(info);
        }
        return None;
    };
    let configured = session.statement_mut(id).map_or(false, configure);
    let outcome = if configured {
        session.run_for(id)
    } else {
        Err(session.error_of(id))
    };
    match outcome {
        Ok(()) => {
            diag.clear();
            session.result_mut(id)
        }
        Err(info) => {
            diag.set(info);
            None
        }
    }
}

// =============================================================================
// Schema
// =============================================================================

/// A schema on the server.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    diag: Diagnostic,
}

impl Schema {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            diag: Diagnostic::new(),
        }
    }

    /// Schema name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn target(&self, name: &str, what: &str) -> Result<Target> {
        Ok(Target::new(self.name.clone(), required_name(name, what)?))
    }

    fn exists(&self, session: &mut Session, op: &Operation, name: &str) -> Result<bool> {
        Ok(session.list_names(op)?.iter().any(|n| n == name))
    }

    /// Handle for table `name`; with `check`, the table (or view) must exist.
    pub fn get_table(&self, session: &mut Session, name: &str, check: bool) -> Option<Table> {
        let result = guarded(|| {
            let target = self.target(name, "table")?;
            if check {
                let op = Operation::ListTables {
                    schema: self.name.clone(),
                    pattern: target.name.clone(),
                    include_views: true,
                };
                if !self.exists(session, &op, &target.name)? {
                    return Err(Error::invalid(format!("Unknown table {}", target)));
                }
            }
            Ok(Table::new(target))
        });
        self.diag.record(result)
    }

    /// Handle for collection `name`; with `check`, the collection must exist.
    pub fn get_collection(
        &self,
        session: &mut Session,
        name: &str,
        check: bool,
    ) -> Option<Collection> {
        let result = guarded(|| {
            let target = self.target(name, "collection")?;
            if check {
                let op = Operation::ListCollections {
                    schema: self.name.clone(),
                    pattern: target.name.clone(),
                };
                if !self.exists(session, &op, &target.name)? {
                    return Err(Error::invalid(format!("Unknown collection {}", target)));
                }
            }
            Ok(Collection::new(target))
        });
        self.diag.record(result)
    }

    /// Create collection `name`.
    pub fn create_collection(&self, session: &mut Session, name: &str) -> bool {
        let result = guarded(|| {
            let target = self.target(name, "collection")?;
            session.request(&Operation::CreateCollection { target }).map(|_| ())
        });
        self.diag.check(result)
    }

    /// Drop collection `name`.
    pub fn drop_collection(&self, session: &mut Session, name: &str) -> bool {
        let result = guarded(|| {
            let target = self.target(name, "collection")?;
            session.request(&Operation::DropCollection { target }).map(|_| ())
        });
        self.diag.check(result)
    }

    fn listing<'s>(&self, session: &'s mut Session, op: Operation) -> Option<&'s mut QueryResult> {
        let result = guarded(|| session.list_into_catalog(&op).map(|_| ()));
        if self.diag.check(result) {
            session.catalog_mut()
        } else {
            None
        }
    }

    /// List tables matching `pattern`; views are included with `show_views`.
    pub fn get_tables<'s>(
        &self,
        session: &'s mut Session,
        pattern: &str,
        show_views: bool,
    ) -> Option<&'s mut QueryResult> {
        let op = Operation::ListTables {
            schema: self.name.clone(),
            pattern: match_pattern(pattern),
            include_views: show_views,
        };
        self.listing(session, op)
    }

    /// List collections matching `pattern`.
    pub fn get_collections<'s>(
        &self,
        session: &'s mut Session,
        pattern: &str,
    ) -> Option<&'s mut QueryResult> {
        let op = Operation::ListCollections {
            schema: self.name.clone(),
            pattern: match_pattern(pattern),
        };
        self.listing(session, op)
    }
}

impl HasDiagnostic for Schema {
    fn diagnostic(&self) -> &Diagnostic {
        &self.diag
    }
}

fn match_pattern(pattern: &str) -> String {
    if pattern.is_empty() { "%" } else { pattern }.to_string()
}

// =============================================================================
// Table
// =============================================================================

/// A table (or view) in a schema.
#[derive(Debug, Clone)]
pub struct Table {
    target: Target,
    diag: Diagnostic,
}

impl Table {
    pub(crate) fn new(target: Target) -> Self {
        Self {
            target,
            diag: Diagnostic::new(),
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.target.name
    }

    /// Name of the owning schema.
    pub fn schema_name(&self) -> &str {
        &self.target.schema
    }

    /// Schema-qualified name.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Select rows matching `criteria` (all rows when `None`).
    pub fn select<'s>(
        &self,
        session: &'s mut Session,
        criteria: Option<&str>,
    ) -> Option<&'s mut QueryResult> {
        one_shot(&self.diag, session, OpKind::Select, &self.target, |s| {
            criteria.map_or(true, |c| ok(s.set_where(c)))
        })
    }

    /// Select with a limit, offset and ordering.
    pub fn select_limit<'s>(
        &self,
        session: &'s mut Session,
        criteria: Option<&str>,
        limit: u64,
        offset: u64,
        order_by: &[OrderBy],
    ) -> Option<&'s mut QueryResult> {
        one_shot(&self.diag, session, OpKind::Select, &self.target, |s| {
            criteria.map_or(true, |c| ok(s.set_where(c)))
                && ok(s.set_limit_and_offset(limit, offset))
                && (order_by.is_empty() || ok(s.set_order_by(order_by)))
        })
    }

    /// Insert one row given as (column, value) pairs.
    pub fn insert<'s>(
        &self,
        session: &'s mut Session,
        values: &[(&str, Value)],
    ) -> Option<&'s mut QueryResult> {
        one_shot(&self.diag, session, OpKind::Insert, &self.target, |s| {
            ok(s.set_insert_values(values))
        })
    }

    /// Update rows matching `criteria` (all rows when `None`).
    pub fn update<'s>(
        &self,
        session: &'s mut Session,
        criteria: Option<&str>,
        values: &[(&str, Param)],
    ) -> Option<&'s mut QueryResult> {
        one_shot(&self.diag, session, OpKind::Update, &self.target, |s| {
            criteria.map_or(true, |c| ok(s.set_where(c))) && ok(s.set_update_values(values))
        })
    }

    /// Delete rows matching `criteria` (all rows when `None`).
    pub fn delete<'s>(
        &self,
        session: &'s mut Session,
        criteria: Option<&str>,
    ) -> Option<&'s mut QueryResult> {
        one_shot(&self.diag, session, OpKind::Delete, &self.target, |s| {
            criteria.map_or(true, |c| ok(s.set_where(c)))
        })
    }
}

impl HasDiagnostic for Table {
    fn diagnostic(&self) -> &Diagnostic {
        &self.diag
    }
}

// =============================================================================
// Collection
// =============================================================================

/// A document collection in a schema.
#[derive(Debug, Clone)]
pub struct Collection {
    target: Target,
    diag: Diagnostic,
}

impl Collection {
    pub(crate) fn new(target: Target) -> Self {
        Self {
            target,
            diag: Diagnostic::new(),
        }
    }

    /// Collection name.
    pub fn name(&self) -> &str {
        &self.target.name
    }

    /// Name of the owning schema.
    pub fn schema_name(&self) -> &str {
        &self.target.schema
    }

    /// Schema-qualified name.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Find documents matching `criteria` (all documents when `None`).
    pub fn find<'s>(
        &self,
        session: &'s mut Session,
        criteria: Option<&str>,
    ) -> Option<&'s mut QueryResult> {
        one_shot(&self.diag, session, OpKind::Find, &self.target, |s| {
            ok(s.set_where(criteria.unwrap_or(MATCH_ALL)))
        })
    }

    /// Add JSON documents.
    pub fn add<'s>(&self, session: &'s mut Session, docs: &[&str]) -> Option<&'s mut QueryResult> {
        one_shot(&self.diag, session, OpKind::Add, &self.target, |s| {
            docs.iter().all(|doc| ok(s.add_document(doc)))
        })
    }

    /// Set members of documents matching `criteria`.
    pub fn modify_set<'s>(
        &self,
        session: &'s mut Session,
        criteria: Option<&str>,
        items: &[(&str, Param)],
    ) -> Option<&'s mut QueryResult> {
        one_shot(&self.diag, session, OpKind::Modify, &self.target, |s| {
            ok(s.set_where(criteria.unwrap_or(MATCH_ALL))) && ok(s.modify_set(items))
        })
    }

    /// Remove members from documents matching `criteria`.
    pub fn modify_unset<'s>(
        &self,
        session: &'s mut Session,
        criteria: Option<&str>,
        paths: &[&str],
    ) -> Option<&'s mut QueryResult> {
        one_shot(&self.diag, session, OpKind::Modify, &self.target, |s| {
            ok(s.set_where(criteria.unwrap_or(MATCH_ALL))) && ok(s.modify_unset(paths))
        })
    }

    /// Remove documents matching `criteria`.
    pub fn remove<'s>(
        &self,
        session: &'s mut Session,
        criteria: Option<&str>,
    ) -> Option<&'s mut QueryResult> {
        one_shot(&self.diag, session, OpKind::Remove, &self.target, |s| {
            ok(s.set_where(criteria.unwrap_or(MATCH_ALL)))
        })
    }

    /// Create index `name` from a JSON definition such as
    /// `{"fields": [{"field": "$.age", "type": "INT"}]}`.
    pub fn create_index(&self, session: &mut Session, name: &str, definition: &str) -> bool {
        let result = guarded(|| {
            let name = required_name(name, "index")?;
            let parsed: serde_json::Value = serde_json::from_str(definition)
                .map_err(|e| Error::invalid(format!("Invalid index definition: {}", e)))?;
            if !parsed.is_object() {
                return Err(Error::invalid("Index definition must be a JSON object"));
            }
            let op = Operation::CreateIndex {
                target: self.target.clone(),
                name,
                definition: definition.to_string(),
            };
            session.request(&op).map(|_| ())
        });
        self.diag.check(result)
    }

    /// Drop index `name`.
    pub fn drop_index(&self, session: &mut Session, name: &str) -> bool {
        let result = guarded(|| {
            let name = required_name(name, "index")?;
            let op = Operation::DropIndex {
                target: self.target.clone(),
                name,
            };
            session.request(&op).map(|_| ())
        });
        self.diag.check(result)
    }
}

impl HasDiagnostic for Collection {
    fn diagnostic(&self) -> &Diagnostic {
        &self.diag
    }
}
