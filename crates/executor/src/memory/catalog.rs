//! Catalog state and statement semantics of the in-memory driver.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value as JsonValue};
use xapi_core::{ColumnDescriptor, ColumnType, DocPath, Document, Value, ID_FIELD};

use super::codes;
use super::expr::{compare, like, split_alias, Bindings, Expr, Scope};
use crate::driver::{Reply, RowSet};
use crate::operation::{Assignment, Criteria, ModifyOp, Operation, Param, SortDirection, Target};

type Result<T> = xapi_core::Result<T>;

fn server(code: u32, message: impl Into<String>) -> xapi_core::Error {
    xapi_core::Error::server(code, message)
}

/// Column type reported for a computed value.
pub(crate) fn column_type_of(value: &Value) -> ColumnType {
    match value {
        Value::Null => ColumnType::Undefined,
        Value::Bool(_) => ColumnType::Bool,
        Value::Sint(_) => ColumnType::Sint,
        Value::Uint(_) => ColumnType::Uint,
        Value::Float(_) => ColumnType::Float,
        Value::Double(_) => ColumnType::Double,
        Value::String(_) => ColumnType::String,
        Value::Bytes(_) => ColumnType::Bytes,
    }
}

fn names_set(names: impl IntoIterator<Item = String>) -> RowSet {
    RowSet {
        columns: vec![ColumnDescriptor::new("name", ColumnType::String)],
        rows: names.into_iter().map(|n| vec![Value::String(n)]).collect(),
    }
}

// =============================================================================
// Data
// =============================================================================

#[derive(Debug, Clone, Default)]
pub(crate) struct Catalog {
    schemas: BTreeMap<String, SchemaData>,
}

#[derive(Debug, Clone, Default)]
struct SchemaData {
    tables: BTreeMap<String, TableData>,
    collections: BTreeMap<String, CollectionData>,
}

#[derive(Debug, Clone)]
pub(crate) struct TableData {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Vec<Value>>,
    auto_increment: Option<usize>,
    next_auto: u64,
    view: bool,
}

impl TableData {
    pub(crate) fn new(columns: Vec<ColumnDescriptor>, auto_increment: Option<usize>, view: bool) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            auto_increment,
            next_auto: 1,
            view,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct CollectionData {
    docs: Vec<Document>,
    indexes: BTreeMap<String, String>,
}

// =============================================================================
// Scopes
// =============================================================================

struct RowScope<'a> {
    columns: &'a [ColumnDescriptor],
    values: &'a [Value],
}

fn column_index(columns: &[ColumnDescriptor], name: &str) -> Option<usize> {
    columns
        .iter()
        .position(|c| c.name.eq_ignore_ascii_case(name) || c.label.eq_ignore_ascii_case(name))
}

fn unknown_column(name: &str) -> xapi_core::Error {
    server(codes::BAD_FIELD, format!("Unknown column '{}'", name))
}

impl Scope for RowScope<'_> {
    fn field(&self, name: &str) -> Result<JsonValue> {
        let idx = column_index(self.columns, name).ok_or_else(|| unknown_column(name))?;
        Ok(self.values.get(idx).cloned().map_or(JsonValue::Null, JsonValue::from))
    }
}

/// Where a selected column comes from.
enum Source {
    Column(usize),
    Computed(Expr),
}

struct DocScope<'a>(&'a Document);

impl Scope for DocScope<'_> {
    fn field(&self, name: &str) -> Result<JsonValue> {
        let path: DocPath = name
            .parse()
            .map_err(|e: xapi_core::Error| server(codes::PARSE_ERROR, e.to_string()))?;
        Ok(self.0.get(&path).cloned().unwrap_or(JsonValue::Null))
    }
}

/// Scope with no fields, for raw queries.
pub(crate) struct NoFields;

impl Scope for NoFields {
    fn field(&self, name: &str) -> Result<JsonValue> {
        Err(unknown_column(name))
    }
}

/// Indexes of the records selected by `criteria`, in output order.
fn pick(scopes: &[&dyn Scope], criteria: &Criteria) -> Result<Vec<usize>> {
    if !criteria.group_by.is_empty() || criteria.having.is_some() {
        return Err(server(
            codes::NOT_SUPPORTED,
            "GROUP BY and HAVING are not supported by the in-memory driver",
        ));
    }
    let binds = Bindings {
        named: Some(&criteria.params),
        positional: &[],
    };
    let filter = criteria.filter.as_deref().map(Expr::parse).transpose()?;
    let mut picked = Vec::new();
    for (i, scope) in scopes.iter().enumerate() {
        let keep = match &filter {
            Some(f) => f.matches(*scope, &binds)?,
            None => true,
        };
        if keep {
            picked.push(i);
        }
    }

    if !criteria.order_by.is_empty() {
        let keys = criteria
            .order_by
            .iter()
            .map(|o| Ok((Expr::parse(&o.expr)?, o.direction)))
            .collect::<Result<Vec<_>>>()?;
        let mut keyed = picked
            .into_iter()
            .map(|i| {
                let values = keys
                    .iter()
                    .map(|(expr, _)| expr.eval(scopes[i], &binds))
                    .collect::<Result<Vec<_>>>()?;
                Ok((i, values))
            })
            .collect::<Result<Vec<_>>>()?;
        keyed.sort_by(|(_, a), (_, b)| {
            for ((l, r), (_, dir)) in a.iter().zip(b).zip(&keys) {
                let ord = match (l.is_null(), r.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    _ => compare(l, r).unwrap_or(Ordering::Equal),
                };
                let ord = if *dir == SortDirection::Desc { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        picked = keyed.into_iter().map(|(i, _)| i).collect();
    }

    let offset = usize::try_from(criteria.offset).unwrap_or(usize::MAX);
    let limit = criteria
        .limit
        .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
    Ok(picked.into_iter().skip(offset).take(limit).collect())
}

fn table_scopes(table: &TableData) -> Vec<RowScope<'_>> {
    table
        .rows
        .iter()
        .map(|values| RowScope {
            columns: &table.columns,
            values,
        })
        .collect()
}

fn doc_scopes(docs: &[Document]) -> Vec<DocScope<'_>> {
    docs.iter().map(DocScope).collect()
}

fn as_dyn<S: Scope>(scopes: &[S]) -> Vec<&dyn Scope> {
    scopes.iter().map(|s| s as &dyn Scope).collect()
}

fn param_value(param: &Param, scope: &dyn Scope, criteria: &Criteria) -> Result<Value> {
    match param {
        Param::Value(v) => Ok(v.clone()),
        Param::Expr(text) => {
            let binds = Bindings {
                named: Some(&criteria.params),
                positional: &[],
            };
            Ok(Value::from(&Expr::parse(text)?.eval(scope, &binds)?))
        }
    }
}

fn param_json(param: &Param, scope: &dyn Scope, criteria: &Criteria) -> Result<JsonValue> {
    match param {
        // Text values that parse as JSON arrays or objects are stored as such.
        Param::Value(Value::String(s)) if s.starts_with('{') || s.starts_with('[') => {
            Ok(serde_json::from_str(s).unwrap_or_else(|_| JsonValue::String(s.clone())))
        }
        Param::Value(v) => Ok(JsonValue::from(v.clone())),
        Param::Expr(_) => Ok(JsonValue::from(param_value(param, scope, criteria)?)),
    }
}

// =============================================================================
// Catalog operations
// =============================================================================

impl Catalog {
    fn schema(&self, name: &str) -> Result<&SchemaData> {
        self.schemas
            .get(name)
            .ok_or_else(|| server(codes::BAD_DB, format!("Unknown database '{}'", name)))
    }

    fn schema_mut(&mut self, name: &str) -> Result<&mut SchemaData> {
        self.schemas
            .get_mut(name)
            .ok_or_else(|| server(codes::BAD_DB, format!("Unknown database '{}'", name)))
    }

    pub(crate) fn has_schema(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub(crate) fn create_schema(&mut self, name: &str) -> Result<()> {
        if self.schemas.contains_key(name) {
            return Err(server(
                codes::DB_CREATE_EXISTS,
                format!("Can't create database '{}'; database exists", name),
            ));
        }
        self.schemas.insert(name.to_string(), SchemaData::default());
        Ok(())
    }

    fn drop_schema(&mut self, name: &str) -> Result<()> {
        self.schemas.remove(name).map(|_| ()).ok_or_else(|| {
            server(
                codes::DB_DROP_EXISTS,
                format!("Can't drop database '{}'; database doesn't exist", name),
            )
        })
    }

    fn no_such_table(target: &Target) -> xapi_core::Error {
        server(
            codes::NO_SUCH_TABLE,
            format!("Table '{}.{}' doesn't exist", target.schema, target.name),
        )
    }

    pub(crate) fn table(&self, target: &Target) -> Result<&TableData> {
        self.schema(&target.schema)?
            .tables
            .get(&target.name)
            .ok_or_else(|| Self::no_such_table(target))
    }

    fn table_mut(&mut self, target: &Target) -> Result<&mut TableData> {
        self.schema_mut(&target.schema)?
            .tables
            .get_mut(&target.name)
            .ok_or_else(|| Self::no_such_table(target))
    }

    fn collection(&self, target: &Target) -> Result<&CollectionData> {
        self.schema(&target.schema)?
            .collections
            .get(&target.name)
            .ok_or_else(|| Self::no_such_table(target))
    }

    fn collection_mut(&mut self, target: &Target) -> Result<&mut CollectionData> {
        self.schema_mut(&target.schema)?
            .collections
            .get_mut(&target.name)
            .ok_or_else(|| Self::no_such_table(target))
    }

    fn ensure_free(&self, target: &Target) -> Result<()> {
        let schema = self.schema(&target.schema)?;
        if schema.tables.contains_key(&target.name) || schema.collections.contains_key(&target.name) {
            return Err(server(
                codes::TABLE_EXISTS,
                format!("Table '{}' already exists", target.name),
            ));
        }
        Ok(())
    }

    pub(crate) fn create_table(&mut self, target: &Target, table: TableData) -> Result<()> {
        self.ensure_free(target)?;
        self.schema_mut(&target.schema)?
            .tables
            .insert(target.name.clone(), table);
        Ok(())
    }

    pub(crate) fn documents(&self, target: &Target) -> Result<Vec<Document>> {
        Ok(self.collection(target)?.docs.clone())
    }

    pub(crate) fn rows(&self, target: &Target) -> Result<Vec<Vec<Value>>> {
        Ok(self.table(target)?.rows.clone())
    }

    /// Execute a catalog or CRUD operation.
    pub(crate) fn apply(&mut self, op: &Operation) -> Result<Reply> {
        match op {
            Operation::CreateSchema { name } => self.create_schema(name).map(|()| Reply::default()),
            Operation::DropSchema { name } => self.drop_schema(name).map(|()| Reply::default()),
            Operation::CreateCollection { target } => {
                self.ensure_free(target)?;
                self.schema_mut(&target.schema)?
                    .collections
                    .insert(target.name.clone(), CollectionData::default());
                Ok(Reply::default())
            }
            Operation::DropCollection { target } => {
                self.schema_mut(&target.schema)?
                    .collections
                    .remove(&target.name)
                    .ok_or_else(|| {
                        server(
                            codes::BAD_TABLE,
                            format!("Unknown table '{}.{}'", target.schema, target.name),
                        )
                    })?;
                Ok(Reply::default())
            }
            Operation::CreateIndex {
                target,
                name,
                definition,
            } => {
                let coll = self.collection_mut(target)?;
                if coll.indexes.contains_key(name) {
                    return Err(server(
                        codes::DUP_KEYNAME,
                        format!("Duplicate key name '{}'", name),
                    ));
                }
                coll.indexes.insert(name.clone(), definition.clone());
                Ok(Reply::default())
            }
            Operation::DropIndex { target, name } => {
                self.collection_mut(target)?
                    .indexes
                    .remove(name)
                    .ok_or_else(|| {
                        server(
                            codes::CANT_DROP_KEY,
                            format!("Can't DROP '{}'; check that column/key exists", name),
                        )
                    })?;
                Ok(Reply::default())
            }

            Operation::ListSchemas { pattern } => Ok(Reply::with_set(names_set(
                self.schemas.keys().filter(|n| like(n, pattern)).cloned(),
            ))),
            Operation::ListTables {
                schema,
                pattern,
                include_views,
            } => {
                let tables = &self.schema(schema)?.tables;
                let mut set = RowSet {
                    columns: vec![
                        ColumnDescriptor::new("name", ColumnType::String),
                        ColumnDescriptor::new("type", ColumnType::String),
                    ],
                    rows: Vec::new(),
                };
                for (name, table) in tables {
                    if (*include_views || !table.view) && like(name, pattern) {
                        let kind = if table.view { "VIEW" } else { "TABLE" };
                        set.rows.push(vec![Value::from(name.as_str()), Value::from(kind)]);
                    }
                }
                Ok(Reply::with_set(set))
            }
            Operation::ListCollections { schema, pattern } => Ok(Reply::with_set(names_set(
                self.schema(schema)?
                    .collections
                    .keys()
                    .filter(|n| like(n, pattern))
                    .cloned(),
            ))),

            Operation::Select {
                target,
                criteria,
                projection,
            } => self.select(target, criteria, projection),
            Operation::Insert {
                target,
                columns,
                rows,
            } => insert(self.table_mut(target)?, target, columns, rows),
            Operation::Update {
                target,
                criteria,
                assignments,
            } => update(self.table_mut(target)?, criteria, assignments),
            Operation::Delete { target, criteria } => {
                let table = self.table_mut(target)?;
                let mut picked = pick(&as_dyn(&table_scopes(table)), criteria)?;
                picked.sort_unstable_by(|a, b| b.cmp(a));
                for i in &picked {
                    table.rows.remove(*i);
                }
                Ok(Reply::affected(picked.len() as u64))
            }

            Operation::Add { target, documents } => add(self.collection_mut(target)?, documents),
            Operation::Find {
                target,
                criteria,
                projection,
            } => self.find(target, criteria, projection),
            Operation::Modify {
                target,
                criteria,
                operations,
            } => modify(self.collection_mut(target)?, criteria, operations),
            Operation::Remove { target, criteria } => {
                let coll = self.collection_mut(target)?;
                let mut picked = pick(&as_dyn(&doc_scopes(&coll.docs)), criteria)?;
                picked.sort_unstable_by(|a, b| b.cmp(a));
                for i in &picked {
                    coll.docs.remove(*i);
                }
                Ok(Reply::affected(picked.len() as u64))
            }

            Operation::Sql { .. }
            | Operation::TxnBegin
            | Operation::TxnCommit
            | Operation::TxnRollback => Err(xapi_core::Error::Protocol(format!(
                "{} is not a catalog operation",
                op.name()
            ))),
        }
    }

    fn select(&self, target: &Target, criteria: &Criteria, projection: &[String]) -> Result<Reply> {
        let table = self.table(target)?;
        let scopes = table_scopes(table);
        let picked = pick(&as_dyn(&scopes), criteria)?;

        let items: Vec<String> = if projection.is_empty() {
            vec!["*".to_string()]
        } else {
            projection.to_vec()
        };

        let mut outputs: Vec<(ColumnDescriptor, Source)> = Vec::new();
        for item in &items {
            let (expr_text, alias) = split_alias(item);
            if expr_text == "*" {
                for (i, col) in table.columns.iter().enumerate() {
                    outputs.push((col.clone(), Source::Column(i)));
                }
                continue;
            }
            match column_index(&table.columns, expr_text.trim_matches('`')) {
                Some(i) => {
                    let mut col = table.columns[i].clone();
                    if let Some(alias) = alias {
                        col.label = alias.to_string();
                    }
                    outputs.push((col, Source::Column(i)));
                }
                None => {
                    let col = ColumnDescriptor::new(alias.unwrap_or(expr_text), ColumnType::Undefined);
                    outputs.push((col, Source::Computed(Expr::parse(expr_text)?)));
                }
            }
        }

        let binds = Bindings {
            named: Some(&criteria.params),
            positional: &[],
        };
        let mut rows = Vec::with_capacity(picked.len());
        for i in picked {
            let mut row = Vec::with_capacity(outputs.len());
            for (_, source) in &outputs {
                row.push(match source {
                    Source::Column(col) => table.rows[i][*col].clone(),
                    Source::Computed(expr) => Value::from(&expr.eval(&scopes[i], &binds)?),
                });
            }
            rows.push(row);
        }

        let columns = outputs
            .into_iter()
            .enumerate()
            .map(|(i, (mut col, source))| {
                if let Source::Computed(_) = source {
                    col.column_type = rows
                        .iter()
                        .map(|r| column_type_of(&r[i]))
                        .find(|t| *t != ColumnType::Undefined)
                        .unwrap_or(ColumnType::Undefined);
                }
                col
            })
            .collect();
        Ok(Reply::with_set(RowSet { columns, rows }))
    }

    fn find(&self, target: &Target, criteria: &Criteria, projection: &[String]) -> Result<Reply> {
        let coll = self.collection(target)?;
        let scopes = doc_scopes(&coll.docs);
        let picked = pick(&as_dyn(&scopes), criteria)?;

        let fields = projection
            .iter()
            .map(|item| {
                let (path_text, alias) = split_alias(item);
                let path: DocPath = path_text
                    .parse()
                    .map_err(|e: xapi_core::Error| server(codes::PARSE_ERROR, e.to_string()))?;
                let key = alias.map(str::to_string).unwrap_or_else(|| {
                    path.to_string().trim_start_matches("$.").to_string()
                });
                Ok((path, key))
            })
            .collect::<Result<Vec<_>>>()?;

        let rows = picked
            .into_iter()
            .map(|i| {
                let doc = &coll.docs[i];
                let text = if fields.is_empty() {
                    doc.to_json_string()
                } else {
                    let mut out = Map::new();
                    for (path, key) in &fields {
                        out.insert(key.clone(), doc.get(path).cloned().unwrap_or(JsonValue::Null));
                    }
                    JsonValue::Object(out).to_string()
                };
                vec![Value::String(text)]
            })
            .collect();

        let column = ColumnDescriptor::new("doc", ColumnType::Json).with_table(&target.schema, &target.name);
        Ok(Reply::with_set(RowSet {
            columns: vec![column],
            rows,
        }))
    }
}

// =============================================================================
// Writes
// =============================================================================

pub(crate) fn insert(
    table: &mut TableData,
    target: &Target,
    columns: &[String],
    rows: &[Vec<Value>],
) -> Result<Reply> {
    if table.view {
        return Err(server(
            codes::NON_INSERTABLE,
            format!("The target table {} of the INSERT is not insertable-into", target.name),
        ));
    }
    let positions = if columns.is_empty() {
        (0..table.columns.len()).collect::<Vec<_>>()
    } else {
        columns
            .iter()
            .map(|c| column_index(&table.columns, c).ok_or_else(|| unknown_column(c)))
            .collect::<Result<Vec<_>>>()?
    };

    let mut next_auto = table.next_auto;
    let mut first_generated = None;
    let mut built = Vec::with_capacity(rows.len());
    for (n, row) in rows.iter().enumerate() {
        if row.len() != positions.len() {
            return Err(server(
                codes::WRONG_VALUE_COUNT,
                format!("Column count doesn't match value count at row {}", n + 1),
            ));
        }
        let mut full = vec![Value::Null; table.columns.len()];
        for (pos, value) in positions.iter().zip(row) {
            full[*pos] = value.clone();
        }
        if let Some(ai) = table.auto_increment {
            if full[ai].is_null() {
                full[ai] = Value::Uint(next_auto);
                first_generated.get_or_insert(next_auto);
                next_auto += 1;
            } else if let Ok(explicit) = full[ai].get_uint() {
                next_auto = next_auto.max(explicit.saturating_add(1));
            }
        }
        built.push(full);
    }

    table.next_auto = next_auto;
    table.rows.extend(built);
    Ok(Reply {
        affected_rows: rows.len() as u64,
        auto_increment: first_generated.unwrap_or(0),
        ..Reply::default()
    })
}

fn update(table: &mut TableData, criteria: &Criteria, assignments: &[Assignment]) -> Result<Reply> {
    let targets = assignments
        .iter()
        .map(|a| column_index(&table.columns, &a.column).ok_or_else(|| unknown_column(&a.column)))
        .collect::<Result<Vec<_>>>()?;

    let changes = {
        let scopes = table_scopes(table);
        let picked = pick(&as_dyn(&scopes), criteria)?;
        let mut changes = Vec::with_capacity(picked.len());
        for i in picked {
            let mut row = table.rows[i].clone();
            for (col, a) in targets.iter().zip(assignments) {
                row[*col] = param_value(&a.value, &scopes[i], criteria)?;
            }
            changes.push((i, row));
        }
        changes
    };

    let mut changed = 0;
    for (i, row) in changes {
        if table.rows[i] != row {
            table.rows[i] = row;
            changed += 1;
        }
    }
    Ok(Reply::affected(changed))
}

fn add(coll: &mut CollectionData, documents: &[Document]) -> Result<Reply> {
    let mut seen: HashSet<String> = coll.docs.iter().filter_map(Document::id).collect();
    let mut added = Vec::with_capacity(documents.len());
    for doc in documents {
        let mut doc = doc.clone();
        let id = doc.ensure_id();
        if !seen.insert(id.clone()) {
            return Err(server(
                codes::DUP_ENTRY,
                format!("Duplicate entry '{}' for key 'PRIMARY'", id),
            ));
        }
        added.push(doc);
    }
    let count = added.len() as u64;
    coll.docs.extend(added);
    Ok(Reply::affected(count))
}

fn touches_id(path: &DocPath) -> bool {
    matches!(path.segments().first(), Some(xapi_core::PathSegment::Key(k)) if k == ID_FIELD)
}

fn modify(coll: &mut CollectionData, criteria: &Criteria, operations: &[ModifyOp]) -> Result<Reply> {
    if let Some(op) = operations.iter().find(|op| touches_id(op.path())) {
        return Err(server(
            codes::FORBIDDEN_ID_UPDATE,
            format!("Forbidden update operation on '{}' member", op.path()),
        ));
    }
    let bad_path = |e: xapi_core::Error| server(codes::BAD_DOC_PATH, e.to_string());

    let changes = {
        let scopes = doc_scopes(&coll.docs);
        let picked = pick(&as_dyn(&scopes), criteria)?;
        let mut changes = Vec::with_capacity(picked.len());
        for i in picked {
            let mut doc = coll.docs[i].clone();
            for op in operations {
                match op {
                    ModifyOp::Set { path, value } => {
                        doc.set(path, param_json(value, &scopes[i], criteria)?)
                            .map_err(bad_path)?;
                    }
                    ModifyOp::Unset { path } => {
                        doc.remove(path);
                    }
                    ModifyOp::ArrayInsert { path, value } => {
                        doc.array_insert(path, param_json(value, &scopes[i], criteria)?)
                            .map_err(bad_path)?;
                    }
                    ModifyOp::ArrayAppend { path, value } => {
                        doc.array_append(path, param_json(value, &scopes[i], criteria)?)
                            .map_err(bad_path)?;
                    }
                    ModifyOp::ArrayDelete { path } => {
                        doc.array_delete(path).map_err(bad_path)?;
                    }
                }
            }
            changes.push((i, doc));
        }
        changes
    };

    let mut changed = 0;
    for (i, doc) in changes {
        if coll.docs[i] != doc {
            coll.docs[i] = doc;
            changed += 1;
        }
    }
    Ok(Reply::affected(changed))
}
