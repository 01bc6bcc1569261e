//! Results of executed statements.
//!
//! A [`QueryResult`] holds everything a reply carried: zero or more data sets
//! with their column metadata, the write summary (affected rows,
//! auto-increment value, generated document ids) and the warnings. Rows are
//! read with a forward-only cursor; [`QueryResult::next_result`] moves to the
//! next data set of a multi-set reply.

use xapi_core::{ColumnDescriptor, ColumnType};

use crate::diagnostic::{guarded, Diagnostic, HasDiagnostic, Status};
use crate::driver::{Reply, RowSet, Warning};
use crate::row::Row;
use crate::statement::StatementId;
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct DataSet {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
}

impl From<RowSet> for DataSet {
    fn from(set: RowSet) -> Self {
        Self {
            columns: set.columns,
            rows: set.rows.into_iter().map(Row::new).collect(),
        }
    }
}

/// Outcome of one execution.
#[derive(Debug, Clone)]
pub struct QueryResult {
    statement: Option<StatementId>,
    sets: Vec<DataSet>,
    current_set: usize,
    cursor: usize,
    affected_rows: u64,
    auto_increment: u64,
    warnings: Vec<Warning>,
    warning_cursor: usize,
    doc_ids: Vec<String>,
    doc_id_cursor: usize,
    diag: Diagnostic,
}

impl QueryResult {
    pub(crate) fn new(statement: Option<StatementId>, reply: Reply, doc_ids: Vec<String>) -> Self {
        Self {
            statement,
            sets: reply.sets.into_iter().map(DataSet::from).collect(),
            current_set: 0,
            cursor: 0,
            affected_rows: reply.affected_rows,
            auto_increment: reply.auto_increment,
            warnings: reply.warnings,
            warning_cursor: 0,
            doc_ids,
            doc_id_cursor: 0,
            diag: Diagnostic::new(),
        }
    }

    /// Statement that produced this result; `None` for catalog listings.
    ///
    /// Identity only: use it with `Session::free_result` to release the
    /// result early.
    pub fn statement_id(&self) -> Option<StatementId> {
        self.statement
    }

    /// True when the current position has a data set.
    pub fn has_data(&self) -> bool {
        self.current_set < self.sets.len()
    }

    fn data(&self) -> Result<&DataSet> {
        self.sets.get(self.current_set).ok_or(Error::NoDataSet)
    }

    fn column(&self, col: u32) -> Result<&ColumnDescriptor> {
        let set = self.data()?;
        set.columns
            .get(col as usize)
            .ok_or(Error::IndexOutOfRange {
                index: col,
                count: set.columns.len() as u32,
            })
    }

    // =========================================================================
    // Rows
    // =========================================================================

    /// Next row of the current data set, `None` when exhausted.
    ///
    /// Fetching from a result without a data set is an error; exhaustion is
    /// not, and leaves the diagnostic empty.
    pub fn fetch_one(&mut self) -> Option<&Row> {
        let result = guarded(|| {
            let set = self.data()?;
            Ok(self.cursor < set.rows.len())
        });
        if !self.diag.record(result)? {
            return None;
        }
        let index = self.cursor;
        self.cursor += 1;
        self.sets[self.current_set].rows.get(index)
    }

    /// Next document of a collection result as JSON text.
    pub fn fetch_json(&mut self) -> Option<String> {
        let result = guarded(|| {
            let set = self.data()?;
            match set.columns.first() {
                Some(c) if c.column_type == ColumnType::Json => {}
                _ => return Err(Error::invalid("Result does not contain documents")),
            }
            Ok(set.rows.get(self.cursor).map(|row| {
                row.values()
                    .first()
                    .map(|v| String::from_utf8_lossy(&v.raw_bytes()).into_owned())
                    .unwrap_or_default()
            }))
        });
        let doc = self.diag.record(result)??;
        self.cursor += 1;
        Some(doc)
    }

    /// Number of rows of the current data set not yet fetched.
    ///
    /// All rows are already buffered once the result exists; this reports
    /// how many remain.
    pub fn store_result(&self) -> Option<usize> {
        let result = guarded(|| {
            let set = self.data().map_err(|_| {
                Error::invalid("Attempt to store data for result without a data set")
            })?;
            Ok(set.rows.len().saturating_sub(self.cursor))
        });
        self.diag.record(result)
    }

    /// Advance to the next data set.
    ///
    /// Returns `Ok` when there is one and `Null` when the reply is exhausted.
    pub fn next_result(&mut self) -> Status {
        if self.current_set + 1 < self.sets.len() {
            self.current_set += 1;
            self.cursor = 0;
            self.diag.clear();
            Status::Ok
        } else {
            self.current_set = self.sets.len();
            self.diag.clear();
            Status::Null
        }
    }

    // =========================================================================
    // Column metadata
    // =========================================================================

    /// Number of columns of the current data set.
    pub fn column_count(&self) -> Option<u32> {
        let result = guarded(|| Ok(self.data()?.columns.len() as u32));
        self.diag.record(result)
    }

    /// Full descriptor of column `col`.
    pub fn column_descriptor(&self, col: u32) -> Option<&ColumnDescriptor> {
        let result = guarded(|| self.column(col).map(|_| ()));
        self.diag.record(result)?;
        self.column(col).ok()
    }

    /// Column label (alias if one was given).
    pub fn column_name(&self, col: u32) -> Option<&str> {
        self.column_descriptor(col).map(|c| c.label.as_str())
    }

    /// Original column name.
    pub fn column_original_name(&self, col: u32) -> Option<&str> {
        self.column_descriptor(col).map(|c| c.name.as_str())
    }

    /// Table label (alias if one was given).
    pub fn column_table(&self, col: u32) -> Option<&str> {
        self.column_descriptor(col).map(|c| c.table_label.as_str())
    }

    /// Original table name.
    pub fn column_original_table(&self, col: u32) -> Option<&str> {
        self.column_descriptor(col).map(|c| c.table_name.as_str())
    }

    /// Schema of the column's table.
    pub fn column_schema(&self, col: u32) -> Option<&str> {
        self.column_descriptor(col).map(|c| c.schema.as_str())
    }

    /// Catalog name. The protocol does not report catalogs, so this is
    /// always `None`; an invalid index still records an error.
    pub fn column_catalog(&self, col: u32) -> Option<&str> {
        self.column_descriptor(col)?;
        None
    }

    /// Type code of the column, [`ColumnType::Undefined`] on error.
    pub fn column_type(&self, col: u32) -> ColumnType {
        self.column_descriptor(col)
            .map_or(ColumnType::Undefined, |c| c.column_type)
    }

    /// Collation number, `0` on error.
    pub fn column_collation(&self, col: u32) -> u16 {
        self.column_descriptor(col).map_or(0, |c| c.collation)
    }

    /// Maximum length, `0` on error.
    pub fn column_length(&self, col: u32) -> u32 {
        self.column_descriptor(col).map_or(0, |c| c.length)
    }

    /// Decimal precision, `0` on error.
    pub fn column_precision(&self, col: u32) -> u16 {
        self.column_descriptor(col).map_or(0, |c| c.decimals)
    }

    // =========================================================================
    // Write summary
    // =========================================================================

    /// Rows (or documents) affected by the operation.
    pub fn affected_count(&self) -> u64 {
        self.affected_rows
    }

    /// Auto-increment value generated by an insert, `0` if none.
    pub fn auto_increment_value(&self) -> u64 {
        self.auto_increment
    }

    /// Next generated document id, `None` when all were read.
    pub fn fetch_doc_id(&mut self) -> Option<&str> {
        let id = self.doc_ids.get(self.doc_id_cursor)?;
        self.doc_id_cursor += 1;
        Some(id.as_str())
    }

    /// All generated document ids in insertion order.
    pub fn doc_ids(&self) -> &[String] {
        &self.doc_ids
    }

    // =========================================================================
    // Warnings
    // =========================================================================

    /// Number of warnings.
    pub fn warning_count(&self) -> u32 {
        self.warnings.len() as u32
    }

    /// Next warning, `None` when all were read.
    pub fn next_warning(&mut self) -> Option<&Warning> {
        let warning = self.warnings.get(self.warning_cursor)?;
        self.warning_cursor += 1;
        Some(warning)
    }
}

impl HasDiagnostic for QueryResult {
    fn diagnostic(&self) -> &Diagnostic {
        &self.diag
    }
}
