use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Rows, Statement};

use super::params::Params;
use crate::cursor::RowSource;
use crate::error::SqlHandleError;
use crate::results::Recordset;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns `SqlHandleError::SqliteError` if the value cannot be read.
pub fn sqlite_extract_value_sync(row: &rusqlite::Row, idx: usize) -> Result<RowValues, SqlHandleError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

pub(crate) fn column_names(stmt: &Statement<'_>) -> Vec<String> {
    stmt.column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect()
}

fn extract_row(row: &rusqlite::Row, width: usize) -> Result<Vec<RowValues>, SqlHandleError> {
    (0..width).map(|i| sqlite_extract_value_sync(row, i)).collect()
}

/// Run `stmt` and materialize every row.
///
/// # Errors
/// Returns `SqlHandleError::SqliteError` if execution or value extraction fails.
pub fn build_result_set(stmt: &mut Statement<'_>, params: &Params) -> Result<Recordset, SqlHandleError> {
    let names = column_names(stmt);
    let width = names.len();
    let mut result_set = Recordset::with_capacity(Arc::new(names), 10);

    let mut rows_iter = stmt.query(params.as_params())?;
    while let Some(row) = rows_iter.next()? {
        result_set.add_row_values(extract_row(row, width)?);
    }
    Ok(result_set)
}

/// Live row iterator of a prepared statement, read one row per `fetch`.
pub(crate) struct SqliteRows<'stmt> {
    rows: Option<Rows<'stmt>>,
    width: usize,
}

impl<'stmt> SqliteRows<'stmt> {
    pub(crate) fn new(rows: Rows<'stmt>, width: usize) -> Self {
        Self {
            rows: Some(rows),
            width,
        }
    }
}

impl RowSource for SqliteRows<'_> {
    fn fetch(&mut self) -> Result<Option<Vec<RowValues>>, SqlHandleError> {
        let Some(rows) = self.rows.as_mut() else {
            return Ok(None);
        };
        match rows.next()? {
            Some(row) => extract_row(row, self.width).map(Some),
            None => Ok(None),
        }
    }

    fn release(&mut self) -> Result<(), SqlHandleError> {
        // dropping `Rows` resets the statement
        self.rows = None;
        Ok(())
    }
}
