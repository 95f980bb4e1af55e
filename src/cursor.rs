//! Forward-only streaming over the rows of one read statement.
//!
//! A [`Cursor`] is only ever lent to a closure (see
//! [`DbHandle::cursor`](crate::DbHandle::cursor)); the backend owns the prepared statement
//! and finalizes it once the closure returns, so a cursor can never outlive its statement.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::error::SqlHandleError;
use crate::results::Record;
use crate::results::build_column_index;
use crate::types::RowValues;

/// Backend side of a cursor: yields one row at a time in column order.
pub trait RowSource {
    /// Pull the next row, or `None` once the result is exhausted.
    ///
    /// # Errors
    /// Returns the backend error if stepping or value extraction fails.
    fn fetch(&mut self) -> Result<Option<Vec<RowValues>>, SqlHandleError>;

    /// Stop reading and drop any buffered result. Called at most once.
    ///
    /// # Errors
    /// Returns the backend error if the result cannot be released cleanly.
    fn release(&mut self) -> Result<(), SqlHandleError> {
        Ok(())
    }
}

#[derive(Debug)]
enum CursorState {
    /// Before the first `next()`.
    Open,
    Positioned(Record),
    Exhausted,
    Closed,
}

/// Forward-only cursor positioned on at most one row.
pub struct Cursor<'a> {
    source: &'a mut dyn RowSource,
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
    state: CursorState,
}

impl<'a> Cursor<'a> {
    /// Wrap a row source whose rows carry `column_names`, as reported by the statement.
    pub fn new(source: &'a mut dyn RowSource, column_names: Vec<String>) -> Self {
        let column_index = Arc::new(build_column_index(&column_names));
        Self {
            source,
            column_names: Arc::new(column_names),
            column_index,
            state: CursorState::Open,
        }
    }

    /// Advance to the next row.
    ///
    /// Returns `true` when positioned on a row and `false` once the result is exhausted;
    /// later calls keep returning `false`.
    ///
    /// # Errors
    /// Returns [`SqlHandleError::ExecutionError`] after [`close`](Self::close), or the
    /// backend error if fetching fails. A failed fetch leaves the cursor exhausted.
    pub fn next(&mut self) -> Result<bool, SqlHandleError> {
        match self.state {
            CursorState::Closed => {
                return Err(SqlHandleError::ExecutionError("cursor is closed".into()));
            }
            CursorState::Exhausted => return Ok(false),
            CursorState::Open | CursorState::Positioned(_) => {}
        }

        match self.source.fetch() {
            Ok(Some(values)) => {
                self.state = CursorState::Positioned(Record::with_index(
                    Arc::clone(&self.column_names),
                    Arc::clone(&self.column_index),
                    values,
                ));
                Ok(true)
            }
            Ok(None) => {
                self.state = CursorState::Exhausted;
                Ok(false)
            }
            Err(err) => {
                self.state = CursorState::Exhausted;
                Err(err)
            }
        }
    }

    /// Value of `column` in the current row. Names match as reported by the driver.
    ///
    /// # Errors
    /// Returns [`SqlHandleError::ExecutionError`] when the cursor is not positioned on a
    /// row or the column is not part of the result.
    pub fn get(&self, column: &str) -> Result<&RowValues, SqlHandleError> {
        let record = self.current()?;
        record
            .get(column)
            .ok_or_else(|| SqlHandleError::ExecutionError(format!("no such column: {column}")))
    }

    /// Snapshot of the current row.
    ///
    /// # Errors
    /// Returns [`SqlHandleError::ExecutionError`] when the cursor is not positioned on a row.
    pub fn get_row(&self) -> Result<Record, SqlHandleError> {
        self.current().cloned()
    }

    /// Column names of the result, available in every state.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// True once [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.state, CursorState::Closed)
    }

    /// Release the underlying result. Idempotent; release failures are logged, not
    /// returned.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.state = CursorState::Closed;
        if let Err(err) = self.source.release() {
            warn!(error = %err, "failed to release cursor result");
        }
    }

    fn current(&self) -> Result<&Record, SqlHandleError> {
        match &self.state {
            CursorState::Positioned(record) => Ok(record),
            CursorState::Open => Err(SqlHandleError::ExecutionError(
                "cursor is not positioned on a row (call next())".into(),
            )),
            CursorState::Exhausted => Err(SqlHandleError::ExecutionError(
                "cursor is past the last row".into(),
            )),
            CursorState::Closed => Err(SqlHandleError::ExecutionError("cursor is closed".into())),
        }
    }
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("column_names", &self.column_names)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Rows already in memory. Backends whose driver buffers the whole result use this.
#[derive(Debug, Default)]
pub struct BufferedRows {
    rows: std::vec::IntoIter<Vec<RowValues>>,
}

impl BufferedRows {
    #[must_use]
    pub fn new(rows: Vec<Vec<RowValues>>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl RowSource for BufferedRows {
    fn fetch(&mut self) -> Result<Option<Vec<RowValues>>, SqlHandleError> {
        Ok(self.rows.next())
    }

    fn release(&mut self) -> Result<(), SqlHandleError> {
        self.rows = Vec::new().into_iter();
        Ok(())
    }
}
