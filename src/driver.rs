//! The seam a backend connection implements so [`DbHandle`](crate::DbHandle) can drive it.

use crate::cursor::Cursor;
use crate::error::SqlHandleError;
use crate::results::Recordset;
use crate::types::RowValues;

/// Result of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Rows inserted, updated or deleted.
    pub rows_affected: usize,
    /// First key generated by the statement, if any.
    pub generated_key: Option<i64>,
}

/// One live backend connection.
///
/// Implementations must release every statement and row iterator they open before a
/// method returns, on success and on failure. Parameters are bound positionally, one
/// `RowValues` per placeholder, in order.
pub trait DriverConnection {
    /// Whether the underlying resource still reports itself open. Must not fail.
    fn is_open(&self) -> bool;

    /// Leave autocommit mode.
    ///
    /// # Errors
    /// Returns the backend error if the transaction cannot be started.
    fn begin(&mut self) -> Result<(), SqlHandleError>;

    /// Commit and return to autocommit mode.
    ///
    /// # Errors
    /// Returns the backend error, including when no transaction is active.
    fn commit(&mut self) -> Result<(), SqlHandleError>;

    /// Roll back and return to autocommit mode.
    ///
    /// # Errors
    /// Returns the backend error, including when no transaction is active.
    fn rollback(&mut self) -> Result<(), SqlHandleError>;

    /// Run one or more parameterless statements separated by `;`.
    ///
    /// # Errors
    /// Returns the backend error for the first failing statement.
    fn execute_batch(&mut self, sql: &str) -> Result<(), SqlHandleError>;

    /// Run a write statement and report affected rows and the generated key.
    ///
    /// # Errors
    /// Returns the backend error if preparation, binding or execution fails.
    fn execute(&mut self, sql: &str, params: &[RowValues])
    -> Result<WriteOutcome, SqlHandleError>;

    /// Run a read statement and materialize every row.
    ///
    /// # Errors
    /// Returns the backend error if preparation, execution or row extraction fails.
    fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<Recordset, SqlHandleError>;

    /// Run a read statement and hand `scope` a cursor streaming its rows.
    ///
    /// The cursor and its statement are released when `scope` returns, whatever it
    /// returns.
    ///
    /// # Errors
    /// Returns the backend error if preparation or execution fails, otherwise whatever
    /// `scope` returns.
    fn with_cursor<R, F>(
        &mut self,
        sql: &str,
        params: &[RowValues],
        scope: F,
    ) -> Result<R, SqlHandleError>
    where
        F: FnOnce(&mut Cursor<'_>) -> Result<R, SqlHandleError>;

    /// One metadata probe: the column names of `table` exactly as stored, in table
    /// order. An unknown table yields an empty list.
    ///
    /// # Errors
    /// Returns the backend error if the metadata lookup itself fails.
    fn table_columns(&mut self, table: &str) -> Result<Vec<String>, SqlHandleError>;
}
