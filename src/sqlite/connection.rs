use std::fmt;
use std::sync::{Arc, Mutex};

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::hooks::Action;
use tracing::warn;

use super::params::Params;
use super::query::{SqliteRows, build_result_set, column_names};
use crate::cursor::Cursor;
use crate::driver::{DriverConnection, WriteOutcome};
use crate::error::SqlHandleError;
use crate::results::Recordset;
use crate::translation::{
    PlaceholderStyle, StatementKind, has_returning_clause, statement_kind, translate_placeholders,
};
use crate::types::RowValues;

pub(crate) enum Inner {
    Owned(rusqlite::Connection),
    Pooled(PooledConnection<SqliteConnectionManager>),
}

/// A `SQLite` connection opened directly or checked out of a pool.
pub struct SqliteConnection {
    pub(crate) inner: Inner,
    translate_placeholders: bool,
}

impl SqliteConnection {
    pub(crate) fn owned(conn: rusqlite::Connection, translate_placeholders: bool) -> Self {
        Self {
            inner: Inner::Owned(conn),
            translate_placeholders,
        }
    }

    pub(crate) fn pooled(
        conn: PooledConnection<SqliteConnectionManager>,
        translate_placeholders: bool,
    ) -> Self {
        Self {
            inner: Inner::Pooled(conn),
            translate_placeholders,
        }
    }

    /// Borrow the underlying rusqlite connection.
    #[must_use]
    pub fn raw(&self) -> &rusqlite::Connection {
        match &self.inner {
            Inner::Owned(conn) => conn,
            Inner::Pooled(conn) => conn,
        }
    }

    fn prepare(&self, sql: &str) -> Result<rusqlite::Statement<'_>, SqlHandleError> {
        let sql = if self.translate_placeholders {
            translate_placeholders(sql, PlaceholderStyle::Sqlite)
        } else {
            sql.into()
        };
        Ok(self.raw().prepare(&sql)?)
    }

    fn run_write(&self, sql: &str, params: &Params) -> Result<usize, SqlHandleError> {
        let mut stmt = self.prepare(sql)?;
        if has_returning_clause(sql) {
            // rusqlite refuses `execute` on statements that yield rows
            let mut rows = stmt.query(params.as_params())?;
            let mut count = 0;
            while rows.next()?.is_some() {
                count += 1;
            }
            Ok(count)
        } else {
            Ok(stmt.execute(params.as_params())?)
        }
    }
}

/// Records the rowids a statement actually inserted.
///
/// `last_insert_rowid` is left untouched by inserts into `WITHOUT ROWID` tables
/// and by the `DO UPDATE` branch of an upsert, so it is only trusted when the
/// update hook saw a row inserted under that rowid.
struct RowidTracker {
    inserted: Arc<Mutex<Vec<i64>>>,
}

impl RowidTracker {
    fn install(conn: &rusqlite::Connection) -> Self {
        let inserted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&inserted);
        conn.update_hook(Some(move |action: Action, _db: &str, _table: &str, rowid: i64| {
            if action == Action::SQLITE_INSERT {
                if let Ok(mut rows) = sink.lock() {
                    rows.push(rowid);
                }
            }
        }));
        Self { inserted }
    }

    fn finish(self, conn: &rusqlite::Connection) -> Option<i64> {
        conn.update_hook(None::<fn(Action, &str, &str, i64)>);
        let last = conn.last_insert_rowid();
        let rows = self.inserted.lock().ok()?;
        rows.contains(&last).then_some(last)
    }
}

impl DriverConnection for SqliteConnection {
    fn is_open(&self) -> bool {
        // a rusqlite connection stays open until it is dropped
        true
    }

    fn begin(&mut self) -> Result<(), SqlHandleError> {
        Ok(self.raw().execute_batch("BEGIN")?)
    }

    fn commit(&mut self) -> Result<(), SqlHandleError> {
        Ok(self.raw().execute_batch("COMMIT")?)
    }

    fn rollback(&mut self) -> Result<(), SqlHandleError> {
        Ok(self.raw().execute_batch("ROLLBACK")?)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), SqlHandleError> {
        Ok(self.raw().execute_batch(sql)?)
    }

    fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<WriteOutcome, SqlHandleError> {
        let converted = Params::convert(params);
        let tracker = (statement_kind(sql) == StatementKind::Insert)
            .then(|| RowidTracker::install(self.raw()));
        let result = self.run_write(sql, &converted);
        let generated_key = tracker.and_then(|tracker| tracker.finish(self.raw()));
        Ok(WriteOutcome {
            rows_affected: result?,
            generated_key,
        })
    }

    fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<Recordset, SqlHandleError> {
        let converted = Params::convert(params);
        let mut stmt = self.prepare(sql)?;
        build_result_set(&mut stmt, &converted)
    }

    fn with_cursor<R, F>(&mut self, sql: &str, params: &[RowValues], scope: F) -> Result<R, SqlHandleError>
    where
        F: FnOnce(&mut Cursor<'_>) -> Result<R, SqlHandleError>,
    {
        let converted = Params::convert(params);
        let mut stmt = self.prepare(sql)?;
        let names = column_names(&stmt);
        let result = {
            let width = names.len();
            let mut source = SqliteRows::new(stmt.query(converted.as_params())?, width);
            let mut cursor = Cursor::new(&mut source, names);
            let result = scope(&mut cursor);
            cursor.close();
            result
        };
        if let Err(err) = stmt.finalize() {
            warn!(error = %err, "failed to finalize cursor statement");
        }
        result
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<String>, SqlHandleError> {
        let mut stmt = self.raw().prepare("SELECT name FROM pragma_table_info(?1)")?;
        let names = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.inner {
            Inner::Owned(_) => "owned",
            Inner::Pooled(_) => "pooled",
        };
        f.debug_struct("SqliteConnection")
            .field("kind", &kind)
            .field("translate_placeholders", &self.translate_placeholders)
            .finish()
    }
}
