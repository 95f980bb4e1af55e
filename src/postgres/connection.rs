use std::borrow::Cow;

use tokio::runtime::Runtime;
use tokio_postgres::{Client, NoTls};
use tracing::warn;

use super::params::Params;
use super::query::{PgRows, build_result_set_from_statement, column_names, generated_key};
use crate::cursor::Cursor;
use crate::driver::{DriverConnection, WriteOutcome};
use crate::error::SqlHandleError;
use crate::results::Recordset;
use crate::translation::{
    PlaceholderStyle, StatementKind, has_returning_clause, statement_kind, translate_placeholders,
};
use crate::types::RowValues;

const TABLE_COLUMNS_SQL: &str = "SELECT column_name::text FROM information_schema.columns \
     WHERE table_name::text = $1 AND table_schema = ANY(current_schemas(false)) \
     ORDER BY ordinal_position";

/// How a write statement is sent to the server.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum WritePlan<'a> {
    /// Plain execute; the server reports the affected count.
    Execute(Cow<'a, str>),
    /// Run as a query; every returned row counts as affected.
    Returning { sql: Cow<'a, str>, capture_key: bool },
}

/// Translate placeholders and decide how to run a write.
///
/// An `INSERT` always runs with a `RETURNING` clause so its key can be read back; other
/// statements only go through the query path when they already return rows.
pub(crate) fn plan_write(sql: &str) -> WritePlan<'_> {
    let translated = translate_placeholders(sql, PlaceholderStyle::Postgres);
    let kind = statement_kind(&translated);
    let returning = has_returning_clause(&translated);
    match (kind, returning) {
        (StatementKind::Insert, false) => WritePlan::Returning {
            sql: Cow::Owned(append_returning(&translated)),
            capture_key: true,
        },
        (StatementKind::Insert, true) => WritePlan::Returning {
            sql: translated,
            capture_key: true,
        },
        (_, true) => WritePlan::Returning {
            sql: translated,
            capture_key: false,
        },
        (_, false) => WritePlan::Execute(translated),
    }
}

fn append_returning(sql: &str) -> String {
    let body = sql.trim_end().trim_end_matches(';').trim_end();
    // newline so a trailing line comment cannot swallow the clause
    format!("{body}\nRETURNING *")
}

/// A Postgres client plus the current-thread runtime that drives its I/O.
///
/// The runtime only makes progress while one of this connection's methods is blocked
/// on it, so no background thread is involved.
pub struct PostgresConnection {
    runtime: Runtime,
    client: Client,
}

impl PostgresConnection {
    /// Connect and spawn the connection task on a private runtime.
    ///
    /// # Errors
    /// Returns `SqlHandleError::ConnectionError` if the runtime cannot be built, or the
    /// driver error if the server rejects the connection.
    pub fn connect(config: &tokio_postgres::Config) -> Result<Self, SqlHandleError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SqlHandleError::ConnectionError(format!("Failed to build runtime: {e}")))?;
        let (client, connection) = runtime.block_on(config.connect(NoTls))?;
        runtime.spawn(async move {
            if let Err(err) = connection.await {
                warn!(error = %err, "postgres connection terminated with error");
            }
        });
        Ok(Self { runtime, client })
    }

    /// Borrow the driver client, e.g. for `COPY` or other calls this layer does not wrap.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Run `fut` to completion on this connection's runtime.
    pub fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }
}

impl DriverConnection for PostgresConnection {
    fn is_open(&self) -> bool {
        !self.client.is_closed()
    }

    fn begin(&mut self) -> Result<(), SqlHandleError> {
        Ok(self.block_on(self.client.batch_execute("BEGIN"))?)
    }

    fn commit(&mut self) -> Result<(), SqlHandleError> {
        Ok(self.block_on(self.client.batch_execute("COMMIT"))?)
    }

    fn rollback(&mut self) -> Result<(), SqlHandleError> {
        Ok(self.block_on(self.client.batch_execute("ROLLBACK"))?)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), SqlHandleError> {
        Ok(self.block_on(self.client.batch_execute(sql))?)
    }

    fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<WriteOutcome, SqlHandleError> {
        let converted = Params::convert(params);
        match plan_write(sql) {
            WritePlan::Execute(sql) => {
                let affected = self.block_on(self.client.execute(sql.as_ref(), converted.as_refs()))?;
                let rows_affected = usize::try_from(affected).map_err(|e| {
                    SqlHandleError::ExecutionError(format!("postgres affected rows conversion error: {e}"))
                })?;
                Ok(WriteOutcome {
                    rows_affected,
                    generated_key: None,
                })
            }
            WritePlan::Returning { sql, capture_key } => {
                let rows = self.block_on(self.client.query(sql.as_ref(), converted.as_refs()))?;
                let generated_key = if capture_key { generated_key(&rows)? } else { None };
                Ok(WriteOutcome {
                    rows_affected: rows.len(),
                    generated_key,
                })
            }
        }
    }

    fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<Recordset, SqlHandleError> {
        let sql = translate_placeholders(sql, PlaceholderStyle::Postgres);
        let converted = Params::convert(params);
        let stmt = self.block_on(self.client.prepare(&sql))?;
        let rows = self.block_on(self.client.query(&stmt, converted.as_refs()))?;
        build_result_set_from_statement(&stmt, &rows)
    }

    fn with_cursor<R, F>(&mut self, sql: &str, params: &[RowValues], scope: F) -> Result<R, SqlHandleError>
    where
        F: FnOnce(&mut Cursor<'_>) -> Result<R, SqlHandleError>,
    {
        let sql = translate_placeholders(sql, PlaceholderStyle::Postgres);
        let converted = Params::convert(params);
        let stmt = self.block_on(self.client.prepare(&sql))?;
        let names = column_names(&stmt);
        let width = names.len();
        let stream = self.block_on(self.client.query_raw(&stmt, converted.iter()))?;

        let mut source = PgRows::new(&self.runtime, stream, width);
        let mut cursor = Cursor::new(&mut source, names);
        let result = scope(&mut cursor);
        cursor.close();
        // dropping the statement sends its close message
        result
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<String>, SqlHandleError> {
        let rows = self.block_on(self.client.query(TABLE_COLUMNS_SQL, &[&table]))?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(SqlHandleError::from))
            .collect()
    }
}

impl std::fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("closed", &self.client.is_closed())
            .finish_non_exhaustive()
    }
}
