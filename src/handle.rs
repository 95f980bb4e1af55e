use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::cursor::Cursor;
use crate::driver::DriverConnection;
use crate::error::SqlHandleError;
use crate::provider::ConnectionProvider;
use crate::results::Recordset;
use crate::types::RowValues;

/// One unit of database work: at most one live connection plus the state that goes
/// with it (transaction flag, last generated key).
///
/// A handle is plain owned data. Give each thread or request its own handle; handles
/// over the same provider never share transaction state or keys.
///
/// ```rust,no_run
/// use sql_handle::prelude::*;
///
/// # fn main() -> Result<(), SqlHandleError> {
/// let provider = SqliteProvider::new(SqliteOptions::new("app.db".into()));
/// let mut db = DbHandle::new(&provider);
/// db.open()?;
/// db.execute_batch("CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT)")?;
/// db.execute("INSERT INTO users (name) VALUES (?)", &[RowValues::from("alice")])?;
/// let id = db.last_insert_id()?;
/// let rows = db.query("SELECT name FROM users WHERE id = ?", &[RowValues::Int(id)])?;
/// assert_eq!(rows.len(), 1);
/// db.close();
/// # Ok(())
/// # }
/// ```
pub struct DbHandle<P: ConnectionProvider> {
    provider: P,
    conn: Option<P::Connection>,
    in_transaction: bool,
    last_generated_key: Option<i64>,
}

impl<P: ConnectionProvider> DbHandle<P> {
    /// Create a closed handle over `provider`.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            conn: None,
            in_transaction: false,
            last_generated_key: None,
        }
    }

    /// The provider this handle acquires its connection from.
    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Acquire a connection from the provider. No-op when one is already held.
    ///
    /// # Errors
    /// Returns [`SqlHandleError::ConnectionError`] when the provider cannot supply one.
    pub fn open(&mut self) -> Result<(), SqlHandleError> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = self
            .provider
            .acquire()
            .map_err(|err| SqlHandleError::ConnectionError(err.to_string()))?;
        debug!("connection acquired");
        self.conn = Some(conn);
        self.in_transaction = false;
        self.last_generated_key = None;
        Ok(())
    }

    /// Give the connection back to the provider and reset handle state.
    ///
    /// An open transaction is rolled back first. Failures are logged, never returned,
    /// and calling `close` on a closed handle does nothing.
    pub fn close(&mut self) {
        self.last_generated_key = None;
        let was_in_transaction = std::mem::replace(&mut self.in_transaction, false);
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        if was_in_transaction {
            if let Err(err) = conn.rollback() {
                warn!(error = %err, "rollback of open transaction failed during close");
            }
        }
        match self.provider.release(conn) {
            Ok(()) => debug!("connection released"),
            Err(err) => warn!(error = %err, "failed to release connection"),
        }
    }

    /// Whether a connection is held and the backend still reports it open.
    #[must_use]
    pub fn connected(&self) -> bool {
        self.conn.as_ref().is_some_and(DriverConnection::is_open)
    }

    /// Whether a transaction started with [`begin`](Self::begin) is still open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Leave autocommit mode.
    ///
    /// # Errors
    /// [`SqlHandleError::NotConnected`] without a connection, otherwise the backend error.
    pub fn begin(&mut self) -> Result<(), SqlHandleError> {
        self.conn_mut()?.begin()?;
        self.in_transaction = true;
        debug!("transaction started");
        Ok(())
    }

    /// Commit the current transaction and return to autocommit mode.
    ///
    /// # Errors
    /// [`SqlHandleError::NotConnected`] without a connection, otherwise the backend error
    /// (including a commit with no transaction open).
    pub fn commit(&mut self) -> Result<(), SqlHandleError> {
        self.conn_mut()?.commit()?;
        self.in_transaction = false;
        debug!("transaction committed");
        Ok(())
    }

    /// Roll back the current transaction and return to autocommit mode.
    ///
    /// # Errors
    /// [`SqlHandleError::NotConnected`] without a connection, otherwise the backend error.
    pub fn rollback(&mut self) -> Result<(), SqlHandleError> {
        self.conn_mut()?.rollback()?;
        self.in_transaction = false;
        debug!("transaction rolled back");
        Ok(())
    }

    /// Run `work` inside a transaction: commit when it returns `Ok`, roll back when it
    /// returns `Err`. A failed rollback is logged and the closure's error is returned.
    ///
    /// # Errors
    /// Any error from `begin`, `work` or `commit`.
    pub fn transaction<T, F>(&mut self, work: F) -> Result<T, SqlHandleError>
    where
        F: FnOnce(&mut Self) -> Result<T, SqlHandleError>,
    {
        self.begin()?;
        match work(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback() {
                    warn!(error = %rollback_err, "rollback after failed transaction body failed");
                }
                Err(err)
            }
        }
    }

    /// Run a write statement and return the number of affected rows.
    ///
    /// The generated-key slot is cleared first, then set when the statement produced a
    /// key, so a failed or key-less write always leaves it empty.
    ///
    /// # Errors
    /// [`SqlHandleError::NotConnected`] without a connection, otherwise the backend error.
    pub fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, SqlHandleError> {
        self.last_generated_key = None;
        let outcome = self.conn_mut()?.execute(sql, params)?;
        self.last_generated_key = outcome.generated_key;
        debug!(
            sql,
            params = params.len(),
            rows_affected = outcome.rows_affected,
            generated_key = outcome.generated_key.is_some(),
            "statement executed"
        );
        Ok(outcome.rows_affected)
    }

    /// Key generated by the most recent [`execute`](Self::execute).
    ///
    /// # Errors
    /// [`SqlHandleError::NoGeneratedKey`] when that write produced no key, failed, or the
    /// handle was closed since.
    pub fn last_insert_id(&self) -> Result<i64, SqlHandleError> {
        self.last_generated_key.ok_or(SqlHandleError::NoGeneratedKey)
    }

    /// Run several parameterless statements separated by `;`. Leaves the generated-key
    /// slot untouched.
    ///
    /// # Errors
    /// [`SqlHandleError::NotConnected`] without a connection, otherwise the backend error.
    pub fn execute_batch(&mut self, sql: &str) -> Result<(), SqlHandleError> {
        self.conn_mut()?.execute_batch(sql)?;
        debug!(sql, "batch executed");
        Ok(())
    }

    /// Run a read statement and materialize every row.
    ///
    /// # Errors
    /// [`SqlHandleError::NotConnected`] without a connection, otherwise the backend error.
    pub fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<Recordset, SqlHandleError> {
        let rows = self.conn_mut()?.query(sql, params)?;
        debug!(sql, params = params.len(), rows = rows.len(), "query executed");
        Ok(rows)
    }

    /// Run a read statement and stream its rows through a cursor lent to `scope`.
    ///
    /// The cursor and its statement are released when `scope` returns, on success and on
    /// error alike.
    ///
    /// ```rust,no_run
    /// # use sql_handle::prelude::*;
    /// # fn names(db: &mut DbHandle<SqliteProvider>) -> Result<Vec<String>, SqlHandleError> {
    /// db.cursor("SELECT name FROM users ORDER BY id", &[], |cursor| {
    ///     let mut names = Vec::new();
    ///     while cursor.next()? {
    ///         names.extend(convert::to_string(cursor.get("name")?));
    ///     }
    ///     Ok(names)
    /// })
    /// # }
    /// ```
    ///
    /// # Errors
    /// [`SqlHandleError::NotConnected`] without a connection, the backend error when the
    /// statement cannot be run, otherwise whatever `scope` returns.
    pub fn cursor<R, F>(&mut self, sql: &str, params: &[RowValues], scope: F) -> Result<R, SqlHandleError>
    where
        F: FnOnce(&mut Cursor<'_>) -> Result<R, SqlHandleError>,
    {
        let conn = self.conn_mut()?;
        debug!(sql, params = params.len(), "cursor opened");
        conn.with_cursor(sql, params, scope)
    }

    /// Lower-cased column names of `table`.
    ///
    /// The name is probed as given and, when that finds nothing, once more in upper
    /// case, so `orders` and `ORDERS` resolve the same table. An unknown table yields
    /// an empty set.
    ///
    /// # Errors
    /// [`SqlHandleError::NotConnected`] without a connection, or
    /// [`SqlHandleError::IntrospectionError`] wrapping the metadata failure.
    pub fn columns(&mut self, table: &str) -> Result<BTreeSet<String>, SqlHandleError> {
        let conn = self.conn_mut()?;
        let mut found = conn
            .table_columns(table)
            .map_err(|err| SqlHandleError::introspection(table, err))?;
        if found.is_empty() {
            let upper = table.to_uppercase();
            debug!(table, retry = %upper, "no columns found, retrying upper case");
            found = conn
                .table_columns(&upper)
                .map_err(|err| SqlHandleError::introspection(table, err))?;
        }
        Ok(found.into_iter().map(|name| name.to_lowercase()).collect())
    }

    fn conn_mut(&mut self) -> Result<&mut P::Connection, SqlHandleError> {
        self.conn.as_mut().ok_or(SqlHandleError::NotConnected)
    }
}

impl<P: ConnectionProvider> Drop for DbHandle<P> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<P: ConnectionProvider> std::fmt::Debug for DbHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbHandle")
            .field("connected", &self.conn.is_some())
            .field("in_transaction", &self.in_transaction)
            .field("last_generated_key", &self.last_generated_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    use super::*;
    use crate::cursor::BufferedRows;
    use crate::driver::WriteOutcome;

    #[derive(Default)]
    struct Log {
        calls: Vec<String>,
        releases: usize,
    }

    struct FakeConn {
        log: Rc<RefCell<Log>>,
        next_key: Option<i64>,
        fail_execute: bool,
        fail_release: bool,
        columns: Vec<(&'static str, Vec<String>)>,
    }

    impl DriverConnection for FakeConn {
        fn is_open(&self) -> bool {
            true
        }

        fn begin(&mut self) -> Result<(), SqlHandleError> {
            self.log.borrow_mut().calls.push("begin".into());
            Ok(())
        }

        fn commit(&mut self) -> Result<(), SqlHandleError> {
            self.log.borrow_mut().calls.push("commit".into());
            Ok(())
        }

        fn rollback(&mut self) -> Result<(), SqlHandleError> {
            self.log.borrow_mut().calls.push("rollback".into());
            Ok(())
        }

        fn execute_batch(&mut self, _sql: &str) -> Result<(), SqlHandleError> {
            Ok(())
        }

        fn execute(&mut self, sql: &str, _params: &[RowValues]) -> Result<WriteOutcome, SqlHandleError> {
            self.log.borrow_mut().calls.push(sql.to_string());
            if self.fail_execute {
                return Err(SqlHandleError::ExecutionError("boom".into()));
            }
            Ok(WriteOutcome {
                rows_affected: 1,
                generated_key: self.next_key,
            })
        }

        fn query(&mut self, _sql: &str, _params: &[RowValues]) -> Result<Recordset, SqlHandleError> {
            Ok(Recordset::new(Arc::new(vec!["n".into()])))
        }

        fn with_cursor<R, F>(&mut self, _sql: &str, _params: &[RowValues], scope: F) -> Result<R, SqlHandleError>
        where
            F: FnOnce(&mut Cursor<'_>) -> Result<R, SqlHandleError>,
        {
            let mut rows = BufferedRows::new(vec![vec![RowValues::Int(1)]]);
            let mut cursor = Cursor::new(&mut rows, vec!["n".into()]);
            let res = scope(&mut cursor);
            cursor.close();
            res
        }

        fn table_columns(&mut self, table: &str) -> Result<Vec<String>, SqlHandleError> {
            self.log.borrow_mut().calls.push(format!("probe {table}"));
            if table == "broken" {
                return Err(SqlHandleError::ExecutionError("no metadata".into()));
            }
            Ok(self
                .columns
                .iter()
                .find(|(name, _)| *name == table)
                .map(|(_, cols)| cols.clone())
                .unwrap_or_default())
        }
    }

    struct FakeProvider {
        log: Rc<RefCell<Log>>,
        next_key: Option<i64>,
        fail_execute: bool,
        fail_acquire: bool,
        fail_release: bool,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                log: Rc::default(),
                next_key: None,
                fail_execute: false,
                fail_acquire: false,
                fail_release: false,
            }
        }
    }

    impl ConnectionProvider for FakeProvider {
        type Connection = FakeConn;

        fn acquire(&self) -> Result<FakeConn, SqlHandleError> {
            if self.fail_acquire {
                return Err(SqlHandleError::ConfigError("no database".into()));
            }
            Ok(FakeConn {
                log: Rc::clone(&self.log),
                next_key: self.next_key,
                fail_execute: self.fail_execute,
                fail_release: self.fail_release,
                columns: vec![("ORDERS", vec!["ID".into(), "Total".into()])],
            })
        }

        fn release(&self, conn: FakeConn) -> Result<(), SqlHandleError> {
            self.log.borrow_mut().releases += 1;
            if conn.fail_release {
                Err(SqlHandleError::ExecutionError("release failed".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn operations_need_an_open_connection() {
        let provider = FakeProvider::new();
        let mut db = DbHandle::new(&provider);
        assert!(!db.connected());
        assert!(db.begin().unwrap_err().is_not_connected());
        assert!(db.execute("insert", &[]).unwrap_err().is_not_connected());
        assert!(db.query("select", &[]).unwrap_err().is_not_connected());
        assert!(db.columns("orders").unwrap_err().is_not_connected());
        assert!(db.cursor("select", &[], |_| Ok(())).unwrap_err().is_not_connected());
    }

    #[test]
    fn open_is_idempotent_and_close_releases_once() {
        let provider = FakeProvider::new();
        let mut db = DbHandle::new(&provider);
        db.open().unwrap();
        db.open().unwrap();
        assert!(db.connected());
        db.close();
        db.close();
        assert!(!db.connected());
        assert_eq!(provider.log.borrow().releases, 1);
    }

    #[test]
    fn acquire_failure_is_a_connection_error() {
        let mut provider = FakeProvider::new();
        provider.fail_acquire = true;
        let mut db = DbHandle::new(&provider);
        assert!(matches!(db.open(), Err(SqlHandleError::ConnectionError(_))));
        assert!(!db.connected());
    }

    #[test]
    fn key_slot_follows_every_execute() {
        let mut provider = FakeProvider::new();
        provider.next_key = Some(42);
        let mut db = DbHandle::new(&provider);
        assert!(db.last_insert_id().unwrap_err().is_no_generated_key());
        db.open().unwrap();
        assert_eq!(db.execute("insert", &[]).unwrap(), 1);
        assert_eq!(db.last_insert_id().unwrap(), 42);
        db.close();
        assert!(db.last_insert_id().unwrap_err().is_no_generated_key());
    }

    #[test]
    fn failed_execute_clears_the_key() {
        let mut provider = FakeProvider::new();
        provider.next_key = Some(7);
        let mut db = DbHandle::new(&provider);
        db.open().unwrap();
        db.execute("insert", &[]).unwrap();
        db.conn.as_mut().unwrap().fail_execute = true;
        assert!(db.execute("insert", &[]).is_err());
        assert!(db.last_insert_id().unwrap_err().is_no_generated_key());
    }

    #[test]
    fn close_rolls_back_open_transaction() {
        let provider = FakeProvider::new();
        {
            let mut db = DbHandle::new(&provider);
            db.open().unwrap();
            db.begin().unwrap();
            assert!(db.in_transaction());
        }
        let log = provider.log.borrow();
        assert_eq!(log.calls, vec!["begin", "rollback"]);
        assert_eq!(log.releases, 1);
    }

    #[test]
    fn release_failure_is_suppressed() {
        let mut provider = FakeProvider::new();
        provider.fail_release = true;
        let mut db = DbHandle::new(&provider);
        db.open().unwrap();
        db.close();
        assert!(!db.connected());
    }

    #[test]
    fn transaction_helper_commits_or_rolls_back() {
        let provider = FakeProvider::new();
        let mut db = DbHandle::new(&provider);
        db.open().unwrap();
        db.transaction(|db| db.execute("a", &[])).unwrap();
        let err = db
            .transaction(|db| {
                db.execute("b", &[])?;
                Err::<(), _>(SqlHandleError::ExecutionError("abort".into()))
            })
            .unwrap_err();
        assert!(matches!(err, SqlHandleError::ExecutionError(_)));
        assert!(!db.in_transaction());
        assert_eq!(
            provider.log.borrow().calls,
            vec!["begin", "a", "commit", "begin", "b", "rollback"]
        );
    }

    #[test]
    fn columns_fall_back_to_upper_case_and_lower_the_result() {
        let provider = FakeProvider::new();
        let mut db = DbHandle::new(&provider);
        db.open().unwrap();
        let cols = db.columns("orders").unwrap();
        assert_eq!(
            cols.into_iter().collect::<Vec<_>>(),
            vec!["id".to_string(), "total".to_string()]
        );
        assert!(db.columns("nothing").unwrap().is_empty());
        assert!(provider.log.borrow().calls.contains(&"probe NOTHING".to_string()));
    }

    #[test]
    fn metadata_failure_is_an_introspection_error() {
        let provider = FakeProvider::new();
        let mut db = DbHandle::new(&provider);
        db.open().unwrap();
        match db.columns("broken") {
            Err(SqlHandleError::IntrospectionError { table, .. }) => assert_eq!(table, "broken"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn cursor_scope_result_is_returned() {
        let provider = FakeProvider::new();
        let mut db = DbHandle::new(&provider);
        db.open().unwrap();
        let total = db
            .cursor("select", &[], |cursor| {
                let mut n = 0;
                while cursor.next()? {
                    n += cursor.get("n")?.as_int().copied().unwrap_or_default();
                }
                Ok(n)
            })
            .unwrap();
        assert_eq!(total, 1);
    }
}
