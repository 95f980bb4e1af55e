use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use tracing::debug;

use super::config::SqliteOptions;
use super::connection::{Inner, SqliteConnection};
use crate::error::SqlHandleError;
use crate::provider::ConnectionProvider;

fn open_flags() -> OpenFlags {
    OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
}

/// Opens a new `SQLite` connection on every acquire and closes it on release.
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    opts: SqliteOptions,
}

impl SqliteProvider {
    #[must_use]
    pub fn new(opts: SqliteOptions) -> Self {
        Self { opts }
    }

    /// Options each new connection is opened with.
    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.opts
    }
}

impl ConnectionProvider for SqliteProvider {
    type Connection = SqliteConnection;

    fn acquire(&self) -> Result<SqliteConnection, SqlHandleError> {
        let conn = rusqlite::Connection::open_with_flags(&self.opts.db_path, open_flags())?;
        self.opts.apply_pragmas(&conn)?;
        debug!(db_path = %self.opts.db_path, "sqlite connection opened");
        Ok(SqliteConnection::owned(conn, self.opts.translate_placeholders))
    }

    fn release(&self, conn: SqliteConnection) -> Result<(), SqlHandleError> {
        match conn.inner {
            Inner::Owned(raw) => raw.close().map_err(|(_, err)| SqlHandleError::SqliteError(err)),
            Inner::Pooled(pooled) => {
                drop(pooled);
                Ok(())
            }
        }
    }
}

/// Lends connections from an r2d2 pool; release returns them to the pool.
#[derive(Clone)]
pub struct SqlitePoolProvider {
    pool: Pool<SqliteConnectionManager>,
    translate_placeholders: bool,
}

impl SqlitePoolProvider {
    /// Build the pool. Every pooled connection gets the configured pragmas.
    ///
    /// # Errors
    /// Returns `SqlHandleError::ConnectionError` if the pool cannot be created, which
    /// includes the first connection failing to open.
    pub fn new(opts: SqliteOptions) -> Result<Self, SqlHandleError> {
        let init_opts = opts.clone();
        let manager = SqliteConnectionManager::file(&opts.db_path)
            .with_flags(open_flags())
            .with_init(move |conn| init_opts.apply_pragmas(conn));

        let pool = Pool::builder()
            .max_size(opts.pool_max_size)
            .build(manager)
            .map_err(|e| SqlHandleError::ConnectionError(format!("Failed to create SQLite pool: {e}")))?;

        Ok(Self {
            pool,
            translate_placeholders: opts.translate_placeholders,
        })
    }

    /// The underlying pool, e.g. for `state()` inspection.
    #[must_use]
    pub fn pool(&self) -> &Pool<SqliteConnectionManager> {
        &self.pool
    }
}

impl std::fmt::Debug for SqlitePoolProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePoolProvider")
            .field("state", &self.pool.state())
            .field("translate_placeholders", &self.translate_placeholders)
            .finish()
    }
}

impl ConnectionProvider for SqlitePoolProvider {
    type Connection = SqliteConnection;

    fn acquire(&self) -> Result<SqliteConnection, SqlHandleError> {
        let conn = self
            .pool
            .get()
            .map_err(|e| SqlHandleError::ConnectionError(format!("SQLite pool checkout failed: {e}")))?;
        Ok(SqliteConnection::pooled(conn, self.translate_placeholders))
    }
}
