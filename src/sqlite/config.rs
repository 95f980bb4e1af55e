use serde::Deserialize;

/// Options for opening `SQLite` connections, directly or through a pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SqliteOptions {
    /// Database file; `:memory:` opens a private in-memory database per connection.
    pub db_path: String,
    /// Rewrite `$N` placeholders to `?N` before preparing.
    pub translate_placeholders: bool,
    pub journal_wal: bool,
    pub foreign_keys: bool,
    pub busy_timeout_ms: u64,
    /// Only used by [`SqlitePoolProvider`](super::SqlitePoolProvider).
    pub pool_max_size: u32,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            db_path: ":memory:".to_string(),
            translate_placeholders: false,
            journal_wal: true,
            foreign_keys: true,
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_translation(mut self, translate_placeholders: bool) -> Self {
        self.translate_placeholders = translate_placeholders;
        self
    }

    #[must_use]
    pub fn builder(db_path: String) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }

    /// Apply the configured pragmas to a freshly opened connection.
    pub(crate) fn apply_pragmas(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
        conn.execute_batch(&format!("PRAGMA busy_timeout = {};", self.busy_timeout_ms))?;
        if self.journal_wal {
            // in-memory databases report "memory" and stay that way
            let mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
            if mode != "wal" && mode != "memory" {
                return Err(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                    Some(format!("failed to set WAL journal mode, got: {mode}")),
                ));
            }
        }
        conn.execute_batch(if self.foreign_keys {
            "PRAGMA foreign_keys = ON;"
        } else {
            "PRAGMA foreign_keys = OFF;"
        })
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn translation(mut self, translate_placeholders: bool) -> Self {
        self.opts.translate_placeholders = translate_placeholders;
        self
    }

    #[must_use]
    pub fn journal_wal(mut self, enabled: bool) -> Self {
        self.opts.journal_wal = enabled;
        self
    }

    #[must_use]
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.opts.foreign_keys = enabled;
        self
    }

    #[must_use]
    pub fn busy_timeout_ms(mut self, millis: u64) -> Self {
        self.opts.busy_timeout_ms = millis;
        self
    }

    #[must_use]
    pub fn pool_max_size(mut self, size: u32) -> Self {
        self.opts.pool_max_size = size;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }
}
