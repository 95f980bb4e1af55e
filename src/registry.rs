//! Named data sources: register providers once, open handles by name.
//!
//! ```rust
//! use sql_handle::prelude::*;
//!
//! # fn main() -> Result<(), SqlHandleError> {
//! let configs: std::collections::HashMap<String, SourceConfig> = serde_json::from_str(
//!     r#"{ "main": { "type": "sqlite", "db_path": ":memory:" } }"#,
//! )
//! .map_err(|e| SqlHandleError::ConfigError(e.to_string()))?;
//! let registry = SourceRegistry::from_configs(configs)?;
//!
//! let mut db = registry.handle("main")?;
//! db.open()?;
//! assert!(db.connected());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::cursor::Cursor;
use crate::driver::{DriverConnection, WriteOutcome};
use crate::error::SqlHandleError;
use crate::handle::DbHandle;
use crate::provider::ConnectionProvider;
use crate::results::Recordset;
use crate::types::{DatabaseType, RowValues};

#[cfg(feature = "postgres")]
use crate::postgres::{PostgresConnection, PostgresOptions, PostgresProvider};
#[cfg(feature = "sqlite")]
use crate::sqlite::{SqliteConnection, SqliteOptions, SqlitePoolProvider, SqliteProvider};

/// Configuration of one named source, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// One `SQLite` connection opened per handle.
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteOptions),
    /// `SQLite` connections lent from an r2d2 pool.
    #[cfg(feature = "sqlite")]
    SqlitePool(SqliteOptions),
    #[cfg(feature = "postgres")]
    Postgres(PostgresOptions),
}

impl SourceConfig {
    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) | Self::SqlitePool(_) => DatabaseType::Sqlite,
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => DatabaseType::Postgres,
        }
    }
}

/// Any provider this crate ships.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteProvider),
    #[cfg(feature = "sqlite")]
    SqlitePool(SqlitePoolProvider),
    #[cfg(feature = "postgres")]
    Postgres(PostgresProvider),
}

impl AnyProvider {
    /// Build the provider described by `config`.
    ///
    /// # Errors
    /// Returns `SqlHandleError::ConfigError` for invalid Postgres options, or
    /// `SqlHandleError::ConnectionError` if a pool cannot be created.
    pub fn from_config(config: &SourceConfig) -> Result<Self, SqlHandleError> {
        Ok(match config {
            #[cfg(feature = "sqlite")]
            SourceConfig::Sqlite(opts) => Self::Sqlite(SqliteProvider::new(opts.clone())),
            #[cfg(feature = "sqlite")]
            SourceConfig::SqlitePool(opts) => Self::SqlitePool(SqlitePoolProvider::new(opts.clone())?),
            #[cfg(feature = "postgres")]
            SourceConfig::Postgres(opts) => Self::Postgres(PostgresProvider::new(opts)?),
        })
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) | Self::SqlitePool(_) => DatabaseType::Sqlite,
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => DatabaseType::Postgres,
        }
    }
}

/// Connection handed out by [`AnyProvider`].
#[derive(Debug)]
pub enum AnyConnection {
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteConnection),
    #[cfg(feature = "postgres")]
    Postgres(PostgresConnection),
}

impl ConnectionProvider for AnyProvider {
    type Connection = AnyConnection;

    fn acquire(&self) -> Result<AnyConnection, SqlHandleError> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(p) => p.acquire().map(AnyConnection::Sqlite),
            #[cfg(feature = "sqlite")]
            Self::SqlitePool(p) => p.acquire().map(AnyConnection::Sqlite),
            #[cfg(feature = "postgres")]
            Self::Postgres(p) => p.acquire().map(AnyConnection::Postgres),
        }
    }

    fn release(&self, conn: AnyConnection) -> Result<(), SqlHandleError> {
        match (self, conn) {
            #[cfg(feature = "sqlite")]
            (Self::Sqlite(p), AnyConnection::Sqlite(c)) => p.release(c),
            #[cfg(feature = "sqlite")]
            (Self::SqlitePool(p), AnyConnection::Sqlite(c)) => p.release(c),
            #[cfg(feature = "postgres")]
            (Self::Postgres(p), AnyConnection::Postgres(c)) => p.release(c),
            #[allow(unreachable_patterns)]
            (_, conn) => {
                drop(conn);
                Err(SqlHandleError::ConnectionError(
                    "connection released to a provider of another backend".into(),
                ))
            }
        }
    }
}

macro_rules! dispatch {
    ($conn:expr, $c:ident => $body:expr) => {
        match $conn {
            #[cfg(feature = "sqlite")]
            AnyConnection::Sqlite($c) => $body,
            #[cfg(feature = "postgres")]
            AnyConnection::Postgres($c) => $body,
        }
    };
}

impl DriverConnection for AnyConnection {
    fn is_open(&self) -> bool {
        dispatch!(self, c => c.is_open())
    }

    fn begin(&mut self) -> Result<(), SqlHandleError> {
        dispatch!(self, c => c.begin())
    }

    fn commit(&mut self) -> Result<(), SqlHandleError> {
        dispatch!(self, c => c.commit())
    }

    fn rollback(&mut self) -> Result<(), SqlHandleError> {
        dispatch!(self, c => c.rollback())
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), SqlHandleError> {
        dispatch!(self, c => c.execute_batch(sql))
    }

    fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<WriteOutcome, SqlHandleError> {
        dispatch!(self, c => c.execute(sql, params))
    }

    fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<Recordset, SqlHandleError> {
        dispatch!(self, c => c.query(sql, params))
    }

    fn with_cursor<R, F>(&mut self, sql: &str, params: &[RowValues], scope: F) -> Result<R, SqlHandleError>
    where
        F: FnOnce(&mut Cursor<'_>) -> Result<R, SqlHandleError>,
    {
        dispatch!(self, c => c.with_cursor(sql, params, scope))
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<String>, SqlHandleError> {
        dispatch!(self, c => c.table_columns(table))
    }
}

/// Providers registered under names, shared by every handle opened from them.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<AnyProvider>>,
}

impl SourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a provider for every `(name, config)` pair.
    ///
    /// # Errors
    /// Returns the first provider construction error.
    pub fn from_configs<I>(configs: I) -> Result<Self, SqlHandleError>
    where
        I: IntoIterator<Item = (String, SourceConfig)>,
    {
        let mut registry = Self::new();
        for (name, config) in configs {
            let provider = AnyProvider::from_config(&config)?;
            registry.register(name, provider);
        }
        Ok(registry)
    }

    /// Register `provider` under `name`, replacing any previous source of that name.
    pub fn register(&mut self, name: impl Into<String>, provider: AnyProvider) {
        let name = name.into();
        debug!(source = %name, backend = ?provider.database_type(), "source registered");
        self.sources.insert(name, Arc::new(provider));
    }

    /// # Errors
    /// Returns `SqlHandleError::ConfigError` if no source is registered under `name`.
    pub fn provider(&self, name: &str) -> Result<Arc<AnyProvider>, SqlHandleError> {
        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| SqlHandleError::ConfigError(format!("unknown data source: {name}")))
    }

    /// A closed handle over the source registered as `name`.
    ///
    /// # Errors
    /// Returns `SqlHandleError::ConfigError` if no source is registered under `name`.
    pub fn handle(&self, name: &str) -> Result<DbHandle<Arc<AnyProvider>>, SqlHandleError> {
        self.provider(name).map(DbHandle::new)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_configs() {
        let cfg: SourceConfig =
            serde_json::from_str(r#"{ "type": "sqlite_pool", "db_path": "x.db", "pool_max_size": 3 }"#)
                .unwrap();
        match &cfg {
            SourceConfig::SqlitePool(opts) => assert_eq!(opts.pool_max_size, 3),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(cfg.database_type(), DatabaseType::Sqlite);
    }

    #[test]
    fn unknown_source_is_a_config_error() {
        let registry = SourceRegistry::new();
        assert!(matches!(
            registry.handle("missing"),
            Err(SqlHandleError::ConfigError(_))
        ));
    }

    #[test]
    fn handles_from_one_source_share_the_provider() {
        let mut registry = SourceRegistry::new();
        registry.register(
            "mem",
            AnyProvider::Sqlite(SqliteProvider::new(SqliteOptions::new(":memory:".into()))),
        );
        let a = registry.handle("mem").unwrap();
        let b = registry.handle("mem").unwrap();
        assert!(Arc::ptr_eq(a.provider(), b.provider()));
        assert_eq!(registry.names().collect::<Vec<_>>(), ["mem"]);
    }
}
