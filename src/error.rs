use thiserror::Error;

/// Every failure surfaced by a handle, cursor, provider or introspection call.
///
/// Backend errors are carried unchanged so callers can inspect SQL-level
/// details (constraint names, SQLSTATE codes) themselves.
#[derive(Debug, Error)]
pub enum SqlHandleError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Connection not available (call open())")]
    NotConnected,

    #[error("No auto-generated key available from the last write")]
    NoGeneratedKey,

    #[error("Error retrieving table columns for: {table}")]
    IntrospectionError {
        table: String,
        #[source]
        source: Box<SqlHandleError>,
    },

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}

impl SqlHandleError {
    #[must_use]
    pub fn is_not_connected(&self) -> bool {
        matches!(self, SqlHandleError::NotConnected)
    }

    #[must_use]
    pub fn is_no_generated_key(&self) -> bool {
        matches!(self, SqlHandleError::NoGeneratedKey)
    }

    pub(crate) fn introspection(table: &str, source: SqlHandleError) -> Self {
        SqlHandleError::IntrospectionError {
            table: table.to_owned(),
            source: Box::new(source),
        }
    }
}
