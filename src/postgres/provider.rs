use tracing::debug;

use super::config::PostgresOptions;
use super::connection::PostgresConnection;
use crate::error::SqlHandleError;
use crate::provider::ConnectionProvider;

/// Connects to the server on every acquire; release closes the connection.
#[derive(Debug, Clone)]
pub struct PostgresProvider {
    config: tokio_postgres::Config,
}

impl PostgresProvider {
    /// Validate `opts` up front so a misconfigured source fails at construction.
    ///
    /// # Errors
    /// Returns `SqlHandleError::ConfigError` if a required field is missing.
    pub fn new(opts: &PostgresOptions) -> Result<Self, SqlHandleError> {
        Ok(Self {
            config: opts.to_pg_config()?,
        })
    }

    /// Use an already-built driver config as is.
    #[must_use]
    pub fn from_pg_config(config: tokio_postgres::Config) -> Self {
        Self { config }
    }
}

impl ConnectionProvider for PostgresProvider {
    type Connection = PostgresConnection;

    fn acquire(&self) -> Result<PostgresConnection, SqlHandleError> {
        let conn = PostgresConnection::connect(&self.config)?;
        debug!(dbname = ?self.config.get_dbname(), "postgres connection opened");
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_options_fail_at_construction() {
        let opts = PostgresOptions::builder().host("localhost").finish();
        assert!(matches!(
            PostgresProvider::new(&opts),
            Err(SqlHandleError::ConfigError(_))
        ));
    }
}
