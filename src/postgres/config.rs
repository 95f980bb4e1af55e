use std::time::Duration;

use serde::Deserialize;

use crate::error::SqlHandleError;

/// Connection settings for a Postgres server.
///
/// Every field but `connect_timeout_secs` is required; [`PostgresOptions::to_pg_config`]
/// reports the first missing one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PostgresOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

impl PostgresOptions {
    #[must_use]
    pub fn builder() -> PostgresOptionsBuilder {
        PostgresOptionsBuilder::default()
    }

    /// Validate the options and build a driver config.
    ///
    /// # Errors
    /// Returns `SqlHandleError::ConfigError` naming the first missing required field.
    pub fn to_pg_config(&self) -> Result<tokio_postgres::Config, SqlHandleError> {
        let dbname = required(self.dbname.as_deref(), "dbname")?;
        let host = required(self.host.as_deref(), "host")?;
        let port = self
            .port
            .ok_or_else(|| SqlHandleError::ConfigError("port is required".to_string()))?;
        let user = required(self.user.as_deref(), "user")?;
        let password = required(self.password.as_deref(), "password")?;

        let mut cfg = tokio_postgres::Config::new();
        cfg.host(host)
            .port(port)
            .dbname(dbname)
            .user(user)
            .password(password);
        if let Some(secs) = self.connect_timeout_secs {
            cfg.connect_timeout(Duration::from_secs(secs));
        }
        Ok(cfg)
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, SqlHandleError> {
    value.ok_or_else(|| SqlHandleError::ConfigError(format!("{field} is required")))
}

/// Fluent builder for Postgres options.
#[derive(Debug, Clone, Default)]
pub struct PostgresOptionsBuilder {
    opts: PostgresOptions,
}

impl PostgresOptionsBuilder {
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.opts.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.opts.port = Some(port);
        self
    }

    #[must_use]
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.opts.dbname = Some(dbname.into());
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.opts.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.opts.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.opts.connect_timeout_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn finish(self) -> PostgresOptions {
        self.opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> PostgresOptionsBuilder {
        PostgresOptions::builder()
            .host("localhost")
            .port(5432)
            .dbname("app")
            .user("app")
            .password("secret")
    }

    #[test]
    fn complete_options_build_a_config() {
        let cfg = complete().connect_timeout_secs(3).finish().to_pg_config().unwrap();
        assert_eq!(cfg.get_dbname(), Some("app"));
        assert_eq!(cfg.get_ports(), &[5432]);
        assert_eq!(cfg.get_connect_timeout(), Some(&Duration::from_secs(3)));
    }

    #[test]
    fn missing_fields_are_config_errors() {
        let mut opts = complete().finish();
        opts.password = None;
        match opts.to_pg_config() {
            Err(SqlHandleError::ConfigError(msg)) => assert_eq!(msg, "password is required"),
            other => panic!("unexpected: {other:?}"),
        }
        let err = PostgresOptions::default().to_pg_config().unwrap_err();
        assert!(matches!(err, SqlHandleError::ConfigError(ref m) if m == "dbname is required"));
    }

    #[test]
    fn deserializes_partial_options() {
        let opts: PostgresOptions =
            serde_json::from_str(r#"{ "host": "db", "port": 6543 }"#).unwrap();
        assert_eq!(opts.host.as_deref(), Some("db"));
        assert_eq!(opts.port, Some(6543));
        assert!(opts.user.is_none());
    }
}
