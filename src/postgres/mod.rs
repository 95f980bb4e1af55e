// PostgreSQL backend:
// - config: connection options and validation
// - params: RowValues binding
// - query: value extraction, buffered results and cursor rows
// - connection: the DriverConnection implementation
// - provider: connect-per-handle provider

pub mod config;
pub mod connection;
pub mod params;
pub mod query;
pub mod provider;

pub use config::{PostgresOptions, PostgresOptionsBuilder};
pub use connection::PostgresConnection;
pub use params::Params;
pub use provider::PostgresProvider;
