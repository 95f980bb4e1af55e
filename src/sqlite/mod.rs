// SQLite backend:
// - config: connection options and pragmas
// - params: RowValues -> rusqlite values
// - query: value extraction, buffered results and cursor rows
// - connection: the DriverConnection implementation
// - provider: direct and r2d2-pooled providers

pub mod config;
pub mod connection;
pub mod params;
pub mod query;
pub mod provider;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteConnection;
pub use provider::{SqlitePoolProvider, SqliteProvider};
