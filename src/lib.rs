//! Synchronous database handles over `SQLite` (rusqlite) and `PostgreSQL` (tokio-postgres).
//!
//! A [`DbHandle`] owns at most one connection obtained from a [`ConnectionProvider`] and
//! offers manual transactions, parameterized writes with generated-key capture, buffered
//! reads into a [`Recordset`], streaming reads through a [`Cursor`], and table column
//! introspection. Values travel as [`RowValues`] in both directions; the [`convert`]
//! helpers project them onto domain types.
//!
//! ```rust
//! use sql_handle::prelude::*;
//!
//! # fn main() -> Result<(), SqlHandleError> {
//! let provider = SqliteProvider::new(SqliteOptions::new(":memory:".into()));
//! let mut db = DbHandle::new(&provider);
//! db.open()?;
//! db.execute_batch("CREATE TABLE orders (id INTEGER PRIMARY KEY, total TEXT)")?;
//!
//! db.begin()?;
//! db.execute("INSERT INTO orders (total) VALUES (?)", &[RowValues::from("12.50")])?;
//! let id = db.last_insert_id()?;
//! db.commit()?;
//!
//! let rows = db.query("SELECT total FROM orders WHERE id = ?", &[RowValues::Int(id)])?;
//! let total = convert::to_decimal(rows.first().and_then(|r| r.get("total")));
//! assert_eq!(total.map(|d| d.to_string()), Some("12.50".to_string()));
//!
//! assert!(db.columns("ORDERS")?.contains("total"));
//! # Ok(())
//! # }
//! ```
//!
//! Backends are behind the `sqlite` and `postgres` features, both on by default.

pub mod convert;
pub mod cursor;
pub mod driver;
pub mod error;
pub mod handle;
pub mod prelude;
pub mod provider;
pub mod results;
pub mod translation;
pub mod types;

#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod registry;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use cursor::{Cursor, RowSource};
pub use driver::{DriverConnection, WriteOutcome};
pub use error::SqlHandleError;
pub use handle::DbHandle;
pub use provider::ConnectionProvider;
pub use results::{Record, Recordset};
pub use types::{DatabaseType, RowValues};

#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub use registry::{AnyConnection, AnyProvider, SourceConfig, SourceRegistry};
