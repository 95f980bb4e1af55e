//! Convenient imports for common functionality.
//!
//! `use sql_handle::prelude::*;` brings in the handle, providers, value and result types,
//! the error type and the [`convert`](crate::convert) module.

pub use crate::convert;
pub use crate::cursor::Cursor;
pub use crate::driver::{DriverConnection, WriteOutcome};
pub use crate::error::SqlHandleError;
pub use crate::handle::DbHandle;
pub use crate::provider::ConnectionProvider;
pub use crate::results::{Record, Recordset};
pub use crate::translation::{PlaceholderStyle, translate_placeholders};
pub use crate::types::{DatabaseType, RowValues};

#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub use crate::registry::{AnyProvider, SourceConfig, SourceRegistry};

#[cfg(feature = "postgres")]
pub use crate::postgres::{PostgresOptions, PostgresOptionsBuilder, PostgresProvider};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteOptions, SqliteOptionsBuilder, SqlitePoolProvider, SqliteProvider};
