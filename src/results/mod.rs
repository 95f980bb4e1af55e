//! In-memory rows produced by buffered reads and cursors.

mod record_set;
mod row;

pub use record_set::Recordset;
pub use row::Record;
pub(crate) use row::build_column_index;
