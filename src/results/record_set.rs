use std::collections::HashMap;
use std::sync::Arc;

use super::row::{Record, build_column_index};
use crate::types::RowValues;

/// Fully materialized rows of a buffered read, in result order.
///
/// Every record shares the column list captured from the statement metadata, so an
/// empty result still reports its columns.
#[derive(Debug, Clone, Default)]
pub struct Recordset {
    records: Vec<Record>,
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
}

impl Recordset {
    /// Create an empty recordset for the given columns.
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>) -> Self {
        Self::with_capacity(column_names, 0)
    }

    /// Create an empty recordset with room for `capacity` rows.
    #[must_use]
    pub fn with_capacity(column_names: Arc<Vec<String>>, capacity: usize) -> Self {
        let column_index = Arc::new(build_column_index(&column_names));
        Self {
            records: Vec::with_capacity(capacity),
            column_names,
            column_index,
        }
    }

    /// Append one row; `row_values` must be in column order.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        self.records.push(Record::with_index(
            Arc::clone(&self.column_names),
            Arc::clone(&self.column_index),
            row_values,
        ));
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    #[must_use]
    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl IntoIterator for Recordset {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Recordset {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
