use std::pin::Pin;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::StreamExt;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::runtime::Runtime;
use tokio_postgres::{RowStream, Statement};

use crate::cursor::RowSource;
use crate::error::SqlHandleError;
use crate::results::Recordset;
use crate::types::RowValues;

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
///
/// # Errors
/// Returns `SqlHandleError::PostgresError` if the column cannot be read as its
/// reported type.
pub fn postgres_extract_value(
    row: &tokio_postgres::Row,
    idx: usize,
) -> Result<RowValues, SqlHandleError> {
    let type_name = row.columns()[idx].type_().name();

    let value = match type_name {
        "int2" => row.try_get::<_, Option<i16>>(idx)?.map(|v| RowValues::Int(i64::from(v))),
        "int4" => row.try_get::<_, Option<i32>>(idx)?.map(|v| RowValues::Int(i64::from(v))),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.map(RowValues::Int),
        "float4" => row.try_get::<_, Option<f32>>(idx)?.map(|v| RowValues::Float(f64::from(v))),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.map(RowValues::Float),
        "numeric" => row.try_get::<_, Option<Decimal>>(idx)?.map(RowValues::Decimal),
        "bool" => row.try_get::<_, Option<bool>>(idx)?.map(RowValues::Bool),
        "date" => row.try_get::<_, Option<NaiveDate>>(idx)?.map(RowValues::Date),
        "time" => row.try_get::<_, Option<NaiveTime>>(idx)?.map(RowValues::Time),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(RowValues::Timestamp),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)?
            .map(|v| RowValues::Timestamp(v.naive_utc())),
        "json" | "jsonb" => row.try_get::<_, Option<Value>>(idx)?.map(RowValues::JSON),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(RowValues::Blob),
        // text, varchar, bpchar, name and anything else that reads as a string
        _ => row.try_get::<_, Option<String>>(idx)?.map(RowValues::Text),
    };
    Ok(value.unwrap_or(RowValues::Null))
}

fn extract_row(row: &tokio_postgres::Row, width: usize) -> Result<Vec<RowValues>, SqlHandleError> {
    (0..width).map(|i| postgres_extract_value(row, i)).collect()
}

pub(crate) fn column_names(stmt: &Statement) -> Vec<String> {
    stmt.columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect()
}

/// Build a result set using statement metadata for column names.
///
/// # Errors
/// Returns errors from row value extraction.
pub fn build_result_set_from_statement(
    stmt: &Statement,
    rows: &[tokio_postgres::Row],
) -> Result<Recordset, SqlHandleError> {
    let names = column_names(stmt);
    let width = names.len();
    let mut result_set = Recordset::with_capacity(Arc::new(names), rows.len());
    for row in rows {
        result_set.add_row_values(extract_row(row, width)?);
    }
    Ok(result_set)
}

/// Generated key of a write: the first column of the first returned row, when it is
/// an integer.
pub(crate) fn generated_key(rows: &[tokio_postgres::Row]) -> Result<Option<i64>, SqlHandleError> {
    let Some(row) = rows.first() else {
        return Ok(None);
    };
    if row.is_empty() {
        return Ok(None);
    }
    match postgres_extract_value(row, 0)? {
        RowValues::Int(key) => Ok(Some(key)),
        _ => Ok(None),
    }
}

/// Row stream of a running portal, pulled one row per `fetch` on the owning runtime.
pub(crate) struct PgRows<'rt> {
    runtime: &'rt Runtime,
    stream: Option<Pin<Box<RowStream>>>,
    width: usize,
}

impl<'rt> PgRows<'rt> {
    pub(crate) fn new(runtime: &'rt Runtime, stream: RowStream, width: usize) -> Self {
        Self {
            runtime,
            stream: Some(Box::pin(stream)),
            width,
        }
    }
}

impl RowSource for PgRows<'_> {
    fn fetch(&mut self) -> Result<Option<Vec<RowValues>>, SqlHandleError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        match self.runtime.block_on(stream.next()) {
            Some(row) => extract_row(&row?, self.width).map(Some),
            None => {
                self.stream = None;
                Ok(None)
            }
        }
    }

    fn release(&mut self) -> Result<(), SqlHandleError> {
        // dropping the stream closes the portal; the connection task discards the rest
        self.stream = None;
        Ok(())
    }
}
