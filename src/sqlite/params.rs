use rusqlite::types::Value;

use crate::types::RowValues;

/// Convert a single `RowValues` to a rusqlite `Value`.
///
/// `SQLite` has no temporal or decimal storage class; those are bound as ISO-8601 and
/// decimal text, booleans as 0/1 and JSON as its serialized text.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Decimal(d) => Value::Text(d.to_string()),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Date(d) => Value::Text(d.format("%F").to_string()),
        RowValues::Time(t) => Value::Text(t.format("%T%.f").to_string()),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Positional parameters converted for rusqlite.
pub struct Params(pub Vec<Value>);

impl Params {
    #[must_use]
    pub fn convert(params: &[RowValues]) -> Self {
        Params(params.iter().map(row_value_to_sqlite_value).collect())
    }

    /// Borrow as a rusqlite parameter list.
    pub fn as_params(&self) -> impl rusqlite::Params + '_ {
        rusqlite::params_from_iter(self.0.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn temporal_and_decimal_values_bind_as_text() {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(
            row_value_to_sqlite_value(&RowValues::Timestamp(ts)),
            Value::Text("2025-01-02 03:04:05".into())
        );
        assert_eq!(
            row_value_to_sqlite_value(&RowValues::Date(ts.date())),
            Value::Text("2025-01-02".into())
        );
        assert_eq!(
            row_value_to_sqlite_value(&RowValues::Time(ts.time())),
            Value::Text("03:04:05".into())
        );
        assert_eq!(
            row_value_to_sqlite_value(&RowValues::Decimal(Decimal::from_str("12.50").unwrap())),
            Value::Text("12.50".into())
        );
    }

    #[test]
    fn bools_bind_as_integers() {
        let params = Params::convert(&[RowValues::Bool(true), RowValues::Null]);
        assert_eq!(params.0, vec![Value::Integer(1), Value::Null]);
    }
}
