//! Lenient projections from column values to typed domain values.
//!
//! Every helper accepts either `&RowValues` or the `Option<&RowValues>` returned by
//! [`Record::get`](crate::results::Record::get), so a missing column and a SQL `NULL`
//! both come back as `None`. A value that cannot be coerced also yields `None`; these
//! functions never fail.
//!
//! ```rust
//! use sql_handle::convert;
//! use sql_handle::prelude::*;
//!
//! assert_eq!(convert::to_integer(&RowValues::Float(3.0)), Some(3));
//! assert_eq!(convert::to_boolean(&RowValues::Int(1)), Some(true));
//! assert!(convert::to_decimal(&RowValues::Text("abc".into())).is_none());
//! assert!(convert::to_local_date_time(&RowValues::Text("2025-01-01T10:00:00".into())).is_some());
//! ```

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::types::RowValues;

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// Project a value onto `i64`; floats and decimals are truncated toward zero.
pub fn to_long<'a>(value: impl Into<Option<&'a RowValues>>) -> Option<i64> {
    match value.into()? {
        RowValues::Int(i) => Some(*i),
        // `as` saturates at the i64 bounds and maps NaN to 0
        #[allow(clippy::cast_possible_truncation)]
        RowValues::Float(f) => Some(f.trunc() as i64),
        RowValues::Decimal(d) => d.trunc().to_i64(),
        _ => None,
    }
}

/// Project a value onto `i32`.
///
/// 64-bit integers keep their low 32 bits; floats and decimals are truncated and
/// clamped to the `i32` range.
pub fn to_integer<'a>(value: impl Into<Option<&'a RowValues>>) -> Option<i32> {
    match value.into()? {
        #[allow(clippy::cast_possible_truncation)]
        RowValues::Int(i) => Some(*i as i32),
        #[allow(clippy::cast_possible_truncation)]
        RowValues::Float(f) => Some(f.trunc() as i32),
        RowValues::Decimal(d) => {
            let truncated = d.trunc();
            Some(truncated.to_i32().unwrap_or(if truncated.is_sign_negative() {
                i32::MIN
            } else {
                i32::MAX
            }))
        }
        _ => None,
    }
}

/// Booleans pass through; numbers are true when their truncated 64-bit value is non-zero.
pub fn to_boolean<'a>(value: impl Into<Option<&'a RowValues>>) -> Option<bool> {
    let value = value.into()?;
    match value {
        RowValues::Bool(b) => Some(*b),
        RowValues::Int(i) => Some(*i != 0),
        RowValues::Float(_) => to_long(value).map(|i| i != 0),
        RowValues::Decimal(d) => Some(!d.trunc().is_zero()),
        _ => None,
    }
}

/// Render any non-null value as text.
///
/// Temporal values use ISO-8601; binary data is returned only if it is valid UTF-8.
pub fn to_string<'a>(value: impl Into<Option<&'a RowValues>>) -> Option<String> {
    match value.into()? {
        RowValues::Null => None,
        RowValues::Text(s) => Some(s.clone()),
        RowValues::Int(i) => Some(i.to_string()),
        RowValues::Float(f) => Some(f.to_string()),
        RowValues::Decimal(d) => Some(d.to_string()),
        RowValues::Bool(b) => Some(b.to_string()),
        RowValues::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        RowValues::Time(t) => Some(t.format("%H:%M:%S%.f").to_string()),
        RowValues::Timestamp(ts) => Some(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        RowValues::JSON(json) => Some(json.to_string()),
        RowValues::Blob(bytes) => String::from_utf8(bytes.clone()).ok(),
    }
}

/// Project a value onto an exact decimal; text is parsed, non-finite floats yield `None`.
pub fn to_decimal<'a>(value: impl Into<Option<&'a RowValues>>) -> Option<Decimal> {
    match value.into()? {
        RowValues::Decimal(d) => Some(*d),
        RowValues::Int(i) => Some(Decimal::from(*i)),
        RowValues::Float(f) => Decimal::try_from(*f).ok(),
        RowValues::Text(s) => parse_decimal(s.trim()),
        _ => None,
    }
}

/// Project a value onto a calendar date.
pub fn to_local_date<'a>(value: impl Into<Option<&'a RowValues>>) -> Option<NaiveDate> {
    match value.into()? {
        RowValues::Date(d) => Some(*d),
        RowValues::Timestamp(ts) => Some(ts.date()),
        RowValues::Text(s) => parse_date(s.trim()),
        _ => None,
    }
}

/// Project a value onto a time of day.
pub fn to_local_time<'a>(value: impl Into<Option<&'a RowValues>>) -> Option<NaiveTime> {
    match value.into()? {
        RowValues::Time(t) => Some(*t),
        RowValues::Timestamp(ts) => Some(ts.time()),
        RowValues::Text(s) => parse_time(s.trim()),
        _ => None,
    }
}

/// Project a value onto a date-time; a bare date becomes midnight of that day.
pub fn to_local_date_time<'a>(value: impl Into<Option<&'a RowValues>>) -> Option<NaiveDateTime> {
    match value.into()? {
        RowValues::Timestamp(ts) => Some(*ts),
        RowValues::Date(d) => Some(d.and_time(NaiveTime::MIN)),
        RowValues::Text(s) => parse_date_time(s.trim()),
        _ => None,
    }
}

/// Parameter value for an optional date (`None` binds `NULL`).
#[must_use]
pub fn from_local_date(value: Option<NaiveDate>) -> RowValues {
    RowValues::from(value)
}

/// Parameter value for an optional time of day (`None` binds `NULL`).
#[must_use]
pub fn from_local_time(value: Option<NaiveTime>) -> RowValues {
    RowValues::from(value)
}

/// Parameter value for an optional date-time (`None` binds `NULL`).
#[must_use]
pub fn from_local_date_time(value: Option<NaiveDateTime>) -> RowValues {
    RowValues::from(value)
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_date_time(s).map(|ts| ts.date()))
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
        .or_else(|| parse_date_time(s).map(|ts| ts.time()))
}

fn parse_date_time(s: &str) -> Option<NaiveDateTime> {
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(s: &str) -> RowValues {
        RowValues::Text(s.to_string())
    }

    #[test]
    fn null_and_missing_stay_none() {
        assert_eq!(to_integer(&RowValues::Null), None);
        assert_eq!(to_integer(None::<&RowValues>), None);
        assert_eq!(to_long(&RowValues::Null), None);
        assert_eq!(to_boolean(&RowValues::Null), None);
        assert_eq!(to_string(&RowValues::Null), None);
        assert_eq!(to_local_date_time(None::<&RowValues>), None);
    }

    #[test]
    fn numeric_projection_truncates() {
        assert_eq!(to_integer(&RowValues::Float(3.0)), Some(3));
        assert_eq!(to_integer(&RowValues::Float(-3.9)), Some(-3));
        assert_eq!(to_long(&RowValues::Float(2.99)), Some(2));
        assert_eq!(to_long(&RowValues::Decimal(Decimal::new(1250, 2))), Some(12));
        assert_eq!(to_integer(&RowValues::Int(i64::from(i32::MAX) + 1)), Some(i32::MIN));
        assert_eq!(to_integer(&RowValues::Float(1e20)), Some(i32::MAX));
        assert_eq!(to_long(&text("12")), None);
        assert_eq!(to_integer(&RowValues::Bool(true)), None);
    }

    #[test]
    fn boolean_projection() {
        assert_eq!(to_boolean(&RowValues::Int(1)), Some(true));
        assert_eq!(to_boolean(&RowValues::Int(0)), Some(false));
        assert_eq!(to_boolean(&RowValues::Float(0.4)), Some(false));
        assert_eq!(to_boolean(&RowValues::Bool(false)), Some(false));
        assert_eq!(to_boolean(&text("true")), None);
        assert_eq!(to_boolean(&RowValues::Int(1 << 32)), Some(true));
        assert_eq!(to_boolean(&RowValues::Decimal(Decimal::new(5, 1))), Some(false));
        assert_eq!(to_boolean(&RowValues::Decimal(Decimal::new(-15, 1))), Some(true));
    }

    #[test]
    fn string_projection() {
        assert_eq!(to_string(&RowValues::Int(5)).as_deref(), Some("5"));
        assert_eq!(to_string(&RowValues::Bool(true)).as_deref(), Some("true"));
        assert_eq!(to_string(&RowValues::JSON(json!({"a": 1}))).as_deref(), Some("{\"a\":1}"));
        assert_eq!(to_string(&RowValues::Blob(b"hi".to_vec())).as_deref(), Some("hi"));
        assert_eq!(to_string(&RowValues::Blob(vec![0xff, 0xfe])), None);
        let ts = NaiveDate::from_ymd_opt(2025, 1, 1)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .expect("valid");
        assert_eq!(
            to_string(&RowValues::Timestamp(ts)).as_deref(),
            Some("2025-01-01T10:00:00")
        );
    }

    #[test]
    fn decimal_projection() {
        assert_eq!(to_decimal(&text("abc")), None);
        assert_eq!(to_decimal(&text("12.50")), Some(Decimal::new(1250, 2)));
        assert_eq!(to_decimal(&RowValues::Int(7)), Some(Decimal::from(7)));
        assert_eq!(to_decimal(&RowValues::Float(f64::NAN)), None);
        assert_eq!(to_decimal(&RowValues::Bool(true)), None);
    }

    #[test]
    fn temporal_projection_accepts_iso_text() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 1)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .expect("valid");
        assert_eq!(to_local_date_time(&text("2025-01-01T10:00:00")), Some(expected));
        assert_eq!(to_local_date_time(&text("2025-01-01 10:00:00")), Some(expected));
        assert_eq!(to_local_date_time(&text("2025-01-01T10:00")), Some(expected));
        assert_eq!(
            to_local_date_time(&text("2025-01-01")),
            NaiveDate::from_ymd_opt(2025, 1, 1).map(|d| d.and_time(NaiveTime::MIN))
        );
        assert_eq!(to_local_date(&text("2025-01-01")), NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(to_local_time(&text("10:00:00")), NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(to_local_time(&text("10:00")), NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(to_local_time(&RowValues::Timestamp(expected)), NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(to_local_date_time(&text("not a date")), None);
        assert_eq!(to_local_date(&RowValues::Int(20250101)), None);
    }

    #[test]
    fn temporal_values_pass_through() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid");
        assert_eq!(to_local_date(&RowValues::Date(d)), Some(d));
        assert_eq!(to_local_date_time(&RowValues::Date(d)), Some(d.and_time(NaiveTime::MIN)));
        assert_eq!(from_local_date(Some(d)), RowValues::Date(d));
        assert_eq!(from_local_time(None), RowValues::Null);
        assert_eq!(from_local_date_time(None), RowValues::Null);
    }
}
