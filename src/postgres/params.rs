use std::error::Error;

use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use rust_decimal::Decimal;
use tokio_util::bytes;

use crate::error::SqlHandleError;
use crate::types::RowValues;

/// Borrowed Postgres parameters.
pub struct Params<'a> {
    references: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> Params<'a> {
    #[must_use]
    pub fn convert(params: &'a [RowValues]) -> Params<'a> {
        Params {
            references: params.iter().map(|p| p as &(dyn ToSql + Sync)).collect(),
        }
    }

    #[must_use]
    pub fn as_refs(&self) -> &[&(dyn ToSql + Sync)] {
        &self.references
    }

    /// Owned iterator form for `query_raw`.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &(dyn ToSql + Sync)> + '_ {
        self.references.iter().copied()
    }
}

fn mismatch(value: &RowValues, ty: &Type) -> Box<dyn Error + Sync + Send> {
    Box::new(SqlHandleError::ParameterError(format!(
        "cannot bind {} value to a {ty} column",
        value.kind()
    )))
}

impl ToSql for RowValues {
    // always encode in the target column's wire format; numerics convert across int, float and numeric
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match (self, ty) {
            (RowValues::Null, _) => Ok(IsNull::Yes),
            (RowValues::Int(i), &Type::INT2) => i16::try_from(*i)?.to_sql(ty, out),
            (RowValues::Int(i), &Type::INT4) => i32::try_from(*i)?.to_sql(ty, out),
            (RowValues::Int(i), &Type::INT8) => i.to_sql(ty, out),
            (RowValues::Int(i), &Type::FLOAT4) => (*i as f32).to_sql(ty, out),
            (RowValues::Int(i), &Type::FLOAT8) => (*i as f64).to_sql(ty, out),
            (RowValues::Int(i), &Type::NUMERIC) => Decimal::from(*i).to_sql(ty, out),
            (RowValues::Float(f), &Type::FLOAT4) => (*f as f32).to_sql(ty, out),
            (RowValues::Float(f), &Type::FLOAT8) => f.to_sql(ty, out),
            (RowValues::Float(f), &Type::NUMERIC) => Decimal::try_from(*f)?.to_sql(ty, out),
            (RowValues::Decimal(d), &Type::NUMERIC) => d.to_sql(ty, out),
            (RowValues::Decimal(d), &Type::INT2 | &Type::INT4 | &Type::INT8) => {
                if !d.fract().is_zero() {
                    return Err(mismatch(self, ty));
                }
                RowValues::Int(i64::try_from(*d)?).to_sql(ty, out)
            }
            (RowValues::Decimal(d), &Type::FLOAT4) => f32::try_from(*d)?.to_sql(ty, out),
            (RowValues::Decimal(d), &Type::FLOAT8) => f64::try_from(*d)?.to_sql(ty, out),
            (RowValues::Text(s), _) if <String as ToSql>::accepts(ty) => s.to_sql(ty, out),
            (RowValues::Bool(b), &Type::BOOL) => b.to_sql(ty, out),
            (RowValues::Date(d), &Type::DATE) => d.to_sql(ty, out),
            (RowValues::Time(t), &Type::TIME) => t.to_sql(ty, out),
            (RowValues::Timestamp(dt), &Type::TIMESTAMP) => dt.to_sql(ty, out),
            // naive timestamps are taken as UTC
            (RowValues::Timestamp(dt), &Type::TIMESTAMPTZ) => dt.and_utc().to_sql(ty, out),
            (RowValues::JSON(jsval), &Type::JSON | &Type::JSONB) => jsval.to_sql(ty, out),
            (RowValues::Blob(bytes), &Type::BYTEA) => bytes.to_sql(ty, out),
            _ => Err(mismatch(self, ty)),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::NUMERIC
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::TIME
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::{DateTime, NaiveDate, Utc};
    use tokio_postgres::types::FromSql;

    use super::*;

    fn encode(value: &RowValues, ty: &Type) -> Result<bytes::BytesMut, Box<dyn Error + Sync + Send>> {
        let mut buf = bytes::BytesMut::new();
        value.to_sql_checked(ty, &mut buf)?;
        Ok(buf)
    }

    fn decode<'a, T: FromSql<'a>>(buf: &'a [u8], ty: &Type) -> T {
        T::from_sql(ty, buf).unwrap()
    }

    #[test]
    fn accepts_common_column_types() {
        for ty in [Type::INT4, Type::NUMERIC, Type::DATE, Type::TIME, Type::JSONB, Type::TIMESTAMPTZ] {
            assert!(<RowValues as ToSql>::accepts(&ty), "{ty}");
        }
        assert!(!<RowValues as ToSql>::accepts(&Type::POINT));
    }

    #[test]
    fn ints_narrow_to_the_target_width() {
        let buf = encode(&RowValues::Int(7), &Type::INT2).unwrap();
        assert_eq!(decode::<i16>(&buf, &Type::INT2), 7);
        assert!(encode(&RowValues::Int(i64::MAX), &Type::INT4).is_err());
    }

    #[test]
    fn ints_bind_to_float_and_numeric_columns() {
        let buf = encode(&RowValues::Int(1), &Type::FLOAT8).unwrap();
        assert!((decode::<f64>(&buf, &Type::FLOAT8) - 1.0).abs() < f64::EPSILON);
        let buf = encode(&RowValues::Int(3), &Type::FLOAT4).unwrap();
        assert!((decode::<f32>(&buf, &Type::FLOAT4) - 3.0).abs() < f32::EPSILON);
        let buf = encode(&RowValues::Int(-42), &Type::NUMERIC).unwrap();
        assert_eq!(decode::<Decimal>(&buf, &Type::NUMERIC), Decimal::from(-42));
    }

    #[test]
    fn floats_bind_to_numeric_columns() {
        let buf = encode(&RowValues::Float(9.99), &Type::NUMERIC).unwrap();
        let back: Decimal = decode(&buf, &Type::NUMERIC);
        assert_eq!(back.round_dp(2), Decimal::from_str("9.99").unwrap());
        assert!(encode(&RowValues::Float(f64::NAN), &Type::NUMERIC).is_err());
    }

    #[test]
    fn decimals_bind_to_integer_and_float_columns() {
        let whole = RowValues::Decimal(Decimal::from(12));
        let buf = encode(&whole, &Type::INT4).unwrap();
        assert_eq!(decode::<i32>(&buf, &Type::INT4), 12);
        let buf = encode(&whole, &Type::INT8).unwrap();
        assert_eq!(decode::<i64>(&buf, &Type::INT8), 12);

        let price = RowValues::Decimal(Decimal::from_str("12.50").unwrap());
        let buf = encode(&price, &Type::FLOAT8).unwrap();
        assert!((decode::<f64>(&buf, &Type::FLOAT8) - 12.5).abs() < f64::EPSILON);
        assert!(encode(&price, &Type::INT8).is_err());
    }

    #[test]
    fn mismatched_kinds_are_rejected_with_the_value_kind() {
        let err = encode(&RowValues::from("2024-01-01"), &Type::DATE).unwrap_err();
        assert!(err.to_string().contains("text"), "{err}");
        assert!(encode(&RowValues::from("1.5"), &Type::NUMERIC).is_err());
        assert!(encode(&RowValues::Bool(true), &Type::INT4).is_err());
        assert!(encode(&RowValues::Int(1), &Type::TEXT).is_err());
    }

    #[test]
    fn timestamps_bind_to_timestamptz_as_utc() {
        let naive = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        let buf = encode(&RowValues::Timestamp(naive), &Type::TIMESTAMPTZ).unwrap();
        let back: DateTime<Utc> = decode(&buf, &Type::TIMESTAMPTZ);
        assert_eq!(back.naive_utc(), naive);
    }

    #[test]
    fn null_binds_as_null() {
        let mut buf = bytes::BytesMut::new();
        assert!(matches!(
            RowValues::Null.to_sql(&Type::TEXT, &mut buf).unwrap(),
            IsNull::Yes
        ));
    }
}
