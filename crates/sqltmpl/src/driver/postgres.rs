//! PostgreSQL driver on top of `deadpool-postgres`.
//!
//! Postgres infers a type for every `$n` placeholder, and `tokio-postgres`
//! encodes parameters in binary, so [`Value`] adapts itself to the inferred
//! type instead of insisting on one Rust type per column.

use super::{Driver, DriverFailure, ExecSummary};
use crate::dialect::Dialect;
use crate::record::Record;
use crate::value::Value;
use bytes::BytesMut;
use rust_decimal::Decimal;
use std::error::Error;
use std::str::FromStr;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};

type BoxError = Box<dyn Error + Sync + Send>;

impl From<tokio_postgres::Error> for DriverFailure {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db_err) => DriverFailure::with_code(db_err.code().code(), db_err.message()),
            None => DriverFailure::new(err.to_string()),
        }
    }
}

impl From<deadpool_postgres::PoolError> for DriverFailure {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        DriverFailure::new(format!("pool: {err}"))
    }
}

fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

impl Driver for deadpool_postgres::Pool {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, DriverFailure> {
        let client = self.get().await?;
        let rows = client.query(sql, &param_refs(params)).await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecSummary, DriverFailure> {
        let client = self.get().await?;
        let affected_rows = client.execute(sql, &param_refs(params)).await?;
        Ok(ExecSummary {
            affected_rows,
            last_insert_id: None,
        })
    }

    async fn close(&self) {
        deadpool_postgres::Pool::close(self);
    }
}

fn is_text_type(ty: &Type) -> bool {
    <String as ToSql>::accepts(ty)
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => match *ty {
                Type::BOOL => v.to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 => Value::Int(i64::from(*v)).to_sql(ty, out),
                _ if is_text_type(ty) => v.to_string().to_sql(ty, out),
                _ => Err(mismatch("boolean", ty)),
            },
            Value::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                Type::INT8 => v.to_sql(ty, out),
                Type::OID => u32::try_from(*v)?.to_sql(ty, out),
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql(ty, out),
                Type::BOOL => (*v != 0).to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*v).to_sql(ty, out),
                _ if is_text_type(ty) => v.to_string().to_sql(ty, out),
                _ => Err(mismatch("integer", ty)),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => v.to_sql(ty, out),
                Type::NUMERIC => Decimal::try_from(*v)?.to_sql(ty, out),
                _ if is_text_type(ty) => v.to_string().to_sql(ty, out),
                _ => Err(mismatch("float", ty)),
            },
            Value::Text(s) => text_to_sql(s, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

fn mismatch(kind: &str, ty: &Type) -> BoxError {
    format!("cannot encode {kind} value as postgres type {ty}").into()
}

/// Text is parsed into whatever the server expects for non-text columns.
fn text_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => s.trim().parse::<i16>()?.to_sql(ty, out),
        Type::INT4 => s.trim().parse::<i32>()?.to_sql(ty, out),
        Type::INT8 => s.trim().parse::<i64>()?.to_sql(ty, out),
        Type::FLOAT4 => s.trim().parse::<f32>()?.to_sql(ty, out),
        Type::FLOAT8 => s.trim().parse::<f64>()?.to_sql(ty, out),
        Type::NUMERIC => numeric_to_sql(s.trim(), ty, out),
        Type::BOOL => match s.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "1" | "yes" | "on" => true.to_sql(ty, out),
            "f" | "false" | "0" | "no" | "off" => false.to_sql(ty, out),
            other => Err(format!("invalid boolean literal: {other}").into()),
        },
        Type::UUID => uuid::Uuid::parse_str(s.trim())?.to_sql(ty, out),
        Type::TIMESTAMPTZ => chrono::DateTime::parse_from_rfc3339(s.trim())?
            .with_timezone(&chrono::Utc)
            .to_sql(ty, out),
        Type::TIMESTAMP => parse_naive_datetime(s.trim())?.to_sql(ty, out),
        Type::DATE => chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
        _ if is_text_type(ty) => s.to_sql(ty, out),
        _ => Err(mismatch("text", ty)),
    }
}

/// Sign words Postgres uses for NUMERIC values that have no digits.
const NUMERIC_SPECIALS: [(u16, &str); 3] = [
    (0xC000, "NaN"),
    (0xD000, "Infinity"),
    (0xF000, "-Infinity"),
];

fn numeric_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if let Some((sign, _)) = NUMERIC_SPECIALS
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(s))
    {
        // ndigits, weight, sign, dscale
        for word in [0, 0, *sign, 0_u16] {
            out.extend_from_slice(&word.to_be_bytes());
        }
        return Ok(IsNull::No);
    }
    Decimal::from_str(s)?.to_sql(ty, out)
}

/// NUMERIC read as text, keeping `NaN` and the infinities `Decimal` cannot hold.
struct NumericText(String);

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let sign = raw.get(4..6).map(|w| u16::from_be_bytes([w[0], w[1]]));
        if let Some((_, name)) = NUMERIC_SPECIALS.iter().find(|(s, _)| Some(*s) == sign) {
            return Ok(Self(name.to_string()));
        }
        Decimal::from_sql(ty, raw).map(|d| Self(d.to_string()))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

fn parse_naive_datetime(s: &str) -> Result<chrono::NaiveDateTime, chrono::ParseError> {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Result<Option<T>, DriverFailure> {
    row.try_get::<_, Option<T>>(idx).map_err(|e| {
        DriverFailure::new(format!(
            "decode error on column '{}': {e}",
            row.columns()[idx].name()
        ))
    })
}

fn decode_column(row: &Row, idx: usize) -> Result<Value, DriverFailure> {
    let ty = row.columns()[idx].type_();
    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx)?.map(Value::from),
        Type::INT4 => get::<i32>(row, idx)?.map(Value::from),
        Type::INT8 => get::<i64>(row, idx)?.map(Value::Int),
        Type::OID => get::<u32>(row, idx)?.map(Value::from),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(Value::from),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(Value::Float),
        Type::NUMERIC => get::<NumericText>(row, idx)?.map(|n| Value::Text(n.0)),
        Type::UUID => get::<uuid::Uuid>(row, idx)?.map(Value::from),
        Type::TIMESTAMPTZ => get::<chrono::DateTime<chrono::Utc>>(row, idx)?.map(Value::from),
        Type::TIMESTAMP => get::<chrono::NaiveDateTime>(row, idx)?.map(Value::from),
        Type::DATE => get::<chrono::NaiveDate>(row, idx)?.map(Value::from),
        Type::JSON | Type::JSONB => {
            get::<serde_json::Value>(row, idx)?.map(|v| Value::Text(v.to_string()))
        }
        _ if <String as FromSql<'_>>::accepts(ty) => get::<String>(row, idx)?.map(Value::Text),
        _ => {
            return Err(DriverFailure::new(format!(
                "unsupported postgres type {} for column '{}'",
                ty,
                row.columns()[idx].name()
            )));
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

fn record_from_row(row: &Row) -> Result<Record, DriverFailure> {
    let mut record = Record::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        record.insert(column.name(), decode_column(row, idx)?);
    }
    Ok(record)
}
