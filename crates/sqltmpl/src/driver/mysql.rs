//! MySQL driver on top of `mysql_async`.

use super::{Driver, DriverFailure, ExecSummary};
use crate::dialect::Dialect;
use crate::record::Record;
use crate::value::Value;
use mysql_async::prelude::Queryable;
use mysql_async::{Params, Row};

impl From<mysql_async::Error> for DriverFailure {
    fn from(err: mysql_async::Error) -> Self {
        match err {
            mysql_async::Error::Server(server) => {
                DriverFailure::with_code(server.code.to_string(), server.message)
            }
            other => DriverFailure::new(other.to_string()),
        }
    }
}

fn to_params(params: &[Value]) -> Params {
    if params.is_empty() {
        return Params::Empty;
    }
    Params::Positional(params.iter().map(to_mysql_value).collect())
}

fn to_mysql_value(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(v) => mysql_async::Value::Int(i64::from(*v)),
        Value::Int(v) => mysql_async::Value::Int(*v),
        Value::Float(v) => mysql_async::Value::Double(*v),
        Value::Text(v) => mysql_async::Value::Bytes(v.clone().into_bytes()),
    }
}

fn from_mysql_value(column: &str, value: &mysql_async::Value) -> Result<Value, DriverFailure> {
    use mysql_async::Value as My;

    let value = match value {
        My::NULL => Value::Null,
        My::Int(v) => Value::Int(*v),
        My::UInt(v) => i64::try_from(*v)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Text(v.to_string())),
        My::Float(v) => Value::Float(f64::from(*v)),
        My::Double(v) => Value::Float(*v),
        My::Bytes(bytes) => String::from_utf8(bytes.clone()).map(Value::Text).map_err(|e| {
            DriverFailure::new(format!("decode error on column '{column}': {e}"))
        })?,
        My::Date(year, month, day, hour, minute, second, micros) => {
            let mut text = format!("{year:04}-{month:02}-{day:02}");
            if (*hour, *minute, *second, *micros) != (0, 0, 0, 0) {
                text.push_str(&format!(" {hour:02}:{minute:02}:{second:02}"));
                if *micros > 0 {
                    text.push_str(&format!(".{micros:06}"));
                }
            }
            Value::Text(text)
        }
        My::Time(negative, days, hours, minutes, seconds, micros) => {
            let total_hours = u64::from(*days) * 24 + u64::from(*hours);
            let sign = if *negative { "-" } else { "" };
            let mut text = format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}");
            if *micros > 0 {
                text.push_str(&format!(".{micros:06}"));
            }
            Value::Text(text)
        }
    };
    Ok(value)
}

fn record_from_row(row: &Row) -> Result<Record, DriverFailure> {
    let columns = row.columns();
    let mut record = Record::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        let name = column.name_str();
        let value = match row.as_ref(idx) {
            Some(value) => from_mysql_value(&name, value)?,
            None => Value::Null,
        };
        record.insert(name.into_owned(), value);
    }
    Ok(record)
}

impl Driver for mysql_async::Pool {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, DriverFailure> {
        let mut conn = self.get_conn().await?;
        let rows: Vec<Row> = conn.exec(sql, to_params(params)).await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecSummary, DriverFailure> {
        let mut conn = self.get_conn().await?;
        conn.exec_drop(sql, to_params(params)).await?;
        Ok(ExecSummary {
            affected_rows: conn.affected_rows(),
            last_insert_id: conn.last_insert_id(),
        })
    }

    async fn close(&self) {
        if let Err(err) = self.clone().disconnect().await {
            tracing::warn!(target: "sqltmpl", error = %err, "mysql pool did not disconnect cleanly");
        }
    }
}
