//! The execution primitive a [`Connection`](crate::Connection) delegates to.
//!
//! A driver receives final SQL text and positional parameters and returns
//! either rows or an execution summary. It knows nothing about statements or
//! tables; errors are reported as [`DriverFailure`] and enriched with the SQL
//! and parameters by the connection.

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "postgres")]
mod postgres;

#[cfg(test)]
pub(crate) mod testing;

use crate::dialect::Dialect;
use crate::record::Record;
use crate::value::Value;
use std::fmt;
use std::future::Future;

#[cfg(not(any(feature = "postgres", feature = "mysql")))]
compile_error!("sqltmpl needs at least one backend feature: `postgres` or `mysql`");

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecSummary {
    pub affected_rows: u64,
    /// Auto-increment id generated by the statement (MySQL only).
    pub last_insert_id: Option<u64>,
}

/// An error reported by the underlying database or pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverFailure {
    pub code: Option<String>,
    pub message: String,
}

impl DriverFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for DriverFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Executes resolved SQL against a pooled database resource.
pub trait Driver: Send + Sync + 'static {
    /// The dialect statements must be resolved with for this driver.
    fn dialect(&self) -> Dialect;

    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<Vec<Record>, DriverFailure>> + Send;

    /// Execute a statement and return what it changed.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<ExecSummary, DriverFailure>> + Send;

    /// Release the pooled resource. Called at most once per connection.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// A driver for whichever backend a connection URL names.
#[derive(Clone)]
pub enum AnyDriver {
    #[cfg(feature = "postgres")]
    Postgres(deadpool_postgres::Pool),
    #[cfg(feature = "mysql")]
    MySql(mysql_async::Pool),
}

impl fmt::Debug for AnyDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyDriver").field(&self.dialect()).finish()
    }
}

impl Driver for AnyDriver {
    fn dialect(&self) -> Dialect {
        match self {
            #[cfg(feature = "postgres")]
            AnyDriver::Postgres(pool) => pool.dialect(),
            #[cfg(feature = "mysql")]
            AnyDriver::MySql(pool) => pool.dialect(),
        }
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, DriverFailure> {
        match self {
            #[cfg(feature = "postgres")]
            AnyDriver::Postgres(pool) => pool.query(sql, params).await,
            #[cfg(feature = "mysql")]
            AnyDriver::MySql(pool) => pool.query(sql, params).await,
        }
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecSummary, DriverFailure> {
        match self {
            #[cfg(feature = "postgres")]
            AnyDriver::Postgres(pool) => pool.execute(sql, params).await,
            #[cfg(feature = "mysql")]
            AnyDriver::MySql(pool) => pool.execute(sql, params).await,
        }
    }

    async fn close(&self) {
        match self {
            #[cfg(feature = "postgres")]
            AnyDriver::Postgres(pool) => Driver::close(pool).await,
            #[cfg(feature = "mysql")]
            AnyDriver::MySql(pool) => Driver::close(pool).await,
        }
    }
}
