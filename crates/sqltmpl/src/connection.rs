//! Executing statements through a driver.

use crate::config::DEFAULT_LOG_SQL_MAX_LENGTH;
use crate::dialect::{Dialect, ResolvedQuery};
use crate::driver::{AnyDriver, Driver, DriverFailure, ExecSummary};
use crate::error::{DbError, DbResult, DriverError};
use crate::record::Record;
use crate::registry::{self, ConnectionInfo, Tracked};
use crate::statement::{Fragment, Statement};
use crate::table::Table;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A pooled database handle that resolves statements for its dialect.
///
/// Cloning is cheap and shares the same pool. The connection stays open, and
/// listed in [`registry::open_connections`], until [`close`](Self::close) or
/// [`registry::close_all`] is called.
pub struct Connection<D: Driver = AnyDriver> {
    inner: Arc<Inner<D>>,
}

struct Inner<D> {
    id: u64,
    driver: D,
    dialect: Dialect,
    prefix: String,
    log_sql_max_length: usize,
    closed: AtomicBool,
}

impl<D: Driver> Inner<D> {
    async fn close_once(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        registry::unregister(self.id);
        self.driver.close().await;
        tracing::debug!(target: "sqltmpl", id = self.id, dialect = %self.dialect, "connection closed");
        true
    }
}

impl<D: Driver> Tracked for Inner<D> {
    fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            dialect: self.dialect,
            prefix: self.prefix.clone(),
        }
    }

    fn shutdown(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.close_once().await;
        })
    }
}

impl<D: Driver> Clone for Connection<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Driver> fmt::Debug for Connection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("dialect", &self.inner.dialect)
            .field("prefix", &self.inner.prefix)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<D: Driver> Connection<D> {
    /// Wrap `driver`; `prefix` is prepended to table names.
    pub fn new(driver: D, prefix: impl Into<String>) -> Self {
        Self::with_log_sql_max_length(driver, prefix, DEFAULT_LOG_SQL_MAX_LENGTH)
    }

    pub fn with_log_sql_max_length(
        driver: D,
        prefix: impl Into<String>,
        log_sql_max_length: usize,
    ) -> Self {
        let inner = Arc::new(Inner {
            id: registry::next_id(),
            dialect: driver.dialect(),
            driver,
            prefix: prefix.into(),
            log_sql_max_length,
            closed: AtomicBool::new(false),
        });
        registry::register(inner.id, inner.clone());
        tracing::info!(
            target: "sqltmpl",
            id = inner.id,
            dialect = %inner.dialect,
            prefix = %inner.prefix,
            "connection opened"
        );
        Self { inner }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    pub fn driver(&self) -> &D {
        &self.inner.driver
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// A table helper for `prefix + name`.
    pub fn table(&self, name: &str, primary_key: Option<&str>) -> Table<D> {
        Table::new(self.clone(), name, primary_key)
    }

    /// Resolve `statement` for this connection's dialect without running it.
    pub fn resolve(&self, statement: &Statement) -> DbResult<ResolvedQuery> {
        self.inner.dialect.resolve(statement)
    }

    /// Run `statement` and return every row.
    pub async fn query(&self, statement: &Statement) -> DbResult<Vec<Record>> {
        let resolved = self.prepare(statement)?;
        match self.inner.driver.query(&resolved.sql, &resolved.params).await {
            Ok(rows) => Ok(rows),
            Err(failure) => Err(self.fail(resolved, failure)),
        }
    }

    pub async fn query_template(
        &self,
        template: &str,
        values: Vec<Fragment>,
    ) -> DbResult<Vec<Record>> {
        self.query(&Statement::template(template, values)?).await
    }

    /// Run `statement` and return the first row, if any.
    pub async fn query_one(&self, statement: &Statement) -> DbResult<Option<Record>> {
        Ok(self.query(statement).await?.into_iter().next())
    }

    pub async fn query_one_template(
        &self,
        template: &str,
        values: Vec<Fragment>,
    ) -> DbResult<Option<Record>> {
        self.query_one(&Statement::template(template, values)?).await
    }

    /// Run a statement that returns no rows.
    pub async fn query_exec(&self, statement: &Statement) -> DbResult<ExecSummary> {
        let resolved = self.prepare(statement)?;
        match self.inner.driver.execute(&resolved.sql, &resolved.params).await {
            Ok(summary) => Ok(summary),
            Err(failure) => Err(self.fail(resolved, failure)),
        }
    }

    pub async fn query_exec_template(
        &self,
        template: &str,
        values: Vec<Fragment>,
    ) -> DbResult<ExecSummary> {
        self.query_exec(&Statement::template(template, values)?).await
    }

    /// Run `statement` and deserialize every row into `T`.
    pub async fn query_as<T: DeserializeOwned>(&self, statement: &Statement) -> DbResult<Vec<T>> {
        self.query(statement)
            .await?
            .iter()
            .map(Record::deserialize)
            .collect()
    }

    pub async fn query_one_as<T: DeserializeOwned>(
        &self,
        statement: &Statement,
    ) -> DbResult<Option<T>> {
        self.query_one(statement)
            .await?
            .map(|row| row.deserialize())
            .transpose()
    }

    /// Release the driver and leave the registry. Later calls do nothing.
    pub async fn close(&self) {
        self.inner.close_once().await;
    }

    fn prepare(&self, statement: &Statement) -> DbResult<ResolvedQuery> {
        if self.is_closed() {
            return Err(DbError::Closed);
        }
        let resolved = self.inner.dialect.resolve(statement)?;

        let shown = truncate_sql_bytes(&resolved.sql, self.inner.log_sql_max_length);
        tracing::debug!(
            target: "sqltmpl.sql",
            dialect = %self.inner.dialect,
            param_count = resolved.params.len(),
            truncated = (shown.len() < resolved.sql.len()),
            sql = %shown,
            "executing"
        );
        Ok(resolved)
    }

    fn fail(&self, resolved: ResolvedQuery, failure: DriverFailure) -> DbError {
        tracing::warn!(
            target: "sqltmpl.sql",
            dialect = %self.inner.dialect,
            code = failure.code.as_deref().unwrap_or_default(),
            error = %failure.message,
            "statement failed"
        );

        let duplicate = failure
            .code
            .as_deref()
            .is_some_and(|code| self.inner.dialect.is_duplicate_key(code));
        let err = Box::new(DriverError {
            message: failure.message,
            code: failure.code,
            sql: resolved.sql,
            params: resolved.params,
        });
        if duplicate {
            DbError::DuplicateKey(err)
        } else {
            DbError::Driver(err)
        }
    }
}

/// Cut `sql` to at most `max_bytes`, backing off to a char boundary.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::RecordingDriver;
    use crate::value::Value;
    use crate::{record, sql};
    use serde::Deserialize;

    fn connection(dialect: Dialect) -> (Connection<RecordingDriver>, RecordingDriver) {
        let driver = RecordingDriver::new(dialect);
        (Connection::new(driver.clone(), ""), driver)
    }

    #[tokio::test]
    async fn query_sends_resolved_sql() {
        let (conn, driver) = connection(Dialect::MySql);
        driver.push_rows(vec![record! { "id" => 1 }]);

        let q = sql!("SELECT * FROM `{}` WHERE id = {}", "users", 1).unwrap();
        let rows = conn.query(&q).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(
            driver.calls(),
            vec![("SELECT * FROM `users` WHERE id = ?".to_string(), vec![Value::Int(1)])]
        );
    }

    #[tokio::test]
    async fn template_variants_compose_first() {
        let (conn, driver) = connection(Dialect::Postgres);
        conn.query_exec_template("DELETE FROM \"{}\" WHERE id = {}", vec!["t".into(), 3.into()])
            .await
            .unwrap();
        assert_eq!(driver.last_sql(), r#"DELETE FROM "t" WHERE id = $1"#);

        let err = conn
            .query_template("SELECT {}", vec![])
            .await
            .unwrap_err();
        assert!(err.is_composition());
        assert_eq!(driver.calls().len(), 1);
    }

    #[tokio::test]
    async fn query_one_takes_first_row() {
        let (conn, driver) = connection(Dialect::Postgres);
        driver.push_rows(vec![record! { "n" => 1 }, record! { "n" => 2 }]);
        let row = conn.query_one(&Statement::raw("SELECT n FROM t")).await.unwrap();
        assert_eq!(row.unwrap().get("n"), Some(&Value::Int(1)));

        let none = conn.query_one(&Statement::raw("SELECT n FROM t")).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn query_as_deserializes_rows() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct User {
            id: i64,
            name: String,
        }

        let (conn, driver) = connection(Dialect::Postgres);
        driver.push_rows(vec![record! { "id" => 7, "name" => "ada" }]);
        let users: Vec<User> = conn.query_as(&Statement::raw("SELECT id, name FROM users")).await.unwrap();
        assert_eq!(
            users,
            vec![User {
                id: 7,
                name: "ada".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn failures_carry_sql_and_params() {
        let (conn, driver) = connection(Dialect::Postgres);
        driver.push_failure(DriverFailure::with_code("42601", "syntax error"));

        let err = conn
            .query_exec(&sql!("UPDATE t SET a = {}", 5).unwrap())
            .await
            .unwrap_err();
        assert!(!err.is_duplicate_key());
        let detail = err.driver_error().unwrap();
        assert_eq!(detail.sql, "UPDATE t SET a = $1");
        assert_eq!(detail.params, vec![Value::Int(5)]);
        assert_eq!(err.code(), Some("42601"));
    }

    #[tokio::test]
    async fn duplicate_key_is_classified_by_dialect() {
        let (pg, pg_driver) = connection(Dialect::Postgres);
        pg_driver.push_failure(DriverFailure::with_code("23505", "duplicate key value"));
        let err = pg.query_exec(&Statement::raw("INSERT")).await.unwrap_err();
        assert!(err.is_duplicate_key());

        let (my, my_driver) = connection(Dialect::MySql);
        my_driver.push_failure(DriverFailure::with_code("23505", "not a mysql code"));
        let err = my.query_exec(&Statement::raw("INSERT")).await.unwrap_err();
        assert!(!err.is_duplicate_key());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_final() {
        let (conn, driver) = connection(Dialect::MySql);
        let id = conn.id();
        assert!(registry::open_connections().iter().any(|info| info.id == id));

        conn.close().await;
        conn.clone().close().await;

        assert_eq!(driver.close_count(), 1);
        assert!(conn.is_closed());
        assert!(!registry::open_connections().iter().any(|info| info.id == id));

        let err = conn.query(&Statement::raw("SELECT 1")).await.unwrap_err();
        assert!(matches!(err, DbError::Closed));
        assert!(driver.calls().is_empty());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_sql_bytes("SELECT 1", 200), "SELECT 1");
        assert_eq!(truncate_sql_bytes("SELECT 1", 6), "SELECT");
        // 'é' is two bytes starting at index 1.
        assert_eq!(truncate_sql_bytes("aé", 2), "a");
    }
}
