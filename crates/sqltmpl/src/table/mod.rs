//! Common statements for one table, composed over a [`Connection`].
//!
//! Identifiers are always written inside `"` in the composed statement and
//! re-quoted by the connection's dialect when resolved.

#[cfg(test)]
mod tests;

use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::driver::{AnyDriver, Driver, ExecSummary};
use crate::error::{DbError, DbResult};
use crate::record::Record;
use crate::sql;
use crate::statement::{Fragment, Statement};
use crate::value::Value;
use serde::de::DeserializeOwned;
use std::fmt;

/// Which rows a mutating operation touches.
///
/// An empty WHERE clause is rejected; affecting every row must be asked for
/// with [`Filter::AllRows`].
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Rows matched by a clause such as `WHERE "id" = {}`.
    Where(Statement),
    /// Every row in the table.
    AllRows,
}

impl From<Statement> for Filter {
    fn from(clause: Statement) -> Self {
        Filter::Where(clause)
    }
}

impl Filter {
    fn into_clause(self) -> DbResult<Statement> {
        match self {
            Filter::Where(clause) if clause.is_blank() => Err(DbError::configuration(
                "empty filter clause; use Filter::AllRows to affect every row",
            )),
            Filter::Where(clause) => Ok(clause),
            Filter::AllRows => Ok(Statement::new()),
        }
    }
}

/// A table on a connection, named `prefix + name`.
pub struct Table<D: Driver = AnyDriver> {
    connection: Connection<D>,
    name: String,
    primary_key: Option<String>,
}

impl<D: Driver> Clone for Table<D> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            name: self.name.clone(),
            primary_key: self.primary_key.clone(),
        }
    }
}

impl<D: Driver> fmt::Debug for Table<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("primary_key", &self.primary_key)
            .field("connection", &self.connection)
            .finish()
    }
}

impl<D: Driver> Table<D> {
    pub fn new(connection: Connection<D>, name: &str, primary_key: Option<&str>) -> Self {
        let name = format!("{}{}", connection.prefix(), name);
        Self {
            connection,
            name,
            primary_key: primary_key.map(str::to_string),
        }
    }

    /// Full table name, prefix included.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    pub fn connection(&self) -> &Connection<D> {
        &self.connection
    }

    fn dialect(&self) -> Dialect {
        self.connection.dialect()
    }

    fn require_primary_key(&self, operation: &str) -> DbResult<&str> {
        self.primary_key.as_deref().ok_or_else(|| {
            DbError::configuration(format!(
                "{operation} on table `{}` requires a primary key",
                self.name
            ))
        })
    }

    fn key_clause(&self, operation: &str, key: Value) -> DbResult<Statement> {
        let pk = self.require_primary_key(operation)?;
        sql!("WHERE \"{}\" = {}", pk, key)
    }

    // ==================== SELECT ====================

    /// `SELECT <columns | *> FROM "<table>" <clause>`
    pub async fn select_all(&self, columns: &[&str], clause: Statement) -> DbResult<Vec<Record>> {
        let statement = self.select_statement(columns, clause)?;
        self.connection.query(&statement).await
    }

    /// Like [`select_all`](Self::select_all) with `LIMIT 1`.
    pub async fn select_one(&self, columns: &[&str], clause: Statement) -> DbResult<Option<Record>> {
        let mut statement = self.select_statement(columns, clause)?;
        statement.append_raw(" LIMIT 1");
        self.connection.query_one(&statement).await
    }

    fn select_statement(&self, columns: &[&str], clause: Statement) -> DbResult<Statement> {
        let mut statement = if columns.is_empty() {
            sql!("SELECT * FROM \"{}\"", self.name.as_str())?
        } else {
            sql!(
                "SELECT \"{}\" FROM \"{}\"",
                columns.to_vec(),
                self.name.as_str()
            )?
        };
        append_clause(&mut statement, clause)?;
        Ok(statement)
    }

    /// `SELECT <expr> AS result FROM "<table>" LIMIT 1`, returning `result`.
    pub async fn eval(&self, expr: Statement) -> DbResult<Option<Value>> {
        let statement = sql!(
            "SELECT {} AS result FROM \"{}\" LIMIT 1",
            expr,
            self.name.as_str()
        )?;
        Ok(self
            .connection
            .query_one(&statement)
            .await?
            .and_then(|mut row| row.remove("result")))
    }

    pub async fn eval_as<T: DeserializeOwned>(&self, expr: Statement) -> DbResult<Option<T>> {
        match self.eval(expr).await? {
            Some(value) => serde_json::from_value(value.to_json())
                .map(Some)
                .map_err(|e| DbError::decode("result", e.to_string())),
            None => Ok(None),
        }
    }

    // ==================== UPDATE / DELETE ====================

    /// `UPDATE "<table>" SET <row> <clause>`
    pub async fn update_all(&self, row: Record, filter: impl Into<Filter>) -> DbResult<ExecSummary> {
        let clause = filter.into().into_clause()?;
        let mut statement = sql!("UPDATE \"{}\" SET {}", self.name.as_str(), row)?;
        append_clause(&mut statement, clause)?;
        self.connection.query_exec(&statement).await
    }

    /// Update at most one matching row.
    pub async fn update_one(&self, row: Record, filter: impl Into<Filter>) -> DbResult<ExecSummary> {
        let clause = filter.into().into_clause()?;
        let mut statement = sql!("UPDATE \"{}\" SET {}", self.name.as_str(), row)?;
        self.append_single_row(&mut statement, clause)?;
        self.connection.query_exec(&statement).await
    }

    /// `DELETE FROM "<table>" <clause>`
    pub async fn delete_all(&self, filter: impl Into<Filter>) -> DbResult<ExecSummary> {
        let clause = filter.into().into_clause()?;
        let mut statement = sql!("DELETE FROM \"{}\"", self.name.as_str())?;
        append_clause(&mut statement, clause)?;
        self.connection.query_exec(&statement).await
    }

    /// Delete at most one matching row.
    pub async fn delete_one(&self, filter: impl Into<Filter>) -> DbResult<ExecSummary> {
        let clause = filter.into().into_clause()?;
        let mut statement = sql!("DELETE FROM \"{}\"", self.name.as_str())?;
        self.append_single_row(&mut statement, clause)?;
        self.connection.query_exec(&statement).await
    }

    /// MySQL limits UPDATE/DELETE directly; Postgres narrows by `ctid`.
    fn append_single_row(&self, statement: &mut Statement, clause: Statement) -> DbResult<()> {
        match self.dialect() {
            Dialect::MySql => {
                append_clause(statement, clause)?;
                statement.append_raw(" LIMIT 1");
            }
            Dialect::Postgres => {
                let mut inner = sql!("SELECT ctid FROM \"{}\"", self.name.as_str())?;
                append_clause(&mut inner, clause)?;
                inner.append_raw(" LIMIT 1");
                statement.append(sql!(" WHERE ctid = ({})", inner)?)?;
            }
        }
        Ok(())
    }

    // ==================== INSERT ====================

    /// `INSERT INTO "<table>" (<cols>) VALUES (<vals>) <extra>`
    pub async fn insert(&self, row: Record, extra: Statement) -> DbResult<ExecSummary> {
        let mut statement = sql!("INSERT INTO \"{}\" ({})", self.name.as_str(), row)?;
        append_clause(&mut statement, extra)?;
        self.connection.query_exec(&statement).await
    }

    /// Insert, silently skipping rows that collide with a unique key.
    ///
    /// Postgres has no `INSERT IGNORE`; `ON CONFLICT DO NOTHING` is emitted
    /// before `extra`.
    pub async fn insert_ignore(&self, row: Record, extra: Statement) -> DbResult<ExecSummary> {
        let statement = match self.dialect() {
            Dialect::MySql => {
                let mut statement =
                    sql!("INSERT IGNORE INTO \"{}\" ({})", self.name.as_str(), row)?;
                append_clause(&mut statement, extra)?;
                statement
            }
            Dialect::Postgres => {
                let mut statement = sql!(
                    "INSERT INTO \"{}\" ({}) ON CONFLICT DO NOTHING",
                    self.name.as_str(),
                    row
                )?;
                append_clause(&mut statement, extra)?;
                statement
            }
        };
        self.connection.query_exec(&statement).await
    }

    /// Insert, returning `None` instead of failing on a duplicate key.
    pub async fn try_insert(&self, row: Record, extra: Statement) -> DbResult<Option<ExecSummary>> {
        match self.insert(row, extra).await {
            Ok(summary) => Ok(Some(summary)),
            Err(err) if err.is_duplicate_key() => {
                tracing::debug!(
                    target: "sqltmpl",
                    table = %self.name,
                    code = err.code().unwrap_or_default(),
                    "duplicate key ignored"
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Insert `row`, or apply `update` (defaults to `row`) to the existing one.
    pub async fn upsert(
        &self,
        row: Record,
        update: Option<Record>,
        extra: Statement,
    ) -> DbResult<ExecSummary> {
        let update = update.unwrap_or_else(|| row.clone());
        let statement = self.upsert_statement(row, update, extra, "upsert")?;
        self.connection.query_exec(&statement).await
    }

    /// Insert `row`, overwriting any existing row with the same key.
    pub async fn replace(&self, row: Record, extra: Statement) -> DbResult<ExecSummary> {
        let statement = match self.dialect() {
            Dialect::MySql => {
                let mut statement = sql!("REPLACE INTO \"{}\" ({})", self.name.as_str(), row)?;
                append_clause(&mut statement, extra)?;
                statement
            }
            Dialect::Postgres => {
                let update = row.clone();
                self.upsert_statement(row, update, extra, "replace")?
            }
        };
        self.connection.query_exec(&statement).await
    }

    fn upsert_statement(
        &self,
        row: Record,
        update: Record,
        extra: Statement,
        operation: &str,
    ) -> DbResult<Statement> {
        let mut statement = match self.dialect() {
            Dialect::Postgres => {
                let pk = self.require_primary_key(operation)?;
                sql!(
                    "INSERT INTO \"{}\" ({}) ON CONFLICT (\"{}\") DO UPDATE SET {}",
                    self.name.as_str(),
                    row,
                    pk,
                    update
                )?
            }
            Dialect::MySql => sql!(
                "INSERT INTO \"{}\" ({}) ON DUPLICATE KEY UPDATE {}",
                self.name.as_str(),
                row,
                Statement::assignment_list(update)?
            )?,
        };
        append_clause(&mut statement, extra)?;
        Ok(statement)
    }

    // ==================== By primary key ====================

    /// Fetch the row whose primary key equals `key`.
    pub async fn get(&self, key: impl Into<Value>, columns: &[&str]) -> DbResult<Option<Record>> {
        let clause = self.key_clause("get", key.into())?;
        self.select_one(columns, clause).await
    }

    pub async fn delete(&self, key: impl Into<Value>) -> DbResult<ExecSummary> {
        let clause = self.key_clause("delete", key.into())?;
        self.delete_all(clause).await
    }

    pub async fn update(&self, key: impl Into<Value>, row: Record) -> DbResult<ExecSummary> {
        let clause = self.key_clause("update", key.into())?;
        self.update_all(row, clause).await
    }
}

/// Append a non-blank clause, separated by a space unless it brings its own.
fn append_clause(statement: &mut Statement, clause: Statement) -> DbResult<()> {
    if clause.is_blank() {
        return Ok(());
    }
    let spaced = clause
        .fragments()
        .first()
        .is_some_and(|text| text.starts_with(char::is_whitespace));
    if !spaced {
        statement.append_raw(" ");
    }
    statement.append(Fragment::from(clause))?;
    Ok(())
}
