//! Dialect resolution: turning a [`Statement`] into final SQL and parameters.
//!
//! Each parameter is inspected together with the text around it. When the
//! emitted SQL ends in an identifier quote and the following fragment starts
//! with the same quote, the value is an identifier: the two glyphs are dropped
//! and the dialect's escaped identifier is spliced in. Otherwise the value is
//! bound through the dialect's next placeholder.

mod mysql;
mod postgres;

pub use mysql::MySqlResolver;
pub use postgres::PostgresResolver;

use crate::error::{DbError, DbResult};
use crate::statement::{IDENTIFIER_QUOTES, Statement};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final SQL text and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Placeholder syntax and identifier escaping for one backend.
pub trait Resolver: Send + Sync {
    /// Append the placeholder for the 1-based parameter `index`.
    fn write_placeholder(&self, index: usize, out: &mut String);

    /// Append `name` as a quoted, escaped identifier.
    fn write_identifier(&self, name: &str, out: &mut String);

    fn escape_identifier(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 2);
        self.write_identifier(name, &mut out);
        out
    }

    /// Flatten `statement` into SQL text and bound parameters.
    fn resolve(&self, statement: &Statement) -> DbResult<ResolvedQuery> {
        let fragments = statement.fragments();
        let parameters = statement.parameters();

        let mut sql = String::with_capacity(fragments.iter().map(String::len).sum::<usize>() + 8);
        let mut params = Vec::with_capacity(parameters.len());

        if let Some(first) = fragments.first() {
            sql.push_str(first);
        }
        for (value, next) in parameters.iter().zip(fragments.iter().skip(1)) {
            match identifier_quote(&sql, next) {
                Some(quote) => {
                    sql.pop();
                    self.write_identifier(&identifier_text(value)?, &mut sql);
                    sql.push_str(&next[quote.len_utf8()..]);
                }
                None => {
                    params.push(value.clone());
                    self.write_placeholder(params.len(), &mut sql);
                    sql.push_str(next);
                }
            }
        }

        Ok(ResolvedQuery { sql, params })
    }
}

fn identifier_quote(before: &str, after: &str) -> Option<char> {
    let quote = before.chars().next_back()?;
    (IDENTIFIER_QUOTES.contains(&quote) && after.starts_with(quote)).then_some(quote)
}

fn identifier_text(value: &Value) -> DbResult<String> {
    match value {
        Value::Null => Err(DbError::composition("NULL cannot be used as an identifier")),
        Value::Text(name) if name.is_empty() => {
            Err(DbError::composition("empty string cannot be used as an identifier"))
        }
        other => Ok(other.to_string()),
    }
}

/// Supported SQL backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    MySql,
}

impl Dialect {
    pub fn resolver(&self) -> &'static dyn Resolver {
        match self {
            Dialect::Postgres => &PostgresResolver,
            Dialect::MySql => &MySqlResolver,
        }
    }

    pub fn resolve(&self, statement: &Statement) -> DbResult<ResolvedQuery> {
        self.resolver().resolve(statement)
    }

    pub fn escape_identifier(&self, name: &str) -> String {
        self.resolver().escape_identifier(name)
    }

    /// Whether a driver error code means a unique/primary key violation.
    pub fn is_duplicate_key(&self, code: &str) -> bool {
        match self {
            // unique_violation
            Dialect::Postgres => code == "23505",
            // ER_DUP_ENTRY, ER_DUP_ENTRY_WITH_KEY_NAME
            Dialect::MySql => matches!(code, "1062" | "1586"),
        }
    }

    /// Infer the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        let (scheme, _) = url.split_once("://")?;
        match scheme.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "mysql" | "mariadb" => Some(Dialect::MySql),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
