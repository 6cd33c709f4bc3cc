//! Connection configuration.

use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use serde::Deserialize;

/// Default pool size, matching deadpool's usual small-service setting.
pub const DEFAULT_MAX_SIZE: usize = 16;

/// Default byte length SQL is truncated to in log events.
pub const DEFAULT_LOG_SQL_MAX_LENGTH: usize = 200;

/// Settings for [`connect`](crate::connect).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// Database URL; the scheme selects the dialect.
    pub url: String,
    /// Prepended to every table name handed to [`Connection::table`](crate::Connection::table).
    #[serde(default)]
    pub prefix: String,
    /// Maximum pooled connections.
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// SQL longer than this many bytes is cut in log events.
    #[serde(default = "default_log_sql_max_length")]
    pub log_sql_max_length: usize,
}

fn default_max_size() -> usize {
    DEFAULT_MAX_SIZE
}

fn default_log_sql_max_length() -> usize {
    DEFAULT_LOG_SQL_MAX_LENGTH
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            prefix: String::new(),
            max_size: DEFAULT_MAX_SIZE,
            log_sql_max_length: DEFAULT_LOG_SQL_MAX_LENGTH,
        }
    }

    /// Read `DATABASE_URL` and the optional `DATABASE_TABLE_PREFIX`.
    pub fn from_env() -> DbResult<Self> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| DbError::configuration("DATABASE_URL is not set"))?;
        let prefix = std::env::var("DATABASE_TABLE_PREFIX").unwrap_or_default();
        Ok(Self::new(url).prefix(prefix))
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn log_sql_max_length(mut self, max: usize) -> Self {
        self.log_sql_max_length = max;
        self
    }

    /// The dialect named by the URL scheme.
    pub fn dialect(&self) -> DbResult<Dialect> {
        Dialect::from_url(&self.url).ok_or_else(|| {
            DbError::Connection(format!(
                "unsupported database url scheme: {}",
                self.url.split("://").next().unwrap_or_default()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = ConnectionConfig::new("mysql://root@localhost/app")
            .prefix("app_")
            .max_size(4)
            .log_sql_max_length(64);
        assert_eq!(config.prefix, "app_");
        assert_eq!(config.max_size, 4);
        assert_eq!(config.log_sql_max_length, 64);
        assert_eq!(config.dialect().unwrap(), Dialect::MySql);
    }

    #[test]
    fn deserialize_fills_defaults() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"url": "postgres://localhost/app"}"#).unwrap();
        assert_eq!(config, ConnectionConfig::new("postgres://localhost/app"));
        assert_eq!(config.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(config.dialect().unwrap(), Dialect::Postgres);
    }

    #[test]
    fn unknown_scheme_is_a_connection_error() {
        let err = ConnectionConfig::new("sqlite://app.db").dialect().unwrap_err();
        assert!(matches!(err, DbError::Connection(ref msg) if msg.contains("sqlite")));
    }
}
