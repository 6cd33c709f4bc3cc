//! Error types for sqltmpl

use crate::value::Value;
use std::fmt;
use thiserror::Error;

/// Result type alias for sqltmpl operations
pub type DbResult<T> = Result<T, DbError>;

/// A failed round trip to the database, with enough context to diagnose it
/// without re-running the query.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverError {
    /// Human-readable message reported by the driver.
    pub message: String,
    /// Backend error code (SQLSTATE on Postgres, numeric error on MySQL).
    pub code: Option<String>,
    /// Resolved SQL text that was sent.
    pub sql: String,
    /// Bound parameters, in placeholder order.
    pub params: Vec<Value>,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message)?,
            None => f.write_str(&self.message)?,
        }
        write!(f, " (sql: {}; params: [", self.sql)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param:?}")?;
        }
        f.write_str("])")
    }
}

/// Error types for composing and executing statements
#[derive(Debug, Error)]
pub enum DbError {
    /// A statement could not be composed from its fragments
    #[error("Composition error: {0}")]
    Composition(String),

    /// A table or connection is missing something the operation needs
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Query execution failed
    #[error("Driver error: {0}")]
    Driver(Box<DriverError>),

    /// Unique or primary key constraint violation
    #[error("Duplicate key: {0}")]
    DuplicateKey(Box<DriverError>),

    /// Connection could not be established or configured
    #[error("Connection error: {0}")]
    Connection(String),

    /// The connection has been closed
    #[error("Connection is closed")]
    Closed,

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DbError {
    /// Create a composition error
    pub fn composition(message: impl Into<String>) -> Self {
        Self::Composition(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is a duplicate key error
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey(_))
    }

    /// Check if this is a composition error
    pub fn is_composition(&self) -> bool {
        matches!(self, Self::Composition(_))
    }

    /// Check if this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// The execution context of a driver failure, duplicate keys included.
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Driver(err) | Self::DuplicateKey(err) => Some(err),
            _ => None,
        }
    }

    /// Backend error code of a driver failure, if any.
    pub fn code(&self) -> Option<&str> {
        self.driver_error().and_then(|err| err.code.as_deref())
    }
}
