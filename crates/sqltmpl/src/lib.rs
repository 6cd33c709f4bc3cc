//! # sqltmpl
//!
//! Dialect-aware SQL templates for PostgreSQL and MySQL.
//!
//! ## Features
//!
//! - **SQL stays SQL**: statements are written as templates, not built from method chains
//! - **Injection safe**: values are always bound; identifiers are always escaped
//! - **Context-aware interpolation**: arrays become value or identifier lists, records
//!   become column/value lists or assignments, statements splice in place
//! - **One statement, many dialects**: `$n` and `"` for Postgres, `?` and `` ` `` for MySQL
//! - **Safe defaults**: UPDATE/DELETE with an empty filter is rejected unless
//!   [`Filter::AllRows`] is given
//!
//! ## Composition
//!
//! ```ignore
//! use sqltmpl::{record, sql, Dialect};
//!
//! let active = sql!("WHERE \"{}\" = {}", "status", "active")?;
//! let q = sql!("SELECT \"{}\" FROM \"{}\" {}", vec!["id", "name"], "users", active)?;
//!
//! let pg = Dialect::Postgres.resolve(&q)?;
//! assert_eq!(pg.sql, r#"SELECT "id", "name" FROM "users" WHERE "status" = $1"#);
//!
//! let my = Dialect::MySql.resolve(&q)?;
//! assert_eq!(my.sql, "SELECT `id`, `name` FROM `users` WHERE `status` = ?");
//! ```
//!
//! ## Execution
//!
//! ```ignore
//! use sqltmpl::{connect, record, sql, ConnectionConfig, Filter, Statement};
//!
//! let conn = connect(&ConnectionConfig::from_env()?)?;
//! let users = conn.table("users", Some("id"));
//!
//! users.insert(record! { "name" => "alice" }, Statement::new()).await?;
//! let alice = users.select_one(&[], sql!("WHERE \"name\" = {}", "alice")?).await?;
//! users.update_all(record! { "active" => false }, Filter::AllRows).await?;
//!
//! conn.close().await;
//! ```

pub mod config;
pub mod connection;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod pool;
pub mod prelude;
pub mod record;
pub mod registry;
pub mod statement;
pub mod table;
pub mod value;

pub use config::ConnectionConfig;
pub use connection::Connection;
pub use dialect::{Dialect, MySqlResolver, PostgresResolver, ResolvedQuery, Resolver};
pub use driver::{AnyDriver, Driver, DriverFailure, ExecSummary};
pub use error::{DbError, DbResult, DriverError};
pub use pool::connect;
pub use record::Record;
pub use registry::{ConnectionInfo, close_all, open_connections};
pub use statement::{Fragment, Statement};
pub use table::{Filter, Table};
pub use value::Value;

#[cfg(feature = "postgres")]
pub use pool::create_pg_pool;

#[cfg(feature = "mysql")]
pub use pool::create_mysql_pool;
