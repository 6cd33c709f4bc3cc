//! Connection pool utilities

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::driver::AnyDriver;
use crate::error::{DbError, DbResult};

/// Build the pool a config's URL names and wrap it in a [`Connection`].
///
/// No network round trip happens here; the first query opens a socket.
/// With the `mysql` feature, this must run inside a tokio runtime.
///
/// # Example
///
/// ```ignore
/// let conn = sqltmpl::connect(&ConnectionConfig::from_env()?)?;
/// let users = conn.table("users", Some("id"));
/// ```
pub fn connect(config: &ConnectionConfig) -> DbResult<Connection> {
    let driver = match config.dialect()? {
        Dialect::Postgres => postgres_driver(config)?,
        Dialect::MySql => mysql_driver(config)?,
    };
    Ok(Connection::with_log_sql_max_length(
        driver,
        config.prefix.clone(),
        config.log_sql_max_length,
    ))
}

#[cfg(feature = "postgres")]
fn postgres_driver(config: &ConnectionConfig) -> DbResult<AnyDriver> {
    create_pg_pool(&config.url, config.max_size).map(AnyDriver::Postgres)
}

#[cfg(not(feature = "postgres"))]
fn postgres_driver(_config: &ConnectionConfig) -> DbResult<AnyDriver> {
    Err(DbError::configuration(
        "postgres url given but the `postgres` feature is disabled",
    ))
}

#[cfg(feature = "mysql")]
fn mysql_driver(config: &ConnectionConfig) -> DbResult<AnyDriver> {
    create_mysql_pool(&config.url, config.max_size).map(AnyDriver::MySql)
}

#[cfg(not(feature = "mysql"))]
fn mysql_driver(_config: &ConnectionConfig) -> DbResult<AnyDriver> {
    Err(DbError::configuration(
        "mysql url given but the `mysql` feature is disabled",
    ))
}

/// Create a Postgres pool with at most `max_size` connections.
#[cfg(feature = "postgres")]
pub fn create_pg_pool(database_url: &str, max_size: usize) -> DbResult<deadpool_postgres::Pool> {
    use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
    use tokio_postgres::NoTls;

    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| DbError::Connection(e.to_string()))?;

    let manager_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let mgr = Manager::from_config(pg_config, NoTls, manager_config);
    Pool::builder(mgr)
        .max_size(max_size)
        .build()
        .map_err(|e| DbError::Connection(e.to_string()))
}

/// Create a MySQL pool with at most `max_size` connections.
#[cfg(feature = "mysql")]
pub fn create_mysql_pool(database_url: &str, max_size: usize) -> DbResult<mysql_async::Pool> {
    use mysql_async::{Opts, OptsBuilder, PoolConstraints, PoolOpts};

    let opts = Opts::from_url(&mysql_scheme(database_url))
        .map_err(|e| DbError::Connection(e.to_string()))?;
    let constraints = PoolConstraints::new(0, max_size).ok_or_else(|| {
        DbError::configuration(format!("invalid mysql pool size: {max_size}"))
    })?;
    let builder = OptsBuilder::from_opts(opts)
        .pool_opts(PoolOpts::default().with_constraints(constraints));
    Ok(mysql_async::Pool::new(builder))
}

/// `mysql_async` only accepts the `mysql://` scheme.
#[cfg(feature = "mysql")]
fn mysql_scheme(url: &str) -> String {
    match url.split_once("://") {
        Some((_, rest)) => format!("mysql://{rest}"),
        None => url.to_string(),
    }
}
