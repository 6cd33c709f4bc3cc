//! Convenient imports for typical `sqltmpl` usage.
//!
//! ```ignore
//! use sqltmpl::prelude::*;
//! ```

pub use crate::{
    Connection, ConnectionConfig, DbError, DbResult, Dialect, Filter, Fragment, Record, Statement,
    Table, Value, connect, record, sql,
};
