//! Process-wide set of open connections.
//!
//! Every [`Connection`](crate::Connection) registers itself when it is
//! created and is removed when it is closed. [`close_all`] is meant for
//! process shutdown.

use crate::dialect::Dialect;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

static REGISTRY: LazyLock<Mutex<HashMap<u64, Arc<dyn Tracked>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// A registered connection, as seen from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: u64,
    pub dialect: Dialect,
    pub prefix: String,
}

pub(crate) trait Tracked: Send + Sync {
    fn info(&self) -> ConnectionInfo;

    fn shutdown(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

fn registry() -> MutexGuard<'static, HashMap<u64, Arc<dyn Tracked>>> {
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn register(id: u64, connection: Arc<dyn Tracked>) {
    registry().insert(id, connection);
}

pub(crate) fn unregister(id: u64) {
    registry().remove(&id);
}

/// Connections that have been opened and not yet closed, ordered by id.
pub fn open_connections() -> Vec<ConnectionInfo> {
    let mut open: Vec<ConnectionInfo> = registry().values().map(|c| c.info()).collect();
    open.sort_by_key(|info| info.id);
    open
}

/// Close every open connection. Returns how many were closed.
pub async fn close_all() -> usize {
    let drained: Vec<Arc<dyn Tracked>> = registry().drain().map(|(_, c)| c).collect();
    let count = drained.len();
    for connection in drained {
        connection.shutdown().await;
    }
    if count > 0 {
        tracing::info!(target: "sqltmpl", count, "closed all open connections");
    }
    count
}
