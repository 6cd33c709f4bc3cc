//! An in-memory driver that records what it was asked to run.

use super::{Driver, DriverFailure, ExecSummary};
use crate::dialect::Dialect;
use crate::record::Record;
use crate::value::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

enum Response {
    Rows(Vec<Record>),
    Summary(ExecSummary),
    Fail(DriverFailure),
}

struct Shared {
    dialect: Dialect,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    responses: Mutex<VecDeque<Response>>,
    closes: AtomicUsize,
}

/// Answers queued responses in order; an empty queue answers with no rows
/// or zero affected rows.
#[derive(Clone)]
pub(crate) struct RecordingDriver {
    shared: Arc<Shared>,
}

impl RecordingDriver {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            shared: Arc::new(Shared {
                dialect,
                calls: Mutex::new(Vec::new()),
                responses: Mutex::new(VecDeque::new()),
                closes: AtomicUsize::new(0),
            }),
        }
    }

    pub(crate) fn push_rows(&self, rows: Vec<Record>) -> &Self {
        self.push(Response::Rows(rows))
    }

    pub(crate) fn push_summary(&self, affected_rows: u64) -> &Self {
        self.push(Response::Summary(ExecSummary {
            affected_rows,
            last_insert_id: None,
        }))
    }

    pub(crate) fn push_failure(&self, failure: DriverFailure) -> &Self {
        self.push(Response::Fail(failure))
    }

    /// Every `(sql, params)` pair received so far.
    pub(crate) fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.shared.calls.lock().unwrap().clone()
    }

    pub(crate) fn last_sql(&self) -> String {
        self.calls().last().map(|(sql, _)| sql.clone()).unwrap_or_default()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    fn push(&self, response: Response) -> &Self {
        self.shared.responses.lock().unwrap().push_back(response);
        self
    }

    fn record(&self, sql: &str, params: &[Value]) -> Option<Response> {
        self.shared
            .calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        self.shared.responses.lock().unwrap().pop_front()
    }
}

impl Driver for RecordingDriver {
    fn dialect(&self) -> Dialect {
        self.shared.dialect
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, DriverFailure> {
        match self.record(sql, params) {
            Some(Response::Rows(rows)) => Ok(rows),
            Some(Response::Fail(failure)) => Err(failure),
            Some(Response::Summary(_)) | None => Ok(Vec::new()),
        }
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecSummary, DriverFailure> {
        match self.record(sql, params) {
            Some(Response::Summary(summary)) => Ok(summary),
            Some(Response::Fail(failure)) => Err(failure),
            Some(Response::Rows(_)) | None => Ok(ExecSummary::default()),
        }
    }

    async fn close(&self) {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
    }
}
