//! Mock store client for testing.
//!
//! Replays a scripted sequence of outcomes so retry behavior can be
//! exercised without a live SQL Server.

use super::{ColumnInfo, QueryResult, StoreClient, Value};
use crate::error::{QuestError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A mock store client that returns scripted results in order.
///
/// Each call to `execute_query` pops the next scripted outcome; once the
/// script runs dry, a canned single-row result is returned. Every
/// executed statement is recorded for later assertions.
#[derive(Default)]
pub struct MockStoreClient {
    script: Mutex<VecDeque<Result<QueryResult>>>,
    executed: Mutex<Vec<String>>,
    fail_ping: bool,
}

impl MockStoreClient {
    /// Creates a mock that answers every statement with the canned result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful result.
    pub fn with_result(self, result: QueryResult) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(result));
        self
    }

    /// Queues an execution failure with the given error text.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(QuestError::store(message)));
        self
    }

    /// Makes `ping` fail.
    pub fn with_failing_ping(mut self) -> Self {
        self.fail_ping = true;
        self
    }

    /// Returns the statements executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// A one-row result echoing the statement, used when the script is empty.
    fn canned_result(sql: &str) -> QueryResult {
        QueryResult {
            columns: vec![ColumnInfo::new("result", "varchar")],
            rows: vec![vec![Value::String(format!("Mock result for: {sql}"))]],
            execution_time: Duration::from_millis(1),
            row_count: 1,
        }
    }
}

#[async_trait]
impl StoreClient for MockStoreClient {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        self.executed.lock().unwrap().push(sql.to_string());

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(outcome) => outcome,
            None => Ok(Self::canned_result(sql)),
        }
    }

    async fn ping(&self) -> Result<()> {
        if self.fail_ping {
            Err(QuestError::store("Login failed for user 'mock'"))
        } else {
            Ok(())
        }
    }
}
