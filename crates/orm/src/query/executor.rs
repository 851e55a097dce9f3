//! Query Executor - issues statements and applies the in-statement retries

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::backends::{Connection, QueryResult};
use crate::error::{DbErrorKind, ModelError, ModelResult};

use super::retry::RetryPolicy;

#[derive(Clone)]
pub struct QueryExecutor {
    connection: Arc<dyn Connection>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl QueryExecutor {
    pub fn new(connection: Arc<dyn Connection>, policy: RetryPolicy) -> Self {
        Self { connection, policy }
    }

    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run one statement, re-sending it while the pool reports that it was
    /// enqueued after a fatal connection error.
    pub async fn run(&self, sql: &str, params: &[Value]) -> ModelResult<QueryResult> {
        let mut retries = 0;

        loop {
            debug!(sql, params = params.len(), "Executing statement");

            match self.connection.query(sql, params).await {
                Ok(result) => return Ok(result),
                Err(err)
                    if err.kind == DbErrorKind::EnqueueAfterFatal
                        && retries < self.policy.protocol_retries =>
                {
                    retries += 1;
                    warn!(
                        "Statement enqueued after fatal error, re-sending ({}/{})",
                        retries, self.policy.protocol_retries
                    );
                }
                Err(err) => return Err(ModelError::Database(err.with_retries(retries))),
            }
        }
    }

    /// Run an INSERT. A timed-out insert is re-sent immediately until the
    /// statement attempts are spent; the surfaced error records how many
    /// retries were made.
    pub async fn insert(&self, sql: &str, params: &[Value]) -> ModelResult<QueryResult> {
        let attempts = self.policy.statement_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.run(sql, params).await {
                Ok(result) => return Ok(result),
                Err(ModelError::Database(err)) if err.kind == DbErrorKind::TimedOut => {
                    if attempt >= attempts {
                        return Err(ModelError::Database(err.with_retries(attempt - 1)));
                    }
                    warn!("Insert timed out on attempt {}/{}, retrying", attempt, attempts);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
