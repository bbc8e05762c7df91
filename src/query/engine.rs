//! The seam to the remote SQL engine. Implementations wrap a concrete service client
//! (Athena or anything with the same submit/poll/read-result lifecycle).

use crate::query::error::QueryError;
use crate::query::request::QueryRequest;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl QueryState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QueryState::Queued | QueryState::Running)
    }
}

/// Status snapshot of a submitted query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryExecution {
    pub state: QueryState,
    /// `s3://bucket/key` of the result CSV, known once the query succeeded.
    pub output_location: Option<String>,
    /// Engine-reported reason for a failure.
    pub state_change_reason: Option<String>,
}

/// Where and how a query runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub database: String,
    pub output_location: String,
    pub workgroup: Option<String>,
    /// Reuse results of an identical query younger than this many minutes.
    pub reuse_max_age_minutes: Option<u32>,
}

/// Rows as returned by the engine's paged result API, before any typing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Submits `request` and returns the engine's execution id.
    async fn start_query(
        &self,
        request: &QueryRequest,
        context: &ExecutionContext,
    ) -> Result<String, QueryError>;

    async fn query_status(&self, execution_id: &str) -> Result<QueryExecution, QueryError>;

    /// All result rows of a finished query, every page concatenated.
    async fn raw_results(&self, execution_id: &str) -> Result<RawResultSet, QueryError>;
}
