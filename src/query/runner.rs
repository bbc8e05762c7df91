use crate::query::engine::{ExecutionContext, QueryEngine, QueryExecution, QueryState, RawResultSet};
use crate::query::error::QueryError;
use crate::query::request::{Addressing, QueryRequest};
use crate::query::result_store::ResultReader;
use log::{debug, info};
use polars::prelude::DataFrame;
use std::sync::Arc;
use std::time::Duration;

/// Backoff used while waiting for a query to finish: the wait starts at the initial
/// interval and doubles after every non-terminal poll, capped at `max_wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub initial_wait: Duration,
    /// Initial wait for [`PollSpeed::Reduced`], used by short aggregate queries.
    pub reduced_initial_wait: Duration,
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            initial_wait: Duration::from_millis(500),
            reduced_initial_wait: Duration::from_millis(100),
            max_wait: Duration::from_secs(5),
        }
    }
}

impl PollConfig {
    /// No waiting between polls.
    pub fn immediate() -> Self {
        PollConfig {
            initial_wait: Duration::ZERO,
            reduced_initial_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
        }
    }

    fn first_wait(&self, speed: PollSpeed) -> Duration {
        match speed {
            PollSpeed::Standard => self.initial_wait,
            PollSpeed::Reduced => self.reduced_initial_wait,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollSpeed {
    #[default]
    Standard,
    Reduced,
}

/// A result frame together with the object-storage location it was read from.
#[derive(Debug, Clone)]
pub struct LocatedFrame {
    pub frame: DataFrame,
    pub location: String,
}

/// Submits requests to a [`QueryEngine`], waits for them and reads their results.
///
/// Polling is the only retry: a query the engine reports as failed or cancelled is an
/// error and is never resubmitted.
#[derive(Clone)]
pub struct QueryRunner {
    engine: Arc<dyn QueryEngine>,
    results: ResultReader,
    context: ExecutionContext,
    poll: PollConfig,
}

impl QueryRunner {
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        results: ResultReader,
        context: ExecutionContext,
        poll: PollConfig,
    ) -> Self {
        QueryRunner {
            engine,
            results,
            context,
            poll,
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Runs `request` and returns its result as a frame.
    pub async fn run_frame(
        &self,
        request: &QueryRequest,
        speed: PollSpeed,
    ) -> Result<DataFrame, QueryError> {
        Ok(self.run_located(request, speed).await?.frame)
    }

    /// Runs `request` and returns its result frame along with where the engine stored it.
    pub async fn run_located(
        &self,
        request: &QueryRequest,
        speed: PollSpeed,
    ) -> Result<LocatedFrame, QueryError> {
        let (execution_id, execution) = self.execute(request, speed).await?;
        let location = execution
            .output_location
            .ok_or(QueryError::MissingOutputLocation(execution_id))?;
        if request.addressing == Addressing::PartitionPath {
            info!("Query result is stored at: {location}");
        }
        let frame = self.results.read_frame(&location).await?;
        Ok(LocatedFrame { frame, location })
    }

    /// Runs `request` and returns the engine's untyped rows.
    pub async fn run_raw(
        &self,
        request: &QueryRequest,
        speed: PollSpeed,
    ) -> Result<RawResultSet, QueryError> {
        let (execution_id, _) = self.execute(request, speed).await?;
        self.engine.raw_results(&execution_id).await
    }

    /// Column names of `table`, from `DESCRIBE`. Each row's first cell holds the name
    /// before a tab; everything after the `index` column (partition metadata) is cut off.
    pub async fn describe_columns(&self, table: &str) -> Result<Vec<String>, QueryError> {
        let raw = self
            .run_raw(&QueryRequest::describe(table), PollSpeed::Standard)
            .await?;
        Ok(column_names_from_describe(&raw))
    }

    async fn execute(
        &self,
        request: &QueryRequest,
        speed: PollSpeed,
    ) -> Result<(String, QueryExecution), QueryError> {
        let execution_id = self.engine.start_query(request, &self.context).await?;
        debug!(
            "Submitted query {execution_id}: {} ({} parameters)",
            request.statement,
            request.parameters.len()
        );

        let mut wait = self.poll.first_wait(speed);
        let mut polls = 0usize;
        let execution = loop {
            let execution = self.engine.query_status(&execution_id).await?;
            if execution.state.is_terminal() {
                break execution;
            }
            polls += 1;
            debug!(
                "Query {execution_id} is {:?}, poll {polls}, waiting {wait:?}",
                execution.state
            );
            tokio::time::sleep(wait).await;
            wait = (wait * 2).min(self.poll.max_wait);
        };

        match execution.state {
            QueryState::Succeeded => {
                info!("Query {execution_id} succeeded after {polls} polls");
                Ok((execution_id, execution))
            }
            QueryState::Failed => Err(QueryError::Failed {
                reason: execution
                    .state_change_reason
                    .unwrap_or_else(|| "no reason reported".to_string()),
                execution_id,
            }),
            QueryState::Cancelled => Err(QueryError::Cancelled(execution_id)),
            state => Err(QueryError::UnexpectedState {
                execution_id,
                state,
            }),
        }
    }
}

pub(crate) fn column_names_from_describe(raw: &RawResultSet) -> Vec<String> {
    let mut names: Vec<String> = raw
        .rows
        .iter()
        .filter_map(|row| row.first().cloned().flatten())
        .map(|cell| cell.split('\t').next().unwrap_or_default().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if let Some(position) = names.iter().position(|name| name == "index") {
        names.truncate(position + 1);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::request::QueryParam;
    use crate::testing::{MockEngine, MockResponse};

    fn runner(engine: &Arc<MockEngine>) -> QueryRunner {
        QueryRunner::new(
            engine.clone(),
            engine.reader(),
            MockEngine::context(),
            PollConfig::immediate(),
        )
    }

    fn select_request() -> QueryRequest {
        QueryRequest {
            statement: "SELECT * FROM wtk WHERE index = ?".to_string(),
            parameters: vec![QueryParam::Text("7".into())],
            output_columns: Vec::new(),
            addressing: Addressing::Locations(vec!["7".into()]),
        }
    }

    #[test]
    fn backoff_defaults() {
        let poll = PollConfig::default();
        assert_eq!(poll.first_wait(PollSpeed::Standard), Duration::from_millis(500));
        assert_eq!(poll.first_wait(PollSpeed::Reduced), Duration::from_millis(100));
        assert_eq!(poll.max_wait, Duration::from_secs(5));
    }

    #[test]
    fn describe_parsing() {
        let cell = |s: &str| vec![Some(s.to_string())];
        let raw = RawResultSet {
            columns: vec!["col_name".into()],
            rows: vec![
                cell("year                \tstring"),
                cell("windspeed_80m       \tdouble   \t"),
                vec![None],
                cell(""),
                cell("index               \tstring"),
                cell("# Partition Information"),
                cell("varset              \tstring"),
            ],
        };
        assert_eq!(
            column_names_from_describe(&raw),
            vec!["year", "windspeed_80m", "index"]
        );
    }

    #[tokio::test]
    async fn polls_until_success_then_reads_csv() -> Result<(), QueryError> {
        let engine = Arc::new(
            MockEngine::new(|_| MockResponse::Csv("index,windspeed_80m\n7,5.5\n".into()))
                .with_running_polls(3),
        );
        let frame = runner(&engine)
            .run_frame(&select_request(), PollSpeed::Standard)
            .await?;
        assert_eq!(frame.height(), 1);
        assert_eq!(engine.status_calls(), 4);
        assert_eq!(engine.submitted().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn failure_carries_engine_reason() {
        let engine = Arc::new(MockEngine::new(|_| {
            MockResponse::Fail("SYNTAX_ERROR: line 1:8".into())
        }));
        let err = runner(&engine)
            .run_frame(&select_request(), PollSpeed::Reduced)
            .await
            .unwrap_err();
        match err {
            QueryError::Failed { reason, .. } => assert!(reason.starts_with("SYNTAX_ERROR")),
            other => panic!("unexpected error {other:?}"),
        }
        // A failed query is not resubmitted.
        assert_eq!(engine.submitted().len(), 1);
    }

    #[tokio::test]
    async fn cancellation_is_an_error() {
        let engine = Arc::new(MockEngine::new(|_| MockResponse::Cancel));
        let err = runner(&engine)
            .run_raw(&select_request(), PollSpeed::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Cancelled(_)));
    }

    #[tokio::test]
    async fn describe_through_engine() -> Result<(), QueryError> {
        let engine = Arc::new(MockEngine::new(|request| {
            assert_eq!(request.statement, "DESCRIBE wtk_1224");
            MockResponse::Raw(RawResultSet {
                columns: vec!["col_name".into()],
                rows: vec![
                    vec![Some("windspeed_100m\tdouble".into())],
                    vec![Some("index\tstring".into())],
                    vec![Some("year\tstring".into())],
                ],
            })
        }));
        let columns = runner(&engine).describe_columns("wtk_1224").await?;
        assert_eq!(columns, vec!["windspeed_100m", "index"]);
        Ok(())
    }
}
