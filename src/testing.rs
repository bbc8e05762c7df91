//! Scripted in-process query engine for tests. Results are written to an in-memory
//! object store so the whole read path runs without a network.

use crate::config::{WindDataConfig, DEFAULT_RESULT_REUSE_MINUTES};
use crate::error::WindDataError;
use crate::query::engine::{ExecutionContext, QueryEngine, QueryExecution, QueryState, RawResultSet};
use crate::query::error::QueryError;
use crate::query::request::QueryRequest;
use crate::query::result_store::ResultReader;
use crate::query::runner::PollConfig;
use crate::types::grid_point::GridPoint;
use crate::wind_client::WindClient;
use async_trait::async_trait;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) const RESULT_BUCKET: &str = "windwatts-results";

/// Columns of the fixture table, in `DESCRIBE` order.
pub(crate) const COLUMNS: [&str; 8] = [
    "windspeed_80m",
    "windspeed_100m",
    "winddirection_80m",
    "winddirection_100m",
    "year",
    "mohr",
    "varset",
    "index",
];

pub(crate) fn test_config() -> WindDataConfig {
    WindDataConfig {
        region_name: None,
        bucket_name: None,
        database: "windwatts".to_string(),
        output_location: format!("s3://{RESULT_BUCKET}/athena/"),
        output_bucket: None,
        athena_table_name: "wtk_all".to_string(),
        alt_athena_table_name: Some("wtk_all_by_index".to_string()),
        athena_workgroup: None,
        location_data: None,
        cache_dir: None,
        result_reuse_minutes: DEFAULT_RESULT_REUSE_MINUTES,
    }
}

pub(crate) fn test_grid_points() -> Vec<GridPoint> {
    vec![
        GridPoint::new("031233", 39.74, -105.17),
        GridPoint::new("031234", 39.76, -105.15),
        GridPoint::new("031235", 39.70, -105.30),
        GridPoint::new("045678", 40.50, -104.00),
    ]
}

/// A WTK client over [`COLUMNS`] and [`test_grid_points`] that polls without waiting.
pub(crate) async fn test_client(engine: &Arc<MockEngine>) -> Result<WindClient, WindDataError> {
    let config = test_config();
    let store: Arc<dyn ObjectStore> = engine.store();
    WindClient::builder()
        .config(&config)
        .engine(engine.clone())
        .result_store(store)
        .grid_points(test_grid_points())
        .column_names(COLUMNS.iter().map(|c| c.to_string()).collect())
        .poll(PollConfig::immediate())
        .build()
        .await
}

#[derive(Debug, Clone)]
pub(crate) enum MockResponse {
    /// Succeed with this CSV body as the result file.
    Csv(String),
    /// Succeed with these raw rows.
    Raw(RawResultSet),
    Fail(String),
    Cancel,
}

type Handler = Box<dyn Fn(&QueryRequest) -> MockResponse + Send + Sync>;

struct Execution {
    response: MockResponse,
    polls_left: usize,
}

pub(crate) struct MockEngine {
    handler: Handler,
    running_polls: usize,
    store: Arc<InMemory>,
    submitted: Mutex<Vec<QueryRequest>>,
    executions: Mutex<HashMap<String, Execution>>,
    status_calls: AtomicUsize,
}

impl MockEngine {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&QueryRequest) -> MockResponse + Send + Sync + 'static,
    {
        MockEngine {
            handler: Box::new(handler),
            running_polls: 0,
            store: Arc::new(InMemory::new()),
            submitted: Mutex::new(Vec::new()),
            executions: Mutex::new(HashMap::new()),
            status_calls: AtomicUsize::new(0),
        }
    }

    /// Report `Running` this many times before each query's terminal state.
    pub(crate) fn with_running_polls(mut self, polls: usize) -> Self {
        self.running_polls = polls;
        self
    }

    pub(crate) fn context() -> ExecutionContext {
        ExecutionContext {
            database: "windwatts".to_string(),
            output_location: format!("s3://{RESULT_BUCKET}/athena/"),
            workgroup: Some("primary".to_string()),
            reuse_max_age_minutes: Some(10080),
        }
    }

    pub(crate) fn store(&self) -> Arc<InMemory> {
        self.store.clone()
    }

    pub(crate) fn reader(&self) -> ResultReader {
        ResultReader::new(self.store.clone(), RESULT_BUCKET)
    }

    pub(crate) fn submitted(&self) -> Vec<QueryRequest> {
        self.submitted.lock().expect("submitted lock").clone()
    }

    /// Submitted statements other than `DESCRIBE`.
    pub(crate) fn data_queries(&self) -> Vec<QueryRequest> {
        self.submitted()
            .into_iter()
            .filter(|r| !r.statement.starts_with("DESCRIBE"))
            .collect()
    }

    pub(crate) fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn result_key(execution_id: &str) -> String {
        format!("athena/{execution_id}.csv")
    }
}

#[async_trait]
impl QueryEngine for MockEngine {
    async fn start_query(
        &self,
        request: &QueryRequest,
        _context: &ExecutionContext,
    ) -> Result<String, QueryError> {
        let response = (self.handler)(request);
        let execution_id = {
            let mut submitted = self.submitted.lock().expect("submitted lock");
            submitted.push(request.clone());
            format!("q-{}", submitted.len())
        };
        if let MockResponse::Csv(body) = &response {
            self.store
                .put(
                    &Path::from(Self::result_key(&execution_id)),
                    PutPayload::from(body.clone()),
                )
                .await
                .map_err(QueryError::transport)?;
        }
        self.executions.lock().expect("executions lock").insert(
            execution_id.clone(),
            Execution {
                response,
                polls_left: self.running_polls,
            },
        );
        Ok(execution_id)
    }

    async fn query_status(&self, execution_id: &str) -> Result<QueryExecution, QueryError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut executions = self.executions.lock().expect("executions lock");
        let execution = executions
            .get_mut(execution_id)
            .ok_or_else(|| QueryError::transport(std::io::Error::other("unknown execution")))?;
        if execution.polls_left > 0 {
            execution.polls_left -= 1;
            return Ok(QueryExecution {
                state: QueryState::Running,
                output_location: None,
                state_change_reason: None,
            });
        }
        let location = format!("s3://{RESULT_BUCKET}/{}", Self::result_key(execution_id));
        Ok(match &execution.response {
            MockResponse::Csv(_) | MockResponse::Raw(_) => QueryExecution {
                state: QueryState::Succeeded,
                output_location: Some(location),
                state_change_reason: None,
            },
            MockResponse::Fail(reason) => QueryExecution {
                state: QueryState::Failed,
                output_location: None,
                state_change_reason: Some(reason.clone()),
            },
            MockResponse::Cancel => QueryExecution {
                state: QueryState::Cancelled,
                output_location: None,
                state_change_reason: None,
            },
        })
    }

    async fn raw_results(&self, execution_id: &str) -> Result<RawResultSet, QueryError> {
        let executions = self.executions.lock().expect("executions lock");
        match executions.get(execution_id).map(|e| &e.response) {
            Some(MockResponse::Raw(raw)) => Ok(raw.clone()),
            _ => Ok(RawResultSet::default()),
        }
    }
}
