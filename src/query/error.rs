use crate::query::engine::QueryState;
use polars::error::PolarsError;
use thiserror::Error;

/// Failures of the remote execution path: engine, result storage and result parsing.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Query {execution_id} failed: {reason}")]
    Failed {
        execution_id: String,
        reason: String,
    },

    #[error("Query {0} was cancelled")]
    Cancelled(String),

    #[error("Query {execution_id} ended with unexpected state {state:?}")]
    UnexpectedState {
        execution_id: String,
        state: QueryState,
    },

    #[error("Query {0} succeeded without reporting an output location")]
    MissingOutputLocation(String),

    #[error("Query engine request failed")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Result location '{0}' is not an s3:// URL")]
    ResultLocation(String),

    #[error("Result location '{location}' is outside the configured bucket '{bucket}'")]
    ForeignBucket { location: String, bucket: String },

    #[error("Failed to read query result '{location}'")]
    ResultRead {
        location: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Failed to parse query result '{location}'")]
    ResultParse {
        location: String,
        #[source]
        source: PolarsError,
    },

    #[error("Failed to build result store for bucket '{bucket}'")]
    StoreSetup {
        bucket: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl QueryError {
    /// Wraps any engine-side failure (SDK error, HTTP error, ...) as a transport fault.
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        QueryError::Transport(Box::new(err))
    }
}
