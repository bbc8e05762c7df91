use crate::grid::error::LocateError;
use crate::query::error::QueryError;
use crate::types::aggregate::AggregateKind;
use polars::error::PolarsError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The remote operation a [`WindDataError::Remote`] failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStage {
    /// Full time-series fetch for the cached location.
    Fetch,
    /// `DESCRIBE` of the table to discover column names.
    DescribeColumns,
    /// A composed filter, statistic or map query.
    Query,
    /// Setting up access to the result store.
    Connect,
}

impl fmt::Display for RemoteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            RemoteStage::Fetch => "fetch",
            RemoteStage::DescribeColumns => "describe-columns",
            RemoteStage::Query => "query",
            RemoteStage::Connect => "connect",
        };
        write!(f, "{stage}")
    }
}

/// Coarse classification of a [`WindDataError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or contradictory caller parameters. Never retried.
    InvalidInput,
    /// A value outside a documented domain.
    Range,
    /// No column, bracket or grid point satisfies the request.
    NotFound,
    /// The fetch succeeded but produced no rows.
    DataUnavailable,
    /// Aggregation or interpolation cannot proceed over the fetched shape.
    Computation,
    /// The query engine reported failure or cancellation, or the transport failed.
    RemoteFailure,
    /// Local file, cache or configuration I/O.
    Io,
}

#[derive(Debug, Error)]
pub enum WindDataError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{parameter} {value} is outside the supported range [{min}, {max}]")]
    OutOfRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No data available: {0}")]
    DataUnavailable(String),

    #[error("Cannot interpolate to {target}m: both bracket heights are {height}m")]
    DegenerateBracket { height: f64, target: f64 },

    #[error("Column '{0}' is not present in the time series")]
    MissingColumn(String),

    #[error("Failed to compute {kind} aggregate over '{column}'")]
    Computation {
        kind: AggregateKind,
        column: String,
        #[source]
        source: PolarsError,
    },

    #[error("Remote {stage} failed")]
    Remote {
        stage: RemoteStage,
        #[source]
        source: QueryError,
    },

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error("Failed to read config file '{0}'")]
    ConfigRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{0}'")]
    ConfigParse(PathBuf, #[source] serde_json::Error),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),

    #[error("Failed processing DataFrame: {0}")]
    Polars(#[from] PolarsError),
}

impl WindDataError {
    pub(crate) fn remote(stage: RemoteStage) -> impl FnOnce(QueryError) -> WindDataError {
        move |source| WindDataError::Remote { stage, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WindDataError::InvalidInput(_) => ErrorKind::InvalidInput,
            WindDataError::OutOfRange { .. } => ErrorKind::Range,
            WindDataError::NotFound(_) => ErrorKind::NotFound,
            WindDataError::DataUnavailable(_) => ErrorKind::DataUnavailable,
            WindDataError::DegenerateBracket { .. }
            | WindDataError::MissingColumn(_)
            | WindDataError::Computation { .. }
            | WindDataError::Polars(_) => ErrorKind::Computation,
            WindDataError::Remote { .. } => ErrorKind::RemoteFailure,
            WindDataError::Locate(_)
            | WindDataError::ConfigRead(..)
            | WindDataError::ConfigParse(..)
            | WindDataError::CacheDirCreation(..)
            | WindDataError::CacheDirResolution(_) => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn remote_errors_keep_stage_and_reason() {
        let err = WindDataError::remote(RemoteStage::DescribeColumns)(QueryError::Failed {
            execution_id: "q-1".to_string(),
            reason: "SYNTAX_ERROR".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::RemoteFailure);
        assert_eq!(err.to_string(), "Remote describe-columns failed");
        let source = err.source().map(|s| s.to_string()).unwrap_or_default();
        assert!(source.contains("SYNTAX_ERROR"), "{source}");
    }

    #[test]
    fn taxonomy() {
        assert_eq!(
            WindDataError::InvalidInput("k".into()).kind(),
            ErrorKind::InvalidInput
        );
        let range = WindDataError::OutOfRange {
            parameter: "height",
            value: 5.0,
            min: 10.0,
            max: 1000.0,
        };
        assert_eq!(range.kind(), ErrorKind::Range);
        assert_eq!(
            range.to_string(),
            "height 5 is outside the supported range [10, 1000]"
        );
        assert_eq!(
            WindDataError::DegenerateBracket {
                height: 80.0,
                target: 85.0
            }
            .kind(),
            ErrorKind::Computation
        );
    }
}
