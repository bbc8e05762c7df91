use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while loading the grid points of a dataset.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("Cannot read grid dataset '{0}'")]
    SourceRead(PathBuf, #[source] std::io::Error),

    #[error("Downloading grid points from {url} failed ({})", describe_status(status))]
    Download {
        url: String,
        /// Set when the server answered with an error status.
        status: Option<reqwest::StatusCode>,
        #[source]
        source: reqwest::Error,
    },

    /// Reading the response stream or gunzipping the dataset.
    #[error("Grid dataset stream could not be read")]
    DownloadIo(#[from] std::io::Error),

    #[error("Failed to parse grid dataset CSV")]
    CsvParse(#[from] PolarsError),

    #[error("Grid dataset is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("Grid dataset row {row} has no value for '{column}'")]
    MissingValue { row: usize, column: &'static str },

    #[error("Cannot read cached grid points '{0}'")]
    CacheRead(PathBuf, #[source] std::io::Error),

    #[error("Cannot store grid points in '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("Cached grid points in '{0}' are corrupt; delete the file to reload")]
    CacheDecode(PathBuf, #[source] Box<bincode::error::DecodeError>),

    #[error("Grid points could not be serialised for caching")]
    CacheEncode(#[source] Box<bincode::error::EncodeError>),

    #[error("Grid loading task did not complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

fn describe_status(status: &Option<reqwest::StatusCode>) -> String {
    match status {
        Some(status) => format!("status {status}"),
        None => "no response".to_string(),
    }
}
